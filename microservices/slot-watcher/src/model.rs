//! Session-opportunity model

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use courtside_core::VenueId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Program type as reported by the upstream catalogue
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramType {
    Pickup,
    DropIn,
    League,
    Other(String),
}

impl ProgramType {
    /// Accepts the upstream spelling (`PICKUP`, `DROPIN`, `DROP_IN`, `drop-in`, ...)
    pub fn parse(raw: &str) -> Self {
        let normalized: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match normalized.as_str() {
            "PICKUP" => Self::Pickup,
            "DROPIN" => Self::DropIn,
            "LEAGUE" => Self::League,
            _ => Self::Other(normalized),
        }
    }

    /// Canonical upper-case code, used in queries and event keys
    pub fn code(&self) -> &str {
        match self {
            Self::Pickup => "PICKUP",
            Self::DropIn => "DROPIN",
            Self::League => "LEAGUE",
            Self::Other(code) => code,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Pickup => "Pickup",
            Self::DropIn => "Drop-in",
            Self::League => "League",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for ProgramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// How the opening is offered
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Listing {
    /// Open drop-in capacity on one scheduled game
    DropIn { game_id: String },
    /// Open registration on the program itself
    Registration,
}

impl Listing {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::DropIn { .. } => "dropin",
            Self::Registration => "registration",
        }
    }
}

/// Start of the session in the form the upstream gave it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StartTime {
    /// Exact instant (game listings)
    At(DateTime<Utc>),
    /// Wall-clock estimate in the league's local zone (program listings)
    Estimated(NaiveTime),
    Unknown,
}

/// One discovered open pickup/drop-in slot.
///
/// Built fresh on every poll and discarded afterwards; only its event key
/// outlives the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOpportunity {
    pub venue_id: VenueId,
    pub venue_name: String,
    pub sport: String,
    pub program_id: String,
    pub program_type: ProgramType,
    pub listing: Listing,
    /// Canonical (unlocalized) session date
    pub date: NaiveDate,
    pub start: StartTime,
    pub available_spots: u32,
    pub title: String,
}

impl SessionOpportunity {
    /// Program type shown to people: drop-in games read as "Drop-in"
    /// whatever program they hang off
    pub fn display_program(&self) -> &str {
        match self.listing {
            Listing::DropIn { .. } => ProgramType::DropIn.label(),
            Listing::Registration => self.program_type.label(),
        }
    }

    /// Canonical start rendered for keys and raw listings (`HH:MM`, UTC for
    /// exact instants, local wall clock for estimates)
    pub fn canonical_start(&self) -> Option<String> {
        match self.start {
            StartTime::At(at) => Some(at.format("%H:%M").to_string()),
            StartTime::Estimated(t) => Some(t.format("%H:%M").to_string()),
            StartTime::Unknown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_type_parse() {
        assert_eq!(ProgramType::parse("PICKUP"), ProgramType::Pickup);
        assert_eq!(ProgramType::parse("drop-in"), ProgramType::DropIn);
        assert_eq!(ProgramType::parse("DROP_IN"), ProgramType::DropIn);
        assert_eq!(ProgramType::parse("League"), ProgramType::League);
        assert_eq!(
            ProgramType::parse("tournament"),
            ProgramType::Other("TOURNAMENT".into())
        );
    }

    #[test]
    fn test_program_type_code_roundtrip() {
        for program in [ProgramType::Pickup, ProgramType::DropIn, ProgramType::League] {
            assert_eq!(ProgramType::parse(program.code()), program);
        }
    }
}

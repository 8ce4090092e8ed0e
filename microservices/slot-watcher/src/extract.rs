//! Session Extractor - catalogue rows to session opportunities
//!
//! Rows are decoded one by one. A row missing something we need becomes an
//! [`ExtractionWarning`] and is skipped; a well-formed row that is simply not
//! interesting (other venue, other sport, other program type, no spots) is
//! counted as excluded. Neither stops the run.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use courtside_core::VenueId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::config::UpstreamSettings;
use crate::error::ExtractionWarning;
use crate::model::{Listing, ProgramType, SessionOpportunity, StartTime};
use crate::upstream::DiscoverPayload;

#[derive(Debug, Deserialize)]
struct RawRow {
    game: Option<RawGame>,
    league: Option<RawLeague>,
    event_start_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVenue {
    #[serde(rename = "_id")]
    id: Option<String>,
    shorthand_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSport {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawProgram {
    #[serde(rename = "_id")]
    id: Option<String>,
    name: Option<String>,
    display_name: Option<String>,
    program_type: Option<String>,
    #[serde(rename = "sportBySport")]
    sport: Option<RawSport>,
}

#[derive(Debug, Deserialize)]
struct RawCapacity {
    total_available_spots: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawGame {
    #[serde(rename = "_id")]
    id: Option<String>,
    start_time: Option<String>,
    #[serde(rename = "venueByVenue")]
    venue: Option<RawVenue>,
    drop_in_capacity: Option<RawCapacity>,
    #[serde(rename = "leagueByLeague")]
    program: Option<RawProgram>,
}

#[derive(Debug, Deserialize)]
struct RawCount {
    count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawAggregate {
    aggregate: Option<RawCount>,
}

#[derive(Debug, Deserialize)]
struct RawRegistration {
    max_registration_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawLeague {
    #[serde(rename = "_id")]
    id: Option<String>,
    name: Option<String>,
    display_name: Option<String>,
    program_type: Option<String>,
    start_time_estimate: Option<String>,
    #[serde(rename = "sportBySport")]
    sport: Option<RawSport>,
    #[serde(rename = "venueByVenue")]
    venue: Option<RawVenue>,
    registrants_aggregate: Option<RawAggregate>,
    #[serde(rename = "registrationByRegistration")]
    registration: Option<RawRegistration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exclusion {
    Venue,
    Sport,
    ProgramType,
    NoSpots,
}

impl Exclusion {
    fn as_str(self) -> &'static str {
        match self {
            Self::Venue => "venue",
            Self::Sport => "sport",
            Self::ProgramType => "program_type",
            Self::NoSpots => "no_spots",
        }
    }
}

/// Why well-formed rows were left out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Exclusions {
    pub venue: usize,
    pub sport: usize,
    pub program_type: usize,
    pub no_spots: usize,
}

impl Exclusions {
    pub fn total(&self) -> usize {
        self.venue + self.sport + self.program_type + self.no_spots
    }

    fn count(&mut self, reason: Exclusion) {
        match reason {
            Exclusion::Venue => self.venue += 1,
            Exclusion::Sport => self.sport += 1,
            Exclusion::ProgramType => self.program_type += 1,
            Exclusion::NoSpots => self.no_spots += 1,
        }
    }
}

/// Result of one extraction pass, in upstream order
#[derive(Debug, Default)]
pub struct Extraction {
    pub opportunities: Vec<SessionOpportunity>,
    pub warnings: Vec<ExtractionWarning>,
    pub excluded: Exclusions,
    pub examined: usize,
}

pub struct Extractor {
    venues: HashSet<VenueId>,
    sport: String,
    program_types: Vec<ProgramType>,
}

impl Extractor {
    pub fn new(venues: impl IntoIterator<Item = VenueId>, sport: &str, program_types: Vec<ProgramType>) -> Self {
        Self {
            venues: venues.into_iter().collect(),
            sport: sport.trim().to_string(),
            program_types,
        }
    }

    pub fn from_settings(settings: &UpstreamSettings) -> Self {
        Self::new(
            settings.venue_ids.iter().cloned(),
            &settings.sport,
            settings.program_types.clone(),
        )
    }

    pub fn extract(&self, payload: &DiscoverPayload) -> Extraction {
        let mut extraction = Extraction {
            examined: payload.rows.len(),
            ..Default::default()
        };

        for (index, row) in payload.rows.iter().enumerate() {
            match decode_row(index, row) {
                Ok(opportunity) => match self.exclusion(&opportunity) {
                    Some(reason) => {
                        debug!(
                            index,
                            venue_id = %opportunity.venue_id,
                            reason = reason.as_str(),
                            "Listing excluded"
                        );
                        extraction.excluded.count(reason);
                    }
                    None => extraction.opportunities.push(opportunity),
                },
                Err(warning) => {
                    warn!(index, %warning, "Skipping malformed listing row");
                    extraction.warnings.push(warning);
                }
            }
        }

        extraction
    }

    fn exclusion(&self, opportunity: &SessionOpportunity) -> Option<Exclusion> {
        if !self.venues.contains(&opportunity.venue_id) {
            Some(Exclusion::Venue)
        } else if !opportunity.sport.trim().eq_ignore_ascii_case(&self.sport) {
            Some(Exclusion::Sport)
        } else if !self.admits_program_type(opportunity) {
            Some(Exclusion::ProgramType)
        } else if opportunity.available_spots == 0 {
            Some(Exclusion::NoSpots)
        } else {
            None
        }
    }

    /// Game rows are drop-ins of their parent program, so they match either
    /// a configured drop-in type or the parent's own type.
    fn admits_program_type(&self, opportunity: &SessionOpportunity) -> bool {
        let drop_in = matches!(opportunity.listing, Listing::DropIn { .. })
            && self.program_types.contains(&ProgramType::DropIn);
        drop_in || self.program_types.contains(&opportunity.program_type)
    }
}

fn decode_row(index: usize, row: &Value) -> Result<SessionOpportunity, ExtractionWarning> {
    let raw = RawRow::deserialize(row).map_err(|e| ExtractionWarning::Undecodable {
        index,
        detail: e.to_string(),
    })?;

    match (raw.game, raw.league) {
        (Some(game), _) => decode_game(index, game),
        (None, Some(league)) => decode_league(index, league, raw.event_start_date),
        (None, None) => Err(ExtractionWarning::UnknownShape { index }),
    }
}

fn decode_game(index: usize, game: RawGame) -> Result<SessionOpportunity, ExtractionWarning> {
    let missing = |field| ExtractionWarning::MissingField { index, field };

    let game_id = present(game.id).ok_or_else(|| missing("game._id"))?;
    let program = game.program.ok_or_else(|| missing("game.leagueByLeague"))?;
    let program_id = present(program.id).ok_or_else(|| missing("game.leagueByLeague._id"))?;
    let program_type = present(program.program_type)
        .ok_or_else(|| missing("game.leagueByLeague.program_type"))?;
    let sport = program
        .sport
        .and_then(|s| present(s.name))
        .ok_or_else(|| missing("game.leagueByLeague.sportBySport.name"))?;
    let title = coalesce(program.display_name, program.name)
        .ok_or_else(|| missing("game.leagueByLeague.name"))?;
    let (venue_id, venue_name) = decode_venue(index, game.venue, "game.venueByVenue")?;
    let spots = game
        .drop_in_capacity
        .and_then(|c| c.total_available_spots)
        .ok_or_else(|| missing("game.drop_in_capacity.total_available_spots"))?;
    let raw_start = present(game.start_time).ok_or_else(|| missing("game.start_time"))?;
    let starts_at = parse_instant(&raw_start).ok_or_else(|| ExtractionWarning::InvalidField {
        index,
        field: "game.start_time",
        detail: raw_start.clone(),
    })?;

    Ok(SessionOpportunity {
        venue_id,
        venue_name,
        sport,
        program_id,
        program_type: ProgramType::parse(&program_type),
        listing: Listing::DropIn { game_id },
        date: starts_at.date_naive(),
        start: StartTime::At(starts_at),
        available_spots: clamp_spots(spots),
        title,
    })
}

fn decode_league(
    index: usize,
    league: RawLeague,
    event_start_date: Option<String>,
) -> Result<SessionOpportunity, ExtractionWarning> {
    let missing = |field| ExtractionWarning::MissingField { index, field };

    let program_id = present(league.id).ok_or_else(|| missing("league._id"))?;
    let program_type =
        present(league.program_type).ok_or_else(|| missing("league.program_type"))?;
    let sport = league
        .sport
        .and_then(|s| present(s.name))
        .ok_or_else(|| missing("league.sportBySport.name"))?;
    let title =
        coalesce(league.display_name, league.name).ok_or_else(|| missing("league.name"))?;
    let (venue_id, venue_name) = decode_venue(index, league.venue, "league.venueByVenue")?;

    let raw_date = present(event_start_date).ok_or_else(|| missing("event_start_date"))?;
    let date = parse_date(&raw_date).ok_or_else(|| ExtractionWarning::InvalidField {
        index,
        field: "event_start_date",
        detail: raw_date.clone(),
    })?;

    let start = match present(league.start_time_estimate) {
        Some(raw) => StartTime::Estimated(parse_clock(&raw).ok_or_else(|| {
            ExtractionWarning::InvalidField {
                index,
                field: "league.start_time_estimate",
                detail: raw.clone(),
            }
        })?),
        None => StartTime::Unknown,
    };

    let capacity = league
        .registration
        .and_then(|r| r.max_registration_size)
        .ok_or_else(|| missing("league.registrationByRegistration.max_registration_size"))?;
    let registered = league
        .registrants_aggregate
        .and_then(|a| a.aggregate)
        .and_then(|a| a.count)
        .ok_or_else(|| missing("league.registrants_aggregate.aggregate.count"))?;
    let remaining = capacity
        .checked_sub(registered)
        .ok_or_else(|| ExtractionWarning::InvalidField {
            index,
            field: "league.registrationByRegistration.max_registration_size",
            detail: format!("{} - {} overflows", capacity, registered),
        })?;

    Ok(SessionOpportunity {
        venue_id,
        venue_name,
        sport,
        program_id,
        program_type: ProgramType::parse(&program_type),
        listing: Listing::Registration,
        date,
        start,
        available_spots: clamp_spots(remaining),
        title,
    })
}

fn decode_venue(
    index: usize,
    venue: Option<RawVenue>,
    field: &'static str,
) -> Result<(VenueId, String), ExtractionWarning> {
    let venue = venue.ok_or(ExtractionWarning::MissingField { index, field })?;
    let id = present(venue.id).ok_or(ExtractionWarning::MissingField {
        index,
        field: "venueByVenue._id",
    })?;
    let name = present(venue.shorthand_name).ok_or(ExtractionWarning::MissingField {
        index,
        field: "venueByVenue.shorthand_name",
    })?;
    Ok((VenueId::new(id), name))
}

/// `None` for absent or blank strings
fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn coalesce(preferred: Option<String>, fallback: Option<String>) -> Option<String> {
    present(preferred).or_else(|| present(fallback))
}

fn clamp_spots(spots: i64) -> u32 {
    u32::try_from(spots.max(0)).unwrap_or(u32::MAX)
}

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    // Offset-less timestamps are UTC upstream
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn parse_clock(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

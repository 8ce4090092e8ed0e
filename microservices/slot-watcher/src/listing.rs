//! Current openings, without touching the seen-key store or the transport

use courtside_core::EventKey;
use serde::Serialize;
use std::fmt;

use crate::error::UpstreamError;
use crate::extract::Extractor;
use crate::identity;
use crate::model::{SessionOpportunity, StartTime};
use crate::notify::MessageFormatter;
use crate::upstream::DiscoverySource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Opening {
    pub kind: &'static str,
    pub title: String,
    pub program_type: String,
    pub venue: String,
    /// Display-zone rendering
    pub when: String,
    /// Start exactly as the upstream gave it
    pub raw_start: String,
    pub spots: u32,
    pub event_key: EventKey,
}

impl Opening {
    fn from_opportunity(opportunity: &SessionOpportunity, formatter: &MessageFormatter) -> Self {
        let raw_start = match opportunity.start {
            StartTime::At(at) => at.to_rfc3339(),
            StartTime::Estimated(time) => {
                format!("{} {}", opportunity.date, time.format("%H:%M"))
            }
            StartTime::Unknown => opportunity.date.to_string(),
        };

        Self {
            kind: opportunity.listing.tag(),
            title: opportunity.title.clone(),
            program_type: opportunity.display_program().to_string(),
            venue: opportunity.venue_name.clone(),
            when: formatter.when(opportunity),
            raw_start,
            spots: opportunity.available_spots,
            event_key: identity::derive(opportunity),
        }
    }
}

impl fmt::Display for Opening {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}) @ {} {} ({} spots) [{}]",
            self.kind, self.title, self.program_type, self.venue, self.when, self.spots, self.raw_start
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OpeningsReport {
    pub fetched: usize,
    pub skipped: usize,
    pub openings: Vec<Opening>,
}

pub async fn list_openings(
    source: &dyn DiscoverySource,
    extractor: &Extractor,
    formatter: &MessageFormatter,
) -> Result<OpeningsReport, UpstreamError> {
    let payload = source.fetch().await?;
    let extraction = extractor.extract(&payload);

    Ok(OpeningsReport {
        fetched: extraction.examined,
        skipped: extraction.warnings.len(),
        openings: extraction
            .opportunities
            .iter()
            .map(|op| Opening::from_opportunity(op, formatter))
            .collect(),
    })
}

//! Alert text rendering in the display time zone

use chrono::{NaiveDateTime, Timelike};
use chrono_tz::Tz;

use crate::model::{SessionOpportunity, StartTime};

pub const SUBJECT: &str = "Volo Volleyball Alert";

/// Renders alert bodies. Only presentation lives here; nothing rendered
/// feeds back into event keys.
#[derive(Debug, Clone, Copy)]
pub struct MessageFormatter {
    tz: Tz,
}

impl MessageFormatter {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// `October 5 7PM`, `October 5 6:30PM`, or `TBD`
    pub fn when(&self, opportunity: &SessionOpportunity) -> String {
        match opportunity.start {
            StartTime::At(at) => pretty(at.with_timezone(&self.tz).naive_local()),
            // Estimates are already local wall-clock times
            StartTime::Estimated(time) => pretty(opportunity.date.and_time(time)),
            StartTime::Unknown => "TBD".to_string(),
        }
    }

    pub fn single(&self, opportunity: &SessionOpportunity) -> String {
        let spots = opportunity.available_spots;
        format!(
            "New Volo volleyball opening: {} ({}) @ {} {} - {} {} left",
            opportunity.title,
            opportunity.display_program(),
            opportunity.venue_name,
            self.when(opportunity),
            spots,
            if spots == 1 { "spot" } else { "spots" },
        )
    }

    pub fn combined(&self, opportunities: &[&SessionOpportunity]) -> String {
        let mut venues: Vec<&str> = Vec::new();
        for opportunity in opportunities {
            if !venues.contains(&opportunity.venue_name.as_str()) {
                venues.push(&opportunity.venue_name);
            }
        }

        let mut lines = vec![format!("New Volo volleyball openings ({}):", venues.join(", "))];
        lines.extend(opportunities.iter().map(|op| self.line(op)));
        lines.join("\n")
    }

    /// One `- title @ venue when (n spots)` line
    pub fn line(&self, opportunity: &SessionOpportunity) -> String {
        format!(
            "- {} @ {} {} ({} spots)",
            opportunity.title,
            opportunity.venue_name,
            self.when(opportunity),
            opportunity.available_spots
        )
    }
}

fn pretty(local: NaiveDateTime) -> String {
    if local.minute() == 0 {
        local.format("%B %-d %-I%p").to_string()
    } else {
        local.format("%B %-d %-I:%M%p").to_string()
    }
}

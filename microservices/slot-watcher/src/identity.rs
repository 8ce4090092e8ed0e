//! Identity Deriver
//!
//! An event key is `v1:` followed by the SHA-256 of the identifying fields
//! joined with the ASCII unit separator (0x1F), which never occurs in upstream
//! identifiers, dates or `HH:MM` times. Field order:
//!
//! 1. listing kind (`dropin` / `registration`)
//! 2. venue id
//! 3. program type code
//! 4. program id
//! 5. game id (empty for registrations)
//! 6. date, `YYYY-MM-DD`
//! 7. start, `HH:MM` (empty when unknown)
//!
//! Spot counts, titles, venue names and the display zone are not part of
//! the key.

use courtside_core::EventKey;
use sha2::{Digest, Sha256};

use crate::model::{Listing, SessionOpportunity};

pub const KEY_VERSION: &str = "v1";

const SEPARATOR: &str = "\u{1f}";

pub fn derive(opportunity: &SessionOpportunity) -> EventKey {
    let game_id = match &opportunity.listing {
        Listing::DropIn { game_id } => game_id.as_str(),
        Listing::Registration => "",
    };
    let date = opportunity.date.format("%Y-%m-%d").to_string();
    let start = opportunity.canonical_start().unwrap_or_default();

    let material = [
        opportunity.listing.tag(),
        opportunity.venue_id.as_str(),
        opportunity.program_type.code(),
        opportunity.program_id.as_str(),
        game_id,
        date.as_str(),
        start.as_str(),
    ]
    .join(SEPARATOR);

    let digest = Sha256::digest(material.as_bytes());
    EventKey::new(format!("{}:{}", KEY_VERSION, hex::encode(digest)))
}

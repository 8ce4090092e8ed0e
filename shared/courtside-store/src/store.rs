//! Seen-key store abstraction

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courtside_core::EventKey;
use std::collections::HashSet;

use crate::Result;

/// Persistent set of event keys that were already alerted on.
///
/// The set is append-only from the watcher's point of view: keys are checked
/// in one batch per poll and recorded one at a time after a confirmed
/// dispatch. Recording the same key twice is a no-op.
#[async_trait]
pub trait SeenKeyStore: Send + Sync {
    /// Short backend name for logs and readiness output
    fn backend(&self) -> &'static str;

    /// Return the subset of `keys` that is already recorded
    async fn existing(&self, keys: &[EventKey]) -> Result<HashSet<EventKey>>;

    /// Record `key` as seen (idempotent upsert)
    async fn record(&self, key: &EventKey, seen_at: DateTime<Utc>) -> Result<()>;

    /// Cheap reachability check
    async fn is_healthy(&self) -> bool;
}

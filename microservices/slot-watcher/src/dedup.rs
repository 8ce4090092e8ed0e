//! Deduplication Gate
//!
//! One batched existence check per poll, one upsert per confirmed dispatch.
//! There is no claim step: overlapping runs may both alert on the same key.

use chrono::Utc;
use courtside_core::EventKey;
use courtside_store::{SeenKeyStore, StoreError};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct DedupGate {
    store: Arc<dyn SeenKeyStore>,
    timeout: Duration,
}

impl DedupGate {
    pub fn new(store: Arc<dyn SeenKeyStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn store(&self) -> &Arc<dyn SeenKeyStore> {
        &self.store
    }

    /// Keys from `keys` that have not been recorded yet
    #[instrument(skip(self, keys), fields(candidates = keys.len(), backend = self.store.backend()))]
    pub async fn filter_new(&self, keys: &[EventKey]) -> Result<HashSet<EventKey>, StoreError> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }

        let seen = self.bounded(self.store.existing(keys)).await?;
        let fresh: HashSet<EventKey> = keys
            .iter()
            .filter(|key| !seen.contains(*key))
            .cloned()
            .collect();

        debug!(seen = seen.len(), new = fresh.len(), "Seen-key lookup finished");
        Ok(fresh)
    }

    /// Store health, bounded like every other store call; a stall reads as down
    pub async fn is_healthy(&self) -> bool {
        tokio::time::timeout(self.timeout, self.store.is_healthy())
            .await
            .unwrap_or(false)
    }

    /// Record `key` once its alert has been dispatched
    pub async fn mark_seen(&self, key: &EventKey) -> Result<(), StoreError> {
        self.bounded(self.store.record(key, Utc::now())).await
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }
}

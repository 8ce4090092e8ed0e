//! In-memory seen-key store

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use courtside_core::EventKey;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

use crate::{Result, SeenKeyStore};

/// Process-local seen-key set.
///
/// Without a retention window keys live for the lifetime of the process.
/// With one, a key older than the window counts as unseen again and is
/// pruned on the next write.
#[derive(Clone, Default)]
pub struct MemorySeenKeyStore {
    keys: Arc<DashMap<EventKey, DateTime<Utc>>>,
    retention: Option<Duration>,
}

impl MemorySeenKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            keys: Arc::new(DashMap::new()),
            retention: Some(retention),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &EventKey) -> bool {
        self.keys
            .get(key)
            .map(|seen_at| self.is_live(*seen_at, Utc::now()))
            .unwrap_or(false)
    }

    fn is_live(&self, seen_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.retention {
            Some(window) => now - seen_at < window,
            None => true,
        }
    }
}

#[async_trait]
impl SeenKeyStore for MemorySeenKeyStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn existing(&self, keys: &[EventKey]) -> Result<HashSet<EventKey>> {
        let now = Utc::now();
        Ok(keys
            .iter()
            .filter(|key| {
                self.keys
                    .get(*key)
                    .map(|seen_at| self.is_live(*seen_at, now))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn record(&self, key: &EventKey, seen_at: DateTime<Utc>) -> Result<()> {
        if self.retention.is_some() {
            let now = Utc::now();
            self.keys.retain(|_, recorded| self.is_live(*recorded, now));
        }
        self.keys.insert(key.clone(), seen_at);
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

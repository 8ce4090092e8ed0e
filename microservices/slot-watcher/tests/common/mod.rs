//! Fakes shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courtside_core::{EventKey, VenueId};
use courtside_store::{MemorySeenKeyStore, SeenKeyStore, StoreError};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use slot_watcher::config::NotifyMode;
use slot_watcher::dedup::DedupGate;
use slot_watcher::error::{TransportError, UpstreamError};
use slot_watcher::extract::Extractor;
use slot_watcher::model::ProgramType;
use slot_watcher::notify::{DispatchReceipt, MessageFormatter, MessageTransport, Notifier, OutboundMessage};
use slot_watcher::pipeline::Pipeline;
use slot_watcher::upstream::{DiscoverPayload, DiscoverySource};

pub const ARENA: &str = "8c856ee8-30f6-45ac-9f02-983178ba0722";
pub const SOBO: &str = "ef20648e-2eb2-4eee-8a12-6faf00fccac9";

/// Drop-in game row at `venue`, 7PM Denver on 2026-11-02
pub fn game_row(id: &str, venue: &str, spots: i64) -> Value {
    json!({
        "game_id": id,
        "game": {
            "_id": id,
            "start_time": "2026-11-03T02:00:00+00:00",
            "venueByVenue": { "_id": venue, "shorthand_name": "Volo Sports Arena" },
            "drop_in_capacity": { "total_available_spots": spots },
            "leagueByLeague": {
                "_id": "p-monday",
                "name": "Monday Pickup",
                "display_name": null,
                "program_type": "PICKUP",
                "sportBySport": { "name": "Volleyball" }
            }
        },
        "league_id": null,
        "league": null,
        "event_start_date": "2026-11-02"
    })
}

/// What the upstream returns, call after call
pub enum Canned {
    Rows(Vec<Value>),
    Fail(fn() -> UpstreamError),
}

pub struct CannedSource {
    answer: Canned,
    pub calls: AtomicUsize,
}

impl CannedSource {
    pub fn rows(rows: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            answer: Canned::Rows(rows),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(err: fn() -> UpstreamError) -> Arc<Self> {
        Arc::new(Self {
            answer: Canned::Fail(err),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl DiscoverySource for CannedSource {
    async fn fetch(&self) -> Result<DiscoverPayload, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.answer {
            Canned::Rows(rows) => Ok(DiscoverPayload { rows: rows.clone() }),
            Canned::Fail(make) => Err(make()),
        }
    }
}

/// Records every body; fails the ones containing `fail_on`
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<OutboundMessage>>,
    pub attempts: AtomicUsize,
    pub fail_on: Option<String>,
}

impl RecordingTransport {
    pub fn failing_on(needle: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_on: Some(needle.to_string()),
            ..Default::default()
        })
    }

    pub fn bodies(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.body.clone()).collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageTransport for RecordingTransport {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn publish(&self, message: &OutboundMessage) -> Result<DispatchReceipt, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(needle) = &self.fail_on {
            if message.body.contains(needle.as_str()) {
                return Err(TransportError::Network("connection reset".into()));
            }
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(DispatchReceipt {
            message_id: format!("m-{}", self.attempts()),
        })
    }
}

/// Wraps a memory store, counting writes and optionally failing reads/writes
#[derive(Default)]
pub struct ProbedStore {
    pub inner: MemorySeenKeyStore,
    pub writes: AtomicUsize,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

impl ProbedStore {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SeenKeyStore for ProbedStore {
    fn backend(&self) -> &'static str {
        "probed"
    }

    async fn existing(&self, keys: &[EventKey]) -> courtside_store::Result<HashSet<EventKey>> {
        if self.fail_reads {
            return Err(StoreError::Pool("connection refused".into()));
        }
        self.inner.existing(keys).await
    }

    async fn record(&self, key: &EventKey, seen_at: DateTime<Utc>) -> courtside_store::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(StoreError::Pool("connection refused".into()));
        }
        self.inner.record(key, seen_at).await
    }

    async fn is_healthy(&self) -> bool {
        !self.fail_reads
    }
}

pub fn extractor() -> Extractor {
    Extractor::new(
        [VenueId::new(ARENA), VenueId::new(SOBO)],
        "Volleyball",
        vec![ProgramType::Pickup, ProgramType::DropIn],
    )
}

pub fn pipeline(
    source: Arc<dyn DiscoverySource>,
    store: Arc<dyn SeenKeyStore>,
    transport: Arc<dyn MessageTransport>,
    mode: NotifyMode,
) -> Pipeline {
    Pipeline::new(
        source,
        extractor(),
        DedupGate::new(store, Duration::from_secs(2)),
        Notifier::new(
            transport,
            MessageFormatter::new(chrono_tz::America::Denver),
            mode,
            Duration::from_secs(2),
        ),
    )
}

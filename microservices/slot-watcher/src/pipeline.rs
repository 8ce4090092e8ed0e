//! Pipeline Orchestrator
//!
//! `Idle -> Fetching -> Extracting -> Deduplicating -> Notifying -> Done | Failed`
//!
//! Every outcome, including upstream and store failures, ends up in a
//! [`RunReport`]; nothing here returns an error or panics.

use chrono::{DateTime, Utc};
use courtside_core::{EventKey, RunId};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, Instrument};

use crate::dedup::DedupGate;
use crate::extract::{Exclusions, Extractor};
use crate::identity;
use crate::notify::{KeyFailure, Notifier, PendingAlert};
use crate::upstream::DiscoverySource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Idle,
    Fetching,
    Extracting,
    Deduplicating,
    Notifying,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Done,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunCounts {
    /// Rows returned by the upstream
    pub fetched: usize,
    /// Rows skipped as malformed
    pub skipped: usize,
    /// Well-formed rows outside the venue/sport/program/spots filters
    pub excluded: usize,
    /// Opportunities that passed every filter
    pub filtered: usize,
    /// Same key seen twice in one poll
    pub duplicate_in_batch: usize,
    pub already_seen: usize,
    pub new: usize,
    pub notified: usize,
    pub failed: usize,
    pub marked: usize,
}

/// Fatal failure that ended the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFailure {
    pub stage: RunStage,
    pub kind: &'static str,
    pub message: String,
    /// Whether the next scheduled poll may succeed unchanged
    pub transient: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub status: RunStatus,
    pub stage: RunStage,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub counts: RunCounts,
    pub exclusions: Exclusions,
    pub warnings: Vec<String>,
    pub unmarked_keys: Vec<EventKey>,
    pub dispatch_failures: Vec<KeyFailure>,
    pub mark_failures: Vec<KeyFailure>,
    pub error: Option<RunFailure>,
}

impl RunReport {
    fn begin(run_id: RunId) -> Self {
        Self {
            run_id,
            status: RunStatus::Done,
            stage: RunStage::Idle,
            started_at: Utc::now(),
            duration_ms: 0,
            counts: RunCounts::default(),
            exclusions: Exclusions::default(),
            warnings: Vec::new(),
            unmarked_keys: Vec::new(),
            dispatch_failures: Vec::new(),
            mark_failures: Vec::new(),
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Done
    }

    fn enter(&mut self, stage: RunStage) {
        info!(from = ?self.stage, to = ?stage, "Stage transition");
        self.stage = stage;
    }

    fn fail(&mut self, kind: &'static str, message: String, transient: bool) {
        error!(stage = ?self.stage, kind, %message, "Run failed");
        self.error = Some(RunFailure {
            stage: self.stage,
            kind,
            message,
            transient,
        });
        self.status = RunStatus::Failed;
        self.stage = RunStage::Failed;
    }
}

pub struct Pipeline {
    source: Arc<dyn DiscoverySource>,
    extractor: Extractor,
    gate: DedupGate,
    notifier: Notifier,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn DiscoverySource>,
        extractor: Extractor,
        gate: DedupGate,
        notifier: Notifier,
    ) -> Self {
        Self {
            source,
            extractor,
            gate,
            notifier,
        }
    }

    pub fn gate(&self) -> &DedupGate {
        &self.gate
    }

    pub fn source(&self) -> &dyn DiscoverySource {
        self.source.as_ref()
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// One full poll. Overlapping calls are allowed; they share nothing but
    /// the seen-key store.
    pub async fn run(&self) -> RunReport {
        let run_id = RunId::generate();
        let span = info_span!("pipeline_run", run_id = %run_id);
        self.execute(run_id).instrument(span).await
    }

    async fn execute(&self, run_id: RunId) -> RunReport {
        let clock = Instant::now();
        let mut report = RunReport::begin(run_id);

        self.advance(&mut report).await;

        report.duration_ms = clock.elapsed().as_millis() as u64;
        if report.is_success() {
            report.enter(RunStage::Done);
            info!(
                fetched = report.counts.fetched,
                filtered = report.counts.filtered,
                new = report.counts.new,
                notified = report.counts.notified,
                failed = report.counts.failed,
                duration_ms = report.duration_ms,
                "Run finished"
            );
        }
        report
    }

    async fn advance(&self, report: &mut RunReport) {
        report.enter(RunStage::Fetching);
        let payload = match self.source.fetch().await {
            Ok(payload) => payload,
            Err(e) => {
                report.fail(e.kind(), e.to_string(), e.is_transient());
                return;
            }
        };
        report.counts.fetched = payload.rows.len();

        report.enter(RunStage::Extracting);
        let extraction = self.extractor.extract(&payload);
        report.counts.skipped = extraction.warnings.len();
        report.counts.excluded = extraction.excluded.total();
        report.counts.filtered = extraction.opportunities.len();
        report.exclusions = extraction.excluded;
        report.warnings = extraction.warnings.iter().map(ToString::to_string).collect();

        report.enter(RunStage::Deduplicating);
        let mut in_batch = HashSet::new();
        let mut candidates = Vec::with_capacity(extraction.opportunities.len());
        for opportunity in extraction.opportunities {
            let key = identity::derive(&opportunity);
            if in_batch.insert(key.clone()) {
                candidates.push(PendingAlert { key, opportunity });
            } else {
                report.counts.duplicate_in_batch += 1;
            }
        }

        let keys: Vec<EventKey> = candidates.iter().map(|c| c.key.clone()).collect();
        let fresh = match self.gate.filter_new(&keys).await {
            Ok(fresh) => fresh,
            Err(e) => {
                report.fail(e.kind(), e.to_string(), true);
                return;
            }
        };

        let alerts: Vec<PendingAlert> = candidates
            .into_iter()
            .filter(|c| fresh.contains(&c.key))
            .collect();
        report.counts.new = alerts.len();
        report.counts.already_seen = keys.len() - alerts.len();

        report.enter(RunStage::Notifying);
        let outcome = self.notifier.notify(&alerts, &self.gate).await;
        report.counts.notified = outcome.notified;
        report.counts.failed = outcome.failed;
        report.counts.marked = outcome.marked;
        report.unmarked_keys = outcome.unmarked_keys;
        report.dispatch_failures = outcome.dispatch_failures;
        report.mark_failures = outcome.mark_failures;
    }
}

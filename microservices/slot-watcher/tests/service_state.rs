//! Invocation state, run stats and readiness

mod common;

use common::*;
use courtside_core::CourtsideService;
use std::sync::Arc;

use slot_watcher::config::{NotifyMode, ProbeSettings};
use slot_watcher::notify::MessageFormatter;
use slot_watcher::service::{AppState, RunStats, SlotWatcherService};

fn state(store: Arc<ProbedStore>, rows: Vec<serde_json::Value>) -> AppState {
    AppState {
        pipeline: Arc::new(pipeline(
            CannedSource::rows(rows),
            store,
            Arc::new(RecordingTransport::default()),
            NotifyMode::PerOpportunity,
        )),
        formatter: MessageFormatter::new(chrono_tz::America::Denver),
        probe: Arc::new(ProbeSettings::from_lookup(|_: &str| None).unwrap()),
        stats: RunStats::new(),
    }
}

#[tokio::test]
async fn invocations_accumulate_stats() {
    let state = state(
        Arc::new(ProbedStore::default()),
        vec![game_row("g-1", ARENA, 2), game_row("g-2", ARENA, 1)],
    );

    let first = state.invoke().await;
    let second = state.invoke().await;
    assert_eq!(first.counts.notified, 2);
    assert_eq!(second.counts.notified, 0);

    let snapshot = state.stats.snapshot().await;
    let counter = |name: &str| {
        snapshot
            .counters
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value)
            .unwrap()
    };
    assert_eq!(counter("runs_total"), 2.0);
    assert_eq!(counter("runs_failed_total"), 0.0);
    assert_eq!(counter("alerts_notified_total"), 2.0);
    assert_eq!(snapshot.last_run.unwrap().run_id, second.run_id);
}

#[tokio::test]
async fn failed_runs_are_counted() {
    let state = state(
        Arc::new(ProbedStore {
            fail_reads: true,
            ..Default::default()
        }),
        vec![game_row("g-1", ARENA, 2)],
    );

    let report = state.invoke().await;
    assert!(!report.is_success());

    let snapshot = state.stats.snapshot().await;
    let failed = snapshot
        .counters
        .iter()
        .find(|c| c.name == "runs_failed_total")
        .unwrap();
    assert_eq!(failed.value, 1.0);
}

#[tokio::test]
async fn readiness_follows_the_store() {
    let bind = "127.0.0.1:0".parse().unwrap();

    let healthy = SlotWatcherService::new(state(Arc::new(ProbedStore::default()), Vec::new()), bind);
    let status = healthy.ready().await;
    assert!(status.ready);
    assert_eq!(status.dependencies[0].name, "seen-key-store:probed");

    let down = SlotWatcherService::new(
        state(
            Arc::new(ProbedStore {
                fail_reads: true,
                ..Default::default()
            }),
            Vec::new(),
        ),
        bind,
    );
    assert!(!down.ready().await.ready);
    assert!(down.health().await.healthy);
}

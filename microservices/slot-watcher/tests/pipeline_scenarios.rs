//! End-to-end pipeline runs against in-process fakes

mod common;

use common::*;
use courtside_store::SeenKeyStore;
use serde_json::json;
use std::sync::Arc;

use slot_watcher::config::NotifyMode;
use slot_watcher::error::UpstreamError;
use slot_watcher::extract::Extractor;
use slot_watcher::identity;
use slot_watcher::notify::LogPublisher;
use slot_watcher::pipeline::{RunStage, RunStatus};
use slot_watcher::upstream::DiscoverPayload;

fn keys_of(rows: &[serde_json::Value]) -> Vec<courtside_core::EventKey> {
    extractor()
        .extract(&DiscoverPayload { rows: rows.to_vec() })
        .opportunities
        .iter()
        .map(identity::derive)
        .collect()
}

#[tokio::test]
async fn one_open_one_full_session_yields_one_alert() {
    let rows = vec![game_row("g-open", ARENA, 1), game_row("g-full", ARENA, 0)];
    let store = Arc::new(ProbedStore::default());
    let transport = Arc::new(RecordingTransport::default());
    let pipeline = pipeline(
        CannedSource::rows(rows),
        store.clone(),
        transport.clone(),
        NotifyMode::PerOpportunity,
    );

    let report = pipeline.run().await;

    assert_eq!(report.status, RunStatus::Done);
    assert_eq!(report.stage, RunStage::Done);
    assert_eq!(report.counts.fetched, 2);
    assert_eq!(report.counts.filtered, 1);
    assert_eq!(report.exclusions.no_spots, 1);
    assert_eq!(report.counts.new, 1);
    assert_eq!(report.counts.notified, 1);
    assert_eq!(transport.bodies(), vec![
        "New Volo volleyball opening: Monday Pickup (Drop-in) @ Volo Sports Arena November 2 7PM - 1 spot left"
            .to_string()
    ]);
    assert_eq!(store.writes(), 1);
    assert_eq!(store.inner.len(), 1);
}

#[tokio::test]
async fn second_poll_of_same_payload_is_silent() {
    let rows = vec![game_row("g-open", ARENA, 1), game_row("g-full", ARENA, 0)];
    let store = Arc::new(ProbedStore::default());
    let transport = Arc::new(RecordingTransport::default());
    let pipeline = pipeline(
        CannedSource::rows(rows),
        store.clone(),
        transport.clone(),
        NotifyMode::PerOpportunity,
    );

    let first = pipeline.run().await;
    let second = pipeline.run().await;

    assert_eq!(first.counts.notified, 1);
    assert_eq!(second.counts.notified, 0);
    assert_eq!(second.counts.already_seen, 1);
    assert_eq!(transport.attempts(), 1);
    assert_eq!(store.writes(), 1);
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn fluctuating_spot_count_does_not_realert() {
    let store = Arc::new(ProbedStore::default());
    let transport = Arc::new(RecordingTransport::default());

    for spots in [3, 2, 5] {
        let report = pipeline(
            CannedSource::rows(vec![game_row("g-1", ARENA, spots)]),
            store.clone(),
            transport.clone(),
            NotifyMode::PerOpportunity,
        )
        .run()
        .await;
        assert!(report.is_success());
    }

    assert_eq!(transport.attempts(), 1);
}

#[tokio::test]
async fn known_key_is_never_notified() {
    let rows = vec![game_row("g-1", ARENA, 4)];
    let store = Arc::new(ProbedStore::default());
    for key in keys_of(&rows) {
        store.inner.record(&key, chrono::Utc::now()).await.unwrap();
    }
    let transport = Arc::new(RecordingTransport::default());

    let report = pipeline(
        CannedSource::rows(rows),
        store.clone(),
        transport.clone(),
        NotifyMode::PerOpportunity,
    )
    .run()
    .await;

    assert_eq!(report.counts.filtered, 1);
    assert_eq!(report.counts.new, 0);
    assert_eq!(transport.attempts(), 0);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn every_new_opportunity_is_attempted_and_recorded() {
    let rows: Vec<_> = (0..5)
        .map(|i| game_row(&format!("g-{}", i), if i % 2 == 0 { ARENA } else { SOBO }, 2))
        .collect();
    let store = Arc::new(ProbedStore::default());
    let transport = Arc::new(RecordingTransport::default());

    let report = pipeline(
        CannedSource::rows(rows.clone()),
        store.clone(),
        transport.clone(),
        NotifyMode::PerOpportunity,
    )
    .run()
    .await;

    assert_eq!(report.counts.new, 5);
    assert_eq!(report.counts.notified, 5);
    assert_eq!(report.counts.marked, 5);
    assert_eq!(transport.attempts(), 5);
    assert_eq!(store.writes(), 5);
    for key in keys_of(&rows) {
        assert!(store.inner.contains(&key));
    }
}

#[tokio::test]
async fn one_failed_dispatch_does_not_block_the_rest() {
    let mut rows = vec![
        game_row("g-a", ARENA, 2),
        game_row("g-b", ARENA, 2),
        game_row("g-c", ARENA, 2),
    ];
    rows[1]["game"]["leagueByLeague"]["name"] = json!("Cursed Pickup");
    let keys = keys_of(&rows);

    let store = Arc::new(ProbedStore::default());
    let transport = RecordingTransport::failing_on("Cursed");
    let report = pipeline(
        CannedSource::rows(rows),
        store.clone(),
        transport.clone(),
        NotifyMode::PerOpportunity,
    )
    .run()
    .await;

    assert_eq!(report.status, RunStatus::Done);
    assert_eq!(transport.attempts(), 3);
    assert_eq!(report.counts.notified, 2);
    assert_eq!(report.counts.failed, 1);
    assert_eq!(report.unmarked_keys, vec![keys[1].clone()]);
    assert_eq!(report.dispatch_failures[0].kind, "transport_network");
    assert!(store.inner.contains(&keys[0]));
    assert!(!store.inner.contains(&keys[1]));
    assert!(store.inner.contains(&keys[2]));
}

#[tokio::test]
async fn failed_dispatch_is_retried_next_poll() {
    let rows = vec![game_row("g-a", ARENA, 2)];
    let store = Arc::new(ProbedStore::default());

    let report = pipeline(
        CannedSource::rows(rows.clone()),
        store.clone(),
        RecordingTransport::failing_on("Monday"),
        NotifyMode::PerOpportunity,
    )
    .run()
    .await;
    assert_eq!(report.counts.failed, 1);

    let transport = Arc::new(RecordingTransport::default());
    let retry = pipeline(
        CannedSource::rows(rows),
        store.clone(),
        transport.clone(),
        NotifyMode::PerOpportunity,
    )
    .run()
    .await;
    assert_eq!(retry.counts.notified, 1);
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test]
async fn dry_run_leaves_openings_for_the_real_transport() {
    let rows = vec![game_row("g-a", ARENA, 2)];
    let store = Arc::new(ProbedStore::default());

    let dry_run = pipeline(
        CannedSource::rows(rows.clone()),
        store.clone(),
        Arc::new(LogPublisher::new("volo-alerts".into())),
        NotifyMode::PerOpportunity,
    )
    .run()
    .await;
    assert_eq!(dry_run.counts.notified, 1);
    assert_eq!(dry_run.counts.marked, 0);
    assert_eq!(dry_run.unmarked_keys.len(), 1);
    assert_eq!(store.writes(), 0);

    let transport = Arc::new(RecordingTransport::default());
    let live = pipeline(
        CannedSource::rows(rows),
        store.clone(),
        transport.clone(),
        NotifyMode::PerOpportunity,
    )
    .run()
    .await;
    assert_eq!(live.counts.new, 1);
    assert_eq!(live.counts.marked, 1);
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test]
async fn upstream_failure_has_no_side_effects() {
    let store = Arc::new(ProbedStore::default());
    let transport = Arc::new(RecordingTransport::default());

    let report = pipeline(
        CannedSource::failing(|| UpstreamError::Blocked {
            status: 403,
            reason: "error code: 1010".into(),
        }),
        store.clone(),
        transport.clone(),
        NotifyMode::PerOpportunity,
    )
    .run()
    .await;

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.stage, RunStage::Failed);
    let error = report.error.expect("failure is reported");
    assert_eq!(error.kind, "upstream_blocked");
    assert_eq!(error.stage, RunStage::Fetching);
    assert!(error.transient);
    assert_eq!(store.writes(), 0);
    assert_eq!(transport.attempts(), 0);
}

#[tokio::test]
async fn schema_change_is_reported_as_non_transient() {
    let report = pipeline(
        CannedSource::failing(|| UpstreamError::Rejected("field 'drop_in_capacity' not found".into())),
        Arc::new(ProbedStore::default()),
        Arc::new(RecordingTransport::default()),
        NotifyMode::PerOpportunity,
    )
    .run()
    .await;

    let error = report.error.expect("failure is reported");
    assert_eq!(error.kind, "upstream_rejected");
    assert!(!error.transient);
}

#[tokio::test]
async fn store_read_failure_aborts_before_notifying() {
    let store = Arc::new(ProbedStore {
        fail_reads: true,
        ..Default::default()
    });
    let transport = Arc::new(RecordingTransport::default());

    let report = pipeline(
        CannedSource::rows(vec![game_row("g-1", ARENA, 2)]),
        store.clone(),
        transport.clone(),
        NotifyMode::PerOpportunity,
    )
    .run()
    .await;

    assert_eq!(report.status, RunStatus::Failed);
    let error = report.error.expect("failure is reported");
    assert_eq!(error.stage, RunStage::Deduplicating);
    assert_eq!(error.kind, "store_unavailable");
    assert_eq!(transport.attempts(), 0);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn store_write_failure_after_dispatch_is_recorded_not_fatal() {
    let store = Arc::new(ProbedStore {
        fail_writes: true,
        ..Default::default()
    });
    let transport = Arc::new(RecordingTransport::default());

    let report = pipeline(
        CannedSource::rows(vec![game_row("g-1", ARENA, 2)]),
        store.clone(),
        transport.clone(),
        NotifyMode::PerOpportunity,
    )
    .run()
    .await;

    assert_eq!(report.status, RunStatus::Done);
    assert_eq!(report.counts.notified, 1);
    assert_eq!(report.counts.marked, 0);
    assert_eq!(report.mark_failures.len(), 1);
    assert_eq!(report.mark_failures[0].kind, "store_unavailable");
    assert_eq!(report.unmarked_keys.len(), 1);
}

#[tokio::test]
async fn duplicate_rows_in_one_poll_alert_once() {
    let rows = vec![game_row("g-1", ARENA, 2), game_row("g-1", ARENA, 1)];
    let transport = Arc::new(RecordingTransport::default());

    let report = pipeline(
        CannedSource::rows(rows),
        Arc::new(ProbedStore::default()),
        transport.clone(),
        NotifyMode::PerOpportunity,
    )
    .run()
    .await;

    assert_eq!(report.counts.filtered, 2);
    assert_eq!(report.counts.duplicate_in_batch, 1);
    assert_eq!(report.counts.new, 1);
    assert_eq!(transport.attempts(), 1);
    // First occurrence wins
    assert!(transport.bodies()[0].contains("2 spots left"));
}

#[tokio::test]
async fn combined_mode_sends_one_message_and_marks_all() {
    let rows = vec![game_row("g-1", ARENA, 2), game_row("g-2", SOBO, 1)];
    let store = Arc::new(ProbedStore::default());
    let transport = Arc::new(RecordingTransport::default());

    let report = pipeline(
        CannedSource::rows(rows),
        store.clone(),
        transport.clone(),
        NotifyMode::Combined,
    )
    .run()
    .await;

    assert_eq!(transport.attempts(), 1);
    assert_eq!(report.counts.notified, 2);
    assert_eq!(store.writes(), 2);
    let body = &transport.bodies()[0];
    assert!(body.starts_with("New Volo volleyball openings (Volo Sports Arena):"));
    assert_eq!(body.lines().count(), 3);
}

#[tokio::test]
async fn malformed_rows_are_skipped_and_counted() {
    let mut broken = game_row("g-2", ARENA, 2);
    broken["game"]["venueByVenue"] = serde_json::Value::Null;
    let rows = vec![broken, game_row("g-1", ARENA, 2), json!({ "league_id": "l-9" })];
    let transport = Arc::new(RecordingTransport::default());

    let report = pipeline(
        CannedSource::rows(rows),
        Arc::new(ProbedStore::default()),
        transport.clone(),
        NotifyMode::PerOpportunity,
    )
    .run()
    .await;

    assert_eq!(report.status, RunStatus::Done);
    assert_eq!(report.counts.skipped, 2);
    assert_eq!(report.warnings.len(), 2);
    assert_eq!(report.counts.notified, 1);
}

#[tokio::test]
async fn empty_catalogue_is_a_quiet_success() {
    let transport = Arc::new(RecordingTransport::default());
    let report = pipeline(
        CannedSource::rows(Vec::new()),
        Arc::new(ProbedStore::default()),
        transport.clone(),
        NotifyMode::Combined,
    )
    .run()
    .await;

    assert_eq!(report.status, RunStatus::Done);
    assert_eq!(report.counts.fetched, 0);
    assert_eq!(transport.attempts(), 0);
}

#[test]
fn extraction_never_leaks_other_venues_or_full_sessions() {
    let venues = [ARENA, SOBO, "somewhere-else", "6ef3e03d-9655-4102-9779-a717c28523ef"];
    let mut rows = Vec::new();
    for (i, venue) in venues.iter().enumerate() {
        for spots in [-1, 0, 1, 7] {
            rows.push(game_row(&format!("g-{}-{}", i, spots), venue, spots));
        }
    }

    let extractor: Extractor = extractor();
    let extraction = extractor.extract(&DiscoverPayload { rows });

    assert!(!extraction.opportunities.is_empty());
    for opportunity in &extraction.opportunities {
        assert!([ARENA, SOBO].contains(&opportunity.venue_id.as_str()));
        assert!(opportunity.available_spots > 0);
    }
}

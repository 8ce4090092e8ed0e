//! HTTP invocation surface
//!
//! The scheduler calls `POST /invoke` on every tick; the trigger body is
//! ignored. Each call is an independent pipeline run.

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use courtside_core::{
    CourtsideService, DependencyStatus, HealthStatus, ReadinessStatus, Result,
};
use courtside_telemetry::{Counter, Histogram, MetricSnapshot};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::ProbeSettings;
use crate::listing::{list_openings, OpeningsReport};
use crate::notify::MessageFormatter;
use crate::pipeline::{Pipeline, RunReport};
use crate::probe::{run_probe, ProbeReport};

/// Cumulative counters across runs served by this process
#[derive(Clone)]
pub struct RunStats {
    runs: Counter,
    failed_runs: Counter,
    notified: Counter,
    dispatch_failures: Counter,
    mark_failures: Counter,
    duration_ms: Histogram,
    last_run: Arc<RwLock<Option<RunReport>>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub counters: Vec<MetricSnapshot>,
    pub mean_duration_ms: f64,
    pub p95_duration_ms: f64,
    pub last_run: Option<RunReport>,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            runs: Counter::new("runs_total"),
            failed_runs: Counter::new("runs_failed_total"),
            notified: Counter::new("alerts_notified_total"),
            dispatch_failures: Counter::new("alerts_dispatch_failed_total"),
            mark_failures: Counter::new("keys_mark_failed_total"),
            duration_ms: Histogram::with_capacity("run_duration_ms", 500),
            last_run: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn observe(&self, report: &RunReport) {
        self.runs.inc();
        if !report.is_success() {
            self.failed_runs.inc();
        }
        self.notified.add(report.counts.notified as u64);
        self.dispatch_failures.add(report.dispatch_failures.len() as u64);
        self.mark_failures.add(report.mark_failures.len() as u64);
        self.duration_ms.record(report.duration_ms as f64);
        *self.last_run.write().await = Some(report.clone());
    }

    pub async fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            counters: vec![
                self.runs.snapshot(),
                self.failed_runs.snapshot(),
                self.notified.snapshot(),
                self.dispatch_failures.snapshot(),
                self.mark_failures.snapshot(),
            ],
            mean_duration_ms: self.duration_ms.mean(),
            p95_duration_ms: self.duration_ms.percentile(95.0),
            last_run: self.last_run.read().await.clone(),
        }
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub formatter: MessageFormatter,
    pub probe: Arc<ProbeSettings>,
    pub stats: RunStats,
}

impl AppState {
    /// Run the pipeline once and fold the report into the stats
    pub async fn invoke(&self) -> RunReport {
        let report = self.pipeline.run().await;
        self.stats.observe(&report).await;
        report
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/invoke", post(invoke))
        .route("/probe", post(probe))
        .route("/openings", get(openings))
        .route("/stats", get(stats))
        .with_state(state)
}

async fn invoke(State(state): State<AppState>, _trigger: Bytes) -> (StatusCode, Json<RunReport>) {
    let report = state.invoke().await;
    let status = if report.is_success() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

async fn probe(State(state): State<AppState>) -> Json<ProbeReport> {
    Json(run_probe(&state.probe).await)
}

async fn openings(
    State(state): State<AppState>,
) -> std::result::Result<Json<OpeningsReport>, (StatusCode, Json<serde_json::Value>)> {
    list_openings(state.pipeline.source(), state.pipeline.extractor(), &state.formatter)
        .await
        .map(Json)
        .map_err(|e| {
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "kind": e.kind(), "message": e.to_string() })),
            )
        })
}

async fn stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot().await)
}

#[derive(Clone)]
pub struct SlotWatcherService {
    state: AppState,
    bind: SocketAddr,
    start_time: Instant,
}

impl SlotWatcherService {
    pub fn new(state: AppState, bind: SocketAddr) -> Self {
        Self {
            state,
            bind,
            start_time: Instant::now(),
        }
    }
}

#[async_trait]
impl CourtsideService for SlotWatcherService {
    fn service_id(&self) -> &'static str {
        "slot-watcher"
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus {
            healthy: true,
            service_id: self.service_id().to_string(),
            version: self.version().to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    async fn ready(&self) -> ReadinessStatus {
        let gate = self.state.pipeline.gate();
        let started = Instant::now();
        let available = gate.is_healthy().await;

        ReadinessStatus {
            ready: available,
            dependencies: vec![DependencyStatus {
                name: format!("seen-key-store:{}", gate.store().backend()),
                available,
                latency_ms: Some(started.elapsed().as_millis() as u64),
            }],
        }
    }

    async fn shutdown(&self) -> Result<()> {
        info!("Shutting down slot watcher");
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        info!(bind = %self.bind, "Starting slot watcher HTTP surface");

        let service = Arc::new(self.clone());
        let app = router(self.state.clone())
            .route(
                "/health",
                get({
                    let service = service.clone();
                    move || async move { Json(service.health().await) }
                }),
            )
            .route(
                "/ready",
                get(move || async move {
                    let status = service.ready().await;
                    let code = if status.ready {
                        StatusCode::OK
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    };
                    (code, Json(status))
                }),
            );

        let listener = tokio::net::TcpListener::bind(self.bind).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

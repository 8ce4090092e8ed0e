//! Slot watcher entry point
//!
//! `RUN_MODE` picks what the process does:
//! - `serve` (default): HTTP surface, one pipeline run per `POST /invoke`
//! - `once`: a single run, summary JSON on stdout, exit code 1 on failure
//! - `probe`: connectivity diagnostics only
//! - `list`: print current openings, no store or transport

use anyhow::Context;
use courtside_core::{MicroserviceRuntime, ServiceConfig};
use std::sync::Arc;
use tracing::{info, Instrument};

use slot_watcher::bootstrap;
use slot_watcher::config::{ProbeSettings, RunMode, UpstreamSettings, WatcherConfig};
use slot_watcher::extract::Extractor;
use slot_watcher::listing::list_openings;
use slot_watcher::notify::MessageFormatter;
use slot_watcher::probe::run_probe;
use slot_watcher::service::{AppState, RunStats, SlotWatcherService};
use slot_watcher::upstream::VoloClient;

const SERVICE_NAME: &str = "slot-watcher";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    courtside_telemetry::init(SERVICE_NAME).context("initialising telemetry")?;

    let mode = RunMode::from_env()?;
    run(mode)
        .instrument(courtside_telemetry::service_span(SERVICE_NAME, env!("CARGO_PKG_VERSION")))
        .await
}

async fn run(mode: RunMode) -> anyhow::Result<()> {
    info!(?mode, "Starting slot watcher");

    match mode {
        RunMode::Probe => {
            let settings = ProbeSettings::from_env()?;
            let report = run_probe(&settings).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        RunMode::List => {
            let settings = UpstreamSettings::from_env()?;
            let client = VoloClient::new(&settings)?;
            let report = list_openings(
                &client,
                &Extractor::from_settings(&settings),
                &MessageFormatter::new(settings.display_tz),
            )
            .await?;
            for opening in &report.openings {
                println!("{}", opening);
            }
            info!(
                fetched = report.fetched,
                skipped = report.skipped,
                openings = report.openings.len(),
                "Listing finished"
            );
        }
        RunMode::Once => {
            let config = WatcherConfig::from_env()?;
            let pipeline = bootstrap::build_pipeline(&config).await?;
            let report = pipeline.run().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_success() {
                std::process::exit(1);
            }
        }
        RunMode::Serve => {
            let config = WatcherConfig::from_env()?;
            let service_config = ServiceConfig::from_env()?;
            let pipeline = bootstrap::build_pipeline(&config).await?;

            let state = AppState {
                pipeline: Arc::new(pipeline),
                formatter: MessageFormatter::new(config.upstream.display_tz),
                probe: Arc::new(ProbeSettings::from_env()?),
                stats: RunStats::new(),
            };
            let service = SlotWatcherService::new(state, service_config.bind_address()?);
            MicroserviceRuntime::run(Arc::new(service)).await?;
        }
    }

    Ok(())
}

//! Courtside Telemetry
//!
//! Structured logging via `tracing` and lightweight in-process metrics.

mod config;
mod tracing_setup;
mod metrics;

pub use config::TelemetryConfig;
pub use tracing_setup::{init_tracing, service_span};
pub use metrics::{Counter, Histogram, MetricSnapshot};

/// Initialize all telemetry for a service
pub fn init(service_name: &str) -> Result<(), TelemetryError> {
    let config = TelemetryConfig::from_env();
    init_tracing(service_name, &config)
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Tracing initialization failed: {0}")]
    TracingInit(String),
}

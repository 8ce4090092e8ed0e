//! Slot Watcher - Volo volleyball pickup/drop-in alerts
//!
//! Polls the public GraphQL catalogue, keeps openings at the watched venues,
//! derives a stable event key for each, drops keys already alerted on and
//! publishes one alert per new opening (or one combined alert per run).
//!
//! Stages:
//! - [`upstream`]: one DiscoverDaily query per poll
//! - [`extract`]: rows to [`model::SessionOpportunity`] values
//! - [`identity`]: event keys
//! - [`dedup`]: seen-key lookups and writes
//! - [`notify`]: formatting and dispatch
//! - [`pipeline`]: the per-invocation state machine

pub mod bootstrap;
pub mod config;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod identity;
pub mod listing;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod probe;
pub mod service;
pub mod upstream;

pub use config::{RunMode, WatcherConfig};
pub use pipeline::{Pipeline, RunReport, RunStage, RunStatus};
pub use service::{AppState, RunStats, SlotWatcherService};

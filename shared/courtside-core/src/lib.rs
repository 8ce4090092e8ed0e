//! Courtside Core - Shared domain types and service infrastructure
//!
//! This crate provides:
//! - Standard service trait every watcher implements
//! - Common domain types (EventKey, VenueId, RunId)
//! - Error handling utilities
//! - Configuration management

pub mod config;
pub mod domain;
pub mod error;
pub mod service;

pub use config::ServiceConfig;
pub use domain::*;
pub use error::{CourtsideError, Result};
pub use service::{CourtsideService, DependencyStatus, HealthStatus, MicroserviceRuntime, ReadinessStatus};

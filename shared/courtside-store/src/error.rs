//! Seen-Key Store Error Types

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("Pool error: {0}")]
    Pool(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    /// Stable identifier used in run summaries
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Query(_) => "store_query",
            Self::Pool(_) => "store_unavailable",
            Self::Configuration(_) => "store_config",
            Self::Timeout(_) => "store_timeout",
        }
    }
}

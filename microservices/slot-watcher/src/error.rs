//! Error taxonomy for the slot watcher
//!
//! - [`UpstreamError`]: fatal to a run, nothing is written or sent
//! - [`ExtractionWarning`]: one listing row skipped, the run continues
//! - [`courtside_store::StoreError`]: fatal during the read phase, recorded during the write phase
//! - [`TransportError`]: isolated to one message
//! - [`ConfigError`]: raised at process start only

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection failure, DNS failure or timeout
    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream returned HTTP {status}: {preview}")]
    Status { status: u16, preview: String },

    /// Edge protection (WAF / bot challenge) answered instead of the API
    #[error("Blocked by edge protection (HTTP {status}): {reason}")]
    Blocked { status: u16, reason: String },

    /// Body is not the expected GraphQL envelope
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// GraphQL layer answered with `errors`, usually a schema change
    #[error("Query rejected: {0}")]
    Rejected(String),
}

impl UpstreamError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "upstream_network",
            Self::Status { .. } => "upstream_status",
            Self::Blocked { .. } => "upstream_blocked",
            Self::Malformed(_) => "upstream_malformed",
            Self::Rejected(_) => "upstream_rejected",
        }
    }

    /// `true` when a later poll may succeed unchanged; `false` when the
    /// response shape changed and the watcher needs an update
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Blocked { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429 || *status == 408,
            Self::Malformed(_) | Self::Rejected(_) => false,
        }
    }
}

/// A listing row that could not be turned into an opportunity
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionWarning {
    #[error("row {index}: missing field `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("row {index}: invalid `{field}`: {detail}")]
    InvalidField {
        index: usize,
        field: &'static str,
        detail: String,
    },

    #[error("row {index}: neither a game nor a program listing")]
    UnknownShape { index: usize },

    #[error("row {index}: undecodable: {detail}")]
    Undecodable { index: usize, detail: String },
}

impl ExtractionWarning {
    pub fn index(&self) -> usize {
        match self {
            Self::MissingField { index, .. }
            | Self::InvalidField { index, .. }
            | Self::UnknownShape { index }
            | Self::Undecodable { index, .. } => *index,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Transport rejected message with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Dispatch timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl TransportError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "transport_network",
            Self::Rejected { .. } => "transport_rejected",
            Self::Timeout(_) => "transport_timeout",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl From<ConfigError> for courtside_core::CourtsideError {
    fn from(err: ConfigError) -> Self {
        courtside_core::CourtsideError::Config(err.to_string())
    }
}

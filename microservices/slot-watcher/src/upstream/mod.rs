//! Upstream Client - one DiscoverDaily query per poll

pub mod edge;
pub mod query;

use async_trait::async_trait;
use courtside_core::{CourtsideError, Result as CoreResult};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::UpstreamSettings;
use crate::error::UpstreamError;
use edge::{body_preview, EdgeSignals};

/// Raw catalogue rows, exactly as the upstream returned them
#[derive(Debug, Clone, Default)]
pub struct DiscoverPayload {
    pub rows: Vec<Value>,
}

/// Source of the discover catalogue.
///
/// Calls have no side effects and may be repeated freely.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    async fn fetch(&self) -> Result<DiscoverPayload, UpstreamError>;
}

/// HTTP client for the public GraphQL endpoint (no credentials)
pub struct VoloClient {
    http: reqwest::Client,
    endpoint: String,
    request: Value,
}

impl VoloClient {
    pub fn new(settings: &UpstreamSettings) -> CoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| CourtsideError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: settings.endpoint.clone(),
            request: query::discover_request(settings),
        })
    }
}

#[async_trait]
impl DiscoverySource for VoloClient {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch(&self) -> Result<DiscoverPayload, UpstreamError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header(query::ROLE_HEADER, query::ROLE_PLAYER)
            .json(&self.request)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(network_error)?;

        if let Some(reason) = EdgeSignals::inspect(&headers, &body).block_reason(status) {
            warn!(status, %reason, "Upstream request blocked at the edge");
            return Err(UpstreamError::Blocked { status, reason });
        }

        if !(200..300).contains(&status) {
            return Err(UpstreamError::Status {
                status,
                preview: body_preview(&body, 500),
            });
        }

        let payload = parse_envelope(&body)?;
        debug!(rows = payload.rows.len(), "Discover catalogue fetched");
        Ok(payload)
    }
}

#[derive(Deserialize)]
struct GraphQlEnvelope {
    data: Option<Value>,
    errors: Option<Value>,
}

/// Unwrap `{"data": {"discover_daily": [...]}}`, surfacing GraphQL errors
pub fn parse_envelope(body: &str) -> Result<DiscoverPayload, UpstreamError> {
    let envelope: GraphQlEnvelope = serde_json::from_str(body).map_err(|e| {
        UpstreamError::Malformed(format!("{} (body: {})", e, body_preview(body, 200)))
    })?;

    if let Some(errors) = envelope.errors {
        let empty = errors.as_array().map(Vec::is_empty).unwrap_or(false);
        if !errors.is_null() && !empty {
            return Err(UpstreamError::Rejected(body_preview(&errors.to_string(), 500)));
        }
    }

    let data = envelope
        .data
        .ok_or_else(|| UpstreamError::Malformed("response has no `data`".to_string()))?;

    let catalogue = match data {
        Value::Object(mut fields) => fields.remove("discover_daily"),
        _ => None,
    };

    match catalogue {
        Some(Value::Array(rows)) => Ok(DiscoverPayload { rows }),
        Some(Value::Null) => Ok(DiscoverPayload::default()),
        Some(other) => Err(UpstreamError::Malformed(format!(
            "`discover_daily` is not a list: {}",
            body_preview(&other.to_string(), 100)
        ))),
        None => Err(UpstreamError::Malformed(
            "`data.discover_daily` is missing".to_string(),
        )),
    }
}

fn network_error(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Network(format!("request timed out: {}", err))
    } else {
        UpstreamError::Network(err.to_string())
    }
}

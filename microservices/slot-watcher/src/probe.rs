//! Connectivity probe
//!
//! Sends one request to the GraphQL endpoint and describes what came back.
//! Shares no state with the pipeline; it never extracts, dedups or notifies.

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, USER_AGENT};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

use crate::config::{ProbeMode, ProbeSettings};
use crate::upstream::edge::{body_preview, EdgeSignals};
use crate::upstream::query;

const SUCCESS_PREVIEW: usize = 500;
const ERROR_PREVIEW: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    BlockedByEdgeProtection,
    UpstreamServerError,
    ClientOrAccessError,
    Reachable,
    MalformedResponse,
    NetworkOrEnvironmentError,
    Unclassified,
}

impl Classification {
    pub fn next_step(self) -> &'static str {
        match self {
            Self::BlockedByEdgeProtection => {
                "Request is denied before GraphQL executes. Try a different egress IP or runtime, \
                 or ask the endpoint owner for allowlisting."
            }
            Self::UpstreamServerError => "Upstream is failing on its side; retry later.",
            Self::ClientOrAccessError => {
                "Check the endpoint URL, role header and query against the current schema."
            }
            Self::Reachable => "Endpoint reachable; compare with the pipeline's own runs if polls still fail.",
            Self::MalformedResponse => {
                "Endpoint answered 2xx with a non-JSON body; a proxy or captive portal may be in the way."
            }
            Self::NetworkOrEnvironmentError => "Validate DNS, proxy and firewall settings for this runtime.",
            Self::Unclassified => "Collect this report from two runtimes and compare egress behaviour.",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnosis {
    pub is_cloudflare: bool,
    pub is_1010: bool,
    pub classification: Classification,
    pub next_step: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub ok: bool,
    pub started_at: DateTime<Utc>,
    pub endpoint: String,
    pub mode: &'static str,
    pub http_status: Option<u16>,
    pub response_headers: BTreeMap<String, String>,
    pub body_preview: Option<String>,
    pub graphql_errors: Option<Value>,
    pub error: Option<String>,
    pub diagnosis: Diagnosis,
}

fn mode_name(mode: ProbeMode) -> &'static str {
    match mode {
        ProbeMode::Minimal => "minimal",
        ProbeMode::Discover => "discover",
    }
}

/// Classify one HTTP answer
pub fn diagnose(status: u16, headers: &HeaderMap, body: &str) -> Diagnosis {
    let signals = EdgeSignals::inspect(headers, body);
    let classification = if signals.block_reason(status).is_some() {
        Classification::BlockedByEdgeProtection
    } else if status >= 500 {
        Classification::UpstreamServerError
    } else if status >= 400 {
        Classification::ClientOrAccessError
    } else if (200..300).contains(&status) {
        if serde_json::from_str::<Value>(body).map(|v| v.is_object()).unwrap_or(false) {
            Classification::Reachable
        } else {
            Classification::MalformedResponse
        }
    } else {
        Classification::Unclassified
    };

    Diagnosis {
        is_cloudflare: signals.is_cloudflare,
        is_1010: signals.is_1010,
        classification,
        next_step: classification.next_step(),
    }
}

/// Run the probe. Failures are reported, never returned.
#[instrument(skip(settings), fields(endpoint = %settings.endpoint, mode = mode_name(settings.mode)))]
pub async fn run_probe(settings: &ProbeSettings) -> ProbeReport {
    let started_at = Utc::now();
    let mut report = ProbeReport {
        ok: false,
        started_at,
        endpoint: settings.endpoint.clone(),
        mode: mode_name(settings.mode),
        http_status: None,
        response_headers: BTreeMap::new(),
        body_preview: None,
        graphql_errors: None,
        error: None,
        diagnosis: Diagnosis {
            is_cloudflare: false,
            is_1010: false,
            classification: Classification::NetworkOrEnvironmentError,
            next_step: Classification::NetworkOrEnvironmentError.next_step(),
        },
    };

    let body = match settings.mode {
        ProbeMode::Minimal => query::minimal_request(),
        ProbeMode::Discover => query::probe_discover_request(&settings.upstream),
    };

    let http = match reqwest::Client::builder().timeout(settings.timeout).build() {
        Ok(client) => client,
        Err(e) => {
            report.error = Some(format!("HTTP client: {}", e));
            return report;
        }
    };

    let mut request = http
        .post(&settings.endpoint)
        .header(query::ROLE_HEADER, query::ROLE_PLAYER)
        .json(&body);
    if let Some(agent) = &settings.user_agent {
        request = request.header(USER_AGENT, agent.as_str());
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Probe request failed before a response");
            report.error = Some(e.to_string());
            return report;
        }
    };

    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            report.http_status = Some(status);
            report.error = Some(format!("reading body: {}", e));
            return report;
        }
    };

    report.http_status = Some(status);
    report.response_headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    report.diagnosis = diagnose(status, &headers, &text);
    report.ok = matches!(
        report.diagnosis.classification,
        Classification::Reachable | Classification::MalformedResponse
    );
    let limit = if report.ok { SUCCESS_PREVIEW } else { ERROR_PREVIEW };
    report.body_preview = Some(body_preview(&text, limit));
    report.graphql_errors = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|mut v| v.get_mut("errors").map(Value::take))
        .filter(|errors| !errors.is_null());

    info!(
        status,
        classification = ?report.diagnosis.classification,
        "Probe finished"
    );
    report
}

//! Recognising answers from edge protection instead of the API

use reqwest::header::{HeaderMap, SERVER};
use serde::Serialize;

/// What the response says about the CDN / WAF in front of the endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EdgeSignals {
    pub is_cloudflare: bool,
    /// Cloudflare "error code: 1010" (browser signature banned)
    pub is_1010: bool,
    /// Interactive bot challenge page
    pub is_challenge: bool,
}

impl EdgeSignals {
    pub fn inspect(headers: &HeaderMap, body: &str) -> Self {
        let server = headers
            .get(SERVER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let body = body.to_ascii_lowercase();

        Self {
            is_cloudflare: server.contains("cloudflare")
                || headers.keys().any(|name| name.as_str().starts_with("cf-")),
            is_1010: body.contains("error code: 1010"),
            is_challenge: body.contains("just a moment")
                || body.contains("cf-chl")
                || body.contains("attention required"),
        }
    }

    /// Reason to treat the response as blocked, if any
    pub fn block_reason(&self, status: u16) -> Option<String> {
        if self.is_1010 && status >= 400 {
            Some("error code: 1010, request denied by edge access rules".to_string())
        } else if self.is_challenge {
            Some("bot challenge page served instead of the API".to_string())
        } else if self.is_cloudflare && status == 403 {
            Some("HTTP 403 issued by the Cloudflare edge".to_string())
        } else {
            None
        }
    }
}

/// First `limit` characters of a body, safe on multi-byte input
pub fn body_preview(body: &str, limit: usize) -> String {
    body.chars().take(limit).collect()
}

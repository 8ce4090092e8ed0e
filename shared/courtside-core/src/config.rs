//! Configuration management for services

use crate::error::{CourtsideError, Result};
use serde::Deserialize;
use std::env;
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub service_name: String,
    pub http_bind: String,
    pub log_level: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "unknown".to_string()),
            http_bind: env::var("HTTP_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };
        config.bind_address()?;
        Ok(config)
    }

    /// Parsed socket address for the HTTP surface
    pub fn bind_address(&self) -> Result<SocketAddr> {
        self.http_bind
            .parse()
            .map_err(|e| CourtsideError::Config(format!("Invalid HTTP_BIND: {}", e)))
    }
}

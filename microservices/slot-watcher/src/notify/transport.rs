//! Outbound messaging transports

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::TransportError;

/// One text message for every subscriber of a topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub subject: String,
    pub body: String,
}

/// Transport acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReceipt {
    pub message_id: String,
}

/// Publish-to-topic capability. Fan-out to recipients is the transport's
/// concern, never ours.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether an accepted publish reached real subscribers. Keys are only
    /// marked seen after deliveries that did.
    fn records_delivery(&self) -> bool {
        true
    }

    async fn publish(&self, message: &OutboundMessage) -> Result<DispatchReceipt, TransportError>;
}

/// Posts `{topic, subject, message}` as JSON to a publish endpoint
pub struct HttpTopicPublisher {
    http_client: reqwest::Client,
    endpoint: String,
    topic: String,
    timeout: Duration,
}

impl HttpTopicPublisher {
    pub fn new(endpoint: String, topic: String, timeout: Duration) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint,
            topic,
            timeout,
        })
    }
}

#[async_trait]
impl MessageTransport for HttpTopicPublisher {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn publish(&self, message: &OutboundMessage) -> Result<DispatchReceipt, TransportError> {
        let payload = json!({
            "topic": self.topic,
            "subject": message.subject,
            "message": message.body,
        });

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(self.timeout)
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(300).collect(),
            });
        }

        // Acknowledgements without an id still count as delivered to the topic
        let result: serde_json::Value = response.json().await.unwrap_or_default();
        let message_id = result["message_id"]
            .as_str()
            .or_else(|| result["MessageId"].as_str())
            .unwrap_or("unknown")
            .to_string();

        debug!(topic = %self.topic, %message_id, "Message published");
        Ok(DispatchReceipt { message_id })
    }
}

/// Dry-run transport: logs each message and reports success. Nothing
/// reaches subscribers, so it never lets a key be marked seen.
pub struct LogPublisher {
    topic: String,
}

impl LogPublisher {
    pub fn new(topic: String) -> Self {
        Self { topic }
    }
}

#[async_trait]
impl MessageTransport for LogPublisher {
    fn name(&self) -> &'static str {
        "log"
    }

    fn records_delivery(&self) -> bool {
        false
    }

    async fn publish(&self, message: &OutboundMessage) -> Result<DispatchReceipt, TransportError> {
        info!(
            topic = %self.topic,
            subject = %message.subject,
            body = %message.body,
            "Dry-run publish"
        );
        Ok(DispatchReceipt {
            message_id: format!("dry-run-{}", short_digest(&message.body)),
        })
    }
}

fn short_digest(body: &str) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(&Sha256::digest(body.as_bytes())[..8])
}

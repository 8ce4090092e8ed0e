//! Notifier - format, dispatch, then mark seen
//!
//! A key is recorded only after its alert was accepted by the transport.
//! Each dispatch is isolated: one failure leaves that key unmarked (so the
//! next poll retries it) and the rest of the batch still goes out.

pub mod format;
pub mod transport;

use courtside_core::EventKey;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::NotifyMode;
use crate::dedup::DedupGate;
use crate::error::TransportError;
use crate::model::SessionOpportunity;
pub use format::{MessageFormatter, SUBJECT};
pub use transport::{DispatchReceipt, HttpTopicPublisher, LogPublisher, MessageTransport, OutboundMessage};

/// A new opportunity together with its derived key
#[derive(Debug, Clone)]
pub struct PendingAlert {
    pub key: EventKey,
    pub opportunity: SessionOpportunity,
}

/// Why a key was left unmarked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyFailure {
    pub event_key: EventKey,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NotifyOutcome {
    /// Messages handed to the transport
    pub messages_sent: usize,
    /// Opportunities whose alert went out
    pub notified: usize,
    /// Opportunities whose alert failed to go out
    pub failed: usize,
    pub marked: usize,
    /// Keys not recorded this run, whatever the reason
    pub unmarked_keys: Vec<EventKey>,
    pub dispatch_failures: Vec<KeyFailure>,
    /// Alert sent but the key could not be recorded; a later poll may repeat it
    pub mark_failures: Vec<KeyFailure>,
}

pub struct Notifier {
    transport: Arc<dyn MessageTransport>,
    formatter: MessageFormatter,
    mode: NotifyMode,
    timeout: Duration,
}

impl Notifier {
    pub fn new(
        transport: Arc<dyn MessageTransport>,
        formatter: MessageFormatter,
        mode: NotifyMode,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            formatter,
            mode,
            timeout,
        }
    }

    pub async fn notify(&self, alerts: &[PendingAlert], gate: &DedupGate) -> NotifyOutcome {
        let mut outcome = NotifyOutcome::default();
        if alerts.is_empty() {
            return outcome;
        }

        match self.mode {
            NotifyMode::PerOpportunity => {
                for alert in alerts {
                    let body = self.formatter.single(&alert.opportunity);
                    self.deliver(body, std::slice::from_ref(alert), gate, &mut outcome)
                        .await;
                }
            }
            NotifyMode::Combined => {
                let opportunities: Vec<&SessionOpportunity> =
                    alerts.iter().map(|a| &a.opportunity).collect();
                let body = self.formatter.combined(&opportunities);
                self.deliver(body, alerts, gate, &mut outcome).await;
            }
        }

        info!(
            transport = self.transport.name(),
            notified = outcome.notified,
            failed = outcome.failed,
            marked = outcome.marked,
            "Notification batch finished"
        );
        outcome
    }

    /// Send one message covering `covered`, then mark every covered key
    async fn deliver(
        &self,
        body: String,
        covered: &[PendingAlert],
        gate: &DedupGate,
        outcome: &mut NotifyOutcome,
    ) {
        let message = OutboundMessage {
            subject: SUBJECT.to_string(),
            body,
        };
        outcome.messages_sent += 1;

        if let Err(e) = self.dispatch(&message).await {
            for alert in covered {
                warn!(
                    event_key = %alert.key,
                    venue_id = %alert.opportunity.venue_id,
                    kind = e.kind(),
                    error = %e,
                    "Dispatch failed, key left unmarked"
                );
                outcome.failed += 1;
                outcome.unmarked_keys.push(alert.key.clone());
                outcome.dispatch_failures.push(KeyFailure {
                    event_key: alert.key.clone(),
                    kind: e.kind(),
                    message: e.to_string(),
                });
            }
            return;
        }

        if !self.transport.records_delivery() {
            for alert in covered {
                info!(
                    event_key = %alert.key,
                    transport = self.transport.name(),
                    "Dry-run delivery, key left unmarked"
                );
                outcome.notified += 1;
                outcome.unmarked_keys.push(alert.key.clone());
            }
            return;
        }

        for alert in covered {
            outcome.notified += 1;
            match gate.mark_seen(&alert.key).await {
                Ok(()) => outcome.marked += 1,
                Err(e) => {
                    error!(
                        event_key = %alert.key,
                        kind = e.kind(),
                        error = %e,
                        "Alert sent but key not recorded; a later poll may repeat it"
                    );
                    outcome.unmarked_keys.push(alert.key.clone());
                    outcome.mark_failures.push(KeyFailure {
                        event_key: alert.key.clone(),
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    async fn dispatch(&self, message: &OutboundMessage) -> Result<DispatchReceipt, TransportError> {
        tokio::time::timeout(self.timeout, self.transport.publish(message))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
    }
}

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use planos_core::notifications::Notification;

use crate::messages::{render, OutboundEmail};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("delivery failed for {recipient}: {detail}")]
    Delivery { recipient: String, detail: String },
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchFailure {
    pub recipient: String,
    pub subject: String,
    pub detail: String,
}

/// Outcome of one dispatch pass. Failures are advisory; the workflow
/// transition that produced the notifications has already been committed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failures: Vec<DispatchFailure>,
}

impl DispatchReport {
    pub fn all_delivered(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct NotificationDispatcher<T: MailTransport> {
    transport: T,
}

impl<T: MailTransport> NotificationDispatcher<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Renders and sends every email for the given notifications. Each
    /// recipient is attempted independently; one bounce never blocks the rest.
    pub async fn dispatch(&self, notifications: &[Notification]) -> DispatchReport {
        let mut report = DispatchReport::default();

        for notification in notifications {
            for email in render(notification) {
                match self.transport.send(&email).await {
                    Ok(()) => report.delivered += 1,
                    Err(error) => {
                        warn!(
                            request_id = %notification.request_id,
                            recipient = %email.to.email,
                            %error,
                            "notification delivery failed"
                        );
                        report.failures.push(DispatchFailure {
                            recipient: email.to.email.clone(),
                            subject: email.subject.clone(),
                            detail: error.to_string(),
                        });
                    }
                }
            }
        }

        report
    }
}

/// Transport used when no mailer is configured: logs each message instead of
/// delivering it, so local runs still show what would have been sent.
#[derive(Debug, Default)]
pub struct LoggingMailTransport;

#[async_trait]
impl MailTransport for LoggingMailTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError> {
        info!(to = %email.to.email, subject = %email.subject, "mailer disabled, skipping delivery");
        Ok(())
    }
}

/// Test transport that records every email it is handed.
#[derive(Debug, Default)]
pub struct RecordingMailTransport {
    sent: Mutex<Vec<OutboundEmail>>,
}

impl RecordingMailTransport {
    pub async fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl MailTransport for RecordingMailTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError> {
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}

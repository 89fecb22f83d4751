//! Delivery worker for dispatch tasks.
//!
//! Plugs into `queue_worker::QueueWorker` as the `JobProcessor` for
//! [`DispatchTask`]. Retries and dead letters belong to the queue; this
//! module only sends once and reports what happened.

use crate::error::NotificationError;
use crate::models::{DeliveryOutcome, DispatchTask};
use crate::providers::MailTransport;
use async_trait::async_trait;
use queue_worker::{JobProcessor, QueueError};
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct DeliveryWorker<T: MailTransport> {
    transport: Arc<T>,
}

impl<T: MailTransport + 'static> DeliveryWorker<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Hand the task's message to the transport exactly once.
    pub async fn deliver(&self, task: &DispatchTask) -> DeliveryOutcome {
        let message = &task.message;

        info!(
            task_id = %task.id,
            kind = %message.kind,
            transport = self.transport.name(),
            retry_count = task.retry_count,
            recipients = message.recipients.len(),
            "Delivering notification"
        );

        match self.transport.send(message).await {
            Ok(report) if report.rejected.is_empty() => {
                info!(
                    task_id = %task.id,
                    accepted = report.accepted.len(),
                    message_id = ?report.message_id,
                    "Notification delivered"
                );
                DeliveryOutcome::Delivered {
                    accepted: report.accepted.len(),
                    message_id: report.message_id,
                }
            }
            Ok(report) => {
                warn!(
                    task_id = %task.id,
                    recipients = ?message.recipients,
                    rejected = ?report.rejected,
                    "Notification partially rejected"
                );
                DeliveryOutcome::Failed {
                    recipients: message.recipients.clone(),
                    cause: format!("{} recipient(s) rejected", report.rejected.len()),
                    rejected: report.rejected,
                }
            }
            Err(e) => {
                error!(
                    task_id = %task.id,
                    recipients = ?message.recipients,
                    error = %e,
                    "Notification delivery failed"
                );
                // No usable address: nothing a retry could change.
                let rejected = match e {
                    NotificationError::InvalidAddress { .. } => message.recipients.clone(),
                    _ => Vec::new(),
                };
                DeliveryOutcome::Failed {
                    recipients: message.recipients.clone(),
                    rejected,
                    cause: e.to_string(),
                }
            }
        }
    }
}

#[async_trait]
impl<T: MailTransport + 'static> JobProcessor<DispatchTask> for DeliveryWorker<T> {
    async fn process(&self, task: &DispatchTask) -> Result<(), QueueError> {
        let outcome = self.deliver(task).await;
        let retryable = outcome.is_retryable();

        outcome.into_result().map(|_| ()).map_err(|e| {
            if retryable {
                QueueError::transient(e.to_string())
            } else {
                QueueError::permanent(e.to_string())
            }
        })
    }

    fn name(&self) -> &'static str {
        "delivery_worker"
    }
}

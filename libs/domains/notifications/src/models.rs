//! Data models for the notifications domain.

use crate::error::{NotificationError, NotificationResult};
use chrono::{DateTime, Utc};
use domain_blog::ContentEvent;
use queue_worker::QueueJob;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

// ============================================================================
// Messages
// ============================================================================

/// Tag carried by every notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
    Published,
    /// Daily broadcast of recent posts.
    Digest,
}

impl From<ContentEvent> for EventKind {
    fn from(event: ContentEvent) -> Self {
        match event {
            ContentEvent::Created => EventKind::Created,
            ContentEvent::Updated => EventKind::Updated,
            ContentEvent::Deleted => EventKind::Deleted,
            ContentEvent::Published => EventKind::Published,
        }
    }
}

/// A fully composed email, ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub kind: EventKind,
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// Sender address.
    pub sender: String,
    /// Deduplicated, never empty.
    pub recipients: Vec<String>,
}

// ============================================================================
// Queue Job
// ============================================================================

/// One queued delivery of a composed message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchTask {
    /// Stable across retries.
    pub id: Uuid,
    pub message: NotificationMessage,
    pub retry_count: u32,
    pub max_retries: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl DispatchTask {
    pub fn new(message: NotificationMessage, max_retries: u32) -> Self {
        Self {
            id: Uuid::now_v7(),
            message,
            retry_count: 0,
            max_retries,
            enqueued_at: Utc::now(),
        }
    }
}

impl QueueJob for DispatchTask {
    fn job_id(&self) -> String {
        self.id.to_string()
    }

    fn retry_count(&self) -> u32 {
        self.retry_count
    }

    fn with_retry(&self) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            enqueued_at: Utc::now(),
            ..self.clone()
        }
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

/// Returned by the gateway once a task is queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub task_id: Uuid,
    pub kind: EventKind,
    pub recipients: usize,
}

// ============================================================================
// Delivery
// ============================================================================

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered {
        accepted: usize,
        message_id: Option<String>,
    },
    Failed {
        /// Exactly the recipients of the attempted message.
        recipients: Vec<String>,
        /// Addresses the transport refused for good; empty when the whole
        /// send failed and may succeed later.
        rejected: Vec<String>,
        cause: String,
    },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }

    /// Worth sending again. A refused address fails the same way on every
    /// attempt, and a resend would reach the accepted recipients twice.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryOutcome::Failed { rejected, .. } if rejected.is_empty())
    }

    /// Accepted recipient count, or a `Delivery` error.
    pub fn into_result(self) -> NotificationResult<usize> {
        match self {
            DeliveryOutcome::Delivered { accepted, .. } => Ok(accepted),
            DeliveryOutcome::Failed { recipients, cause, .. } => {
                Err(NotificationError::Delivery { recipients, cause })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn message() -> NotificationMessage {
        NotificationMessage {
            kind: EventKind::Published,
            subject: "Blog Post Published: Tokio".into(),
            body: "body".into(),
            sender: "blog@example.com".into(),
            recipients: vec!["ada@example.com".into()],
        }
    }

    #[test]
    fn test_event_kind_parsing() {
        assert_eq!(EventKind::from_str("digest").unwrap(), EventKind::Digest);
        assert_eq!(EventKind::Deleted.to_string(), "deleted");
        assert!(EventKind::from_str("archived").is_err());
    }

    #[test]
    fn test_event_kind_from_content_event() {
        assert_eq!(EventKind::from(ContentEvent::Updated), EventKind::Updated);
        assert_eq!(EventKind::from(ContentEvent::Published), EventKind::Published);
    }

    #[test]
    fn test_retry_keeps_task_id() {
        let task = DispatchTask::new(message(), 5);
        let retried = task.with_retry().with_retry();

        assert_eq!(retried.id, task.id);
        assert_eq!(retried.retry_count, 2);
        assert_eq!(retried.max_retries(), 5);
        assert!(!retried.exceeded_max_retries());
        assert_eq!(retried.message, task.message);
    }
}

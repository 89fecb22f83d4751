//! Mail transport implementations.
//!
//! This module contains the `MailTransport` trait, an SMTP transport and an
//! in-memory transport for tests and dry runs.

mod memory;
mod smtp;

pub use memory::InMemoryTransport;
pub use smtp::{SmtpConfig, SmtpTransport};

use crate::error::NotificationResult;
use crate::models::NotificationMessage;
use async_trait::async_trait;

/// What the transport did with one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReport {
    /// Addresses the transport took responsibility for.
    pub accepted: Vec<String>,
    /// Addresses the transport refused.
    pub rejected: Vec<String>,
    /// Transport-specific message ID for tracking.
    pub message_id: Option<String>,
}

/// Trait for mail transports.
///
/// `send` returns `Err` when nothing was sent. A partial refusal comes back
/// as `Ok` with a non-empty `rejected` list.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &NotificationMessage) -> NotificationResult<SendReport>;

    /// Transport name for logging.
    fn name(&self) -> &'static str;

    async fn health_check(&self) -> NotificationResult<bool>;
}

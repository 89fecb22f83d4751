//! In-memory mail transport.
//!
//! Records every message instead of sending it. Can be told to fail every
//! send, the first few sends, or specific recipients.

use super::{MailTransport, SendReport};
use crate::error::{NotificationError, NotificationResult};
use crate::models::NotificationMessage;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct InMemoryTransport {
    sent: Arc<Mutex<Vec<NotificationMessage>>>,
    attempts: Arc<AtomicUsize>,
    fail_with: Option<String>,
    fail_first: usize,
    rejected: HashSet<String>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send fails with `cause`.
    pub fn failing(cause: impl Into<String>) -> Self {
        Self {
            fail_with: Some(cause.into()),
            fail_first: usize::MAX,
            ..Self::default()
        }
    }

    /// The first `attempts` sends fail, later ones succeed.
    pub fn flaky(attempts: usize, cause: impl Into<String>) -> Self {
        Self {
            fail_with: Some(cause.into()),
            fail_first: attempts,
            ..Self::default()
        }
    }

    /// The listed addresses are refused, the rest accepted.
    pub fn rejecting<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rejected: addresses.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Messages that reached at least one recipient.
    pub async fn sent(&self) -> Vec<NotificationMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Every call to `send`, including failed ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn was_sent_to(&self, address: &str) -> bool {
        self.sent
            .lock()
            .await
            .iter()
            .any(|m| m.recipients.iter().any(|r| r == address))
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait]
impl MailTransport for InMemoryTransport {
    async fn send(&self, message: &NotificationMessage) -> NotificationResult<SendReport> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(cause) = self.fail_with.as_ref().filter(|_| attempt < self.fail_first) {
            return Err(NotificationError::Transport(cause.clone()));
        }

        let (rejected, accepted): (Vec<String>, Vec<String>) = message
            .recipients
            .iter()
            .cloned()
            .partition(|r| self.rejected.contains(r));

        if !accepted.is_empty() {
            debug!(kind = %message.kind, accepted = accepted.len(), "Recorded notification");
            self.sent.lock().await.push(message.clone());
        }

        Ok(SendReport {
            accepted,
            rejected,
            message_id: Some(format!("memory-{attempt}")),
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> NotificationResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventKind;

    fn message() -> NotificationMessage {
        NotificationMessage {
            kind: EventKind::Updated,
            subject: "Blog Post Updated: Memory".into(),
            body: "body".into(),
            sender: "blog@example.com".into(),
            recipients: vec!["ada@example.com".into(), "ed@example.com".into()],
        }
    }

    #[tokio::test]
    async fn test_records_messages() {
        let transport = InMemoryTransport::new();
        let report = transport.send(&message()).await.unwrap();

        assert_eq!(report.accepted.len(), 2);
        assert!(report.rejected.is_empty());
        assert_eq!(transport.sent_count().await, 1);
        assert!(transport.was_sent_to("ed@example.com").await);
    }

    #[tokio::test]
    async fn test_flaky_recovers() {
        let transport = InMemoryTransport::flaky(2, "greylisted");

        assert!(transport.send(&message()).await.is_err());
        assert!(transport.send(&message()).await.is_err());
        assert!(transport.send(&message()).await.is_ok());
        assert_eq!(transport.attempts(), 3);
        assert_eq!(transport.sent_count().await, 1);
    }

    #[tokio::test]
    async fn test_rejecting_reports_subset() {
        let transport = InMemoryTransport::rejecting(["ed@example.com"]);
        let report = transport.send(&message()).await.unwrap();

        assert_eq!(report.accepted, vec!["ada@example.com"]);
        assert_eq!(report.rejected, vec!["ed@example.com"]);
    }

    #[tokio::test]
    async fn test_all_refused_records_nothing() {
        let transport = InMemoryTransport::rejecting(["ada@example.com", "ed@example.com"]);
        let report = transport.send(&message()).await.unwrap();

        assert!(report.accepted.is_empty());
        assert_eq!(report.rejected.len(), 2);
        assert_eq!(transport.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_clear_forgets_sent_messages() {
        let transport = InMemoryTransport::new();
        transport.send(&message()).await.unwrap();

        transport.clear().await;

        assert_eq!(transport.sent_count().await, 0);
        assert_eq!(transport.attempts(), 1);
    }
}

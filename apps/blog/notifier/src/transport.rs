//! Mail transport chosen at startup

use crate::config::{Config, TransportKind};
use async_trait::async_trait;
use domain_notifications::{
    InMemoryTransport, MailTransport, NotificationMessage, NotificationResult, SendReport, SmtpTransport,
};
use tracing::info;

pub enum Transport {
    Smtp(SmtpTransport),
    Memory(InMemoryTransport),
}

impl Transport {
    pub fn from_config(config: &Config) -> NotificationResult<Self> {
        let transport = match config.transport {
            TransportKind::Smtp => Transport::Smtp(SmtpTransport::new(config.smtp.clone())?),
            TransportKind::Memory => Transport::Memory(InMemoryTransport::new()),
        };
        info!(transport = transport.name(), "Mail transport ready");
        Ok(transport)
    }
}

#[async_trait]
impl MailTransport for Transport {
    async fn send(&self, message: &NotificationMessage) -> NotificationResult<SendReport> {
        match self {
            Transport::Smtp(smtp) => smtp.send(message).await,
            Transport::Memory(memory) => {
                info!(
                    kind = %message.kind,
                    subject = %message.subject,
                    recipients = ?message.recipients,
                    "Dry run, message not sent"
                );
                memory.send(message).await
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Transport::Smtp(smtp) => smtp.name(),
            Transport::Memory(memory) => memory.name(),
        }
    }

    async fn health_check(&self) -> NotificationResult<bool> {
        match self {
            Transport::Smtp(smtp) => smtp.health_check().await,
            Transport::Memory(memory) => memory.health_check().await,
        }
    }
}

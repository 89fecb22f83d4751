//! SMTP mail transport using lettre.
//!
//! Works against production relays (TLS plus credentials) and local
//! development servers such as MailHog or Mailpit.

use super::{MailTransport, SendReport};
use crate::error::{NotificationError, NotificationResult};
use crate::models::NotificationMessage;
use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_flag, env_optional, env_or_default, env_parse};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// SMTP configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Display name placed in front of the sender address.
    pub from_name: String,
    /// Optional for dev servers like Mailpit.
    pub username: Option<String>,
    pub password: Option<String>,
    /// false for local dev servers.
    pub use_tls: bool,
    /// Per-command SMTP timeout.
    pub timeout: Duration,
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            from_name: "Blog App".to_string(),
            username: None,
            password: None,
            use_tls: false,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }

    pub fn with_from_name(mut self, from_name: impl Into<String>) -> Self {
        self.from_name = from_name.into();
        self
    }
}

impl FromEnv for SmtpConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let username = env_optional("SMTP_USERNAME");
        let password = env_optional("SMTP_PASSWORD");
        if username.is_some() != password.is_some() {
            return Err(ConfigError::Invalid(
                "SMTP_USERNAME and SMTP_PASSWORD must be set together".into(),
            ));
        }

        Ok(Self {
            host: env_or_default("SMTP_HOST", "localhost"),
            port: env_parse("SMTP_PORT", 1025)?,
            from_name: env_or_default("SMTP_FROM_NAME", "Blog App"),
            username,
            password,
            use_tls: env_flag("SMTP_USE_TLS", false)?,
            timeout: Duration::from_secs(env_parse("SMTP_TIMEOUT_SECS", 10)?),
        })
    }
}

/// Sends notifications through an SMTP server.
pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
}

impl SmtpTransport {
    pub fn new(config: SmtpConfig) -> NotificationResult<Self> {
        let transport = Self::build_transport(&config)?;
        Ok(Self { transport, config })
    }

    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }

    fn build_transport(config: &SmtpConfig) -> NotificationResult<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| NotificationError::Transport(format!("Failed to create SMTP relay: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        let mut builder = builder.port(config.port).timeout(Some(config.timeout));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }

    /// Build one message addressed to every parsable recipient.
    ///
    /// Returns the message with the accepted and rejected address lists.
    fn build_message(&self, message: &NotificationMessage) -> NotificationResult<(Message, Vec<String>, Vec<String>)> {
        let from: Mailbox = format!("{} <{}>", self.config.from_name, message.sender)
            .parse()
            .map_err(|e: lettre::address::AddressError| NotificationError::InvalidAddress {
                address: message.sender.clone(),
                reason: e.to_string(),
            })?;

        let mut builder = Message::builder().from(from).subject(&message.subject);
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();

        for recipient in &message.recipients {
            match recipient.parse::<Mailbox>() {
                Ok(mailbox) => {
                    builder = builder.to(mailbox);
                    accepted.push(recipient.clone());
                }
                Err(e) => {
                    warn!(recipient = %recipient, error = %e, "Skipping unparsable recipient");
                    rejected.push(recipient.clone());
                }
            }
        }

        if accepted.is_empty() {
            return Err(NotificationError::InvalidAddress {
                address: message.recipients.join(", "),
                reason: "no valid recipient".into(),
            });
        }

        let email = builder
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())?;

        Ok((email, accepted, rejected))
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn send(&self, message: &NotificationMessage) -> NotificationResult<SendReport> {
        debug!(
            kind = %message.kind,
            subject = %message.subject,
            host = %self.config.host,
            port = self.config.port,
            recipients = message.recipients.len(),
            "Sending notification via SMTP"
        );

        let (email, accepted, rejected) = self.build_message(message)?;

        let response = self.transport.send(email).await.map_err(|e| {
            error!(
                recipients = ?message.recipients,
                error = %e,
                "Failed to send notification via SMTP"
            );
            NotificationError::Transport(format!("SMTP send failed: {}", e))
        })?;

        let message_id = response.message().next().map(|s| s.to_string());

        info!(
            kind = %message.kind,
            accepted = accepted.len(),
            rejected = rejected.len(),
            message_id = ?message_id,
            "Notification sent via SMTP"
        );

        Ok(SendReport {
            accepted,
            rejected,
            message_id,
        })
    }

    fn name(&self) -> &'static str {
        "SMTP"
    }

    async fn health_check(&self) -> NotificationResult<bool> {
        Ok(self.transport.test_connection().await?)
    }
}

//! Error types for the notifications domain.

use crate::models::EventKind;
use core_config::ConfigError;
use domain_blog::BlogError;
use queue_worker::QueueError;
use thiserror::Error;

/// Result type alias for notification operations.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors that can occur in the notifications domain.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// A template failed to register or render.
    #[error("Composition error: {0}")]
    Composition(String),

    /// The per-record composer was asked for an event it does not handle.
    #[error("Unsupported event kind for this composer: {0}")]
    UnsupportedEvent(EventKind),

    /// Every recipient address was empty.
    #[error("No recipients for {0} notification")]
    NoRecipients(EventKind),

    /// The transport refused the message.
    #[error("Delivery to {} recipient(s) failed: {cause}", recipients.len())]
    Delivery { recipients: Vec<String>, cause: String },

    /// Mail transport could not be built or reached.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Address failed to parse.
    #[error("Invalid email address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Queue error: {0}")]
    Queue(String),

    #[error(transparent)]
    Blog(#[from] BlogError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl NotificationError {
    /// Composition errors are fatal to a single dispatch and never retried.
    pub fn is_composition(&self) -> bool {
        matches!(
            self,
            NotificationError::Composition(_)
                | NotificationError::UnsupportedEvent(_)
                | NotificationError::NoRecipients(_)
        )
    }
}

impl From<handlebars::RenderError> for NotificationError {
    fn from(err: handlebars::RenderError) -> Self {
        NotificationError::Composition(err.to_string())
    }
}

impl From<handlebars::TemplateError> for NotificationError {
    fn from(err: handlebars::TemplateError) -> Self {
        NotificationError::Composition(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for NotificationError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        NotificationError::Transport(err.to_string())
    }
}

impl From<lettre::error::Error> for NotificationError {
    fn from(err: lettre::error::Error) -> Self {
        NotificationError::Transport(format!("Failed to build message: {}", err))
    }
}

impl From<QueueError> for NotificationError {
    fn from(err: QueueError) -> Self {
        NotificationError::Queue(err.to_string())
    }
}

impl From<ConfigError> for NotificationError {
    fn from(err: ConfigError) -> Self {
        NotificationError::Config(err.to_string())
    }
}

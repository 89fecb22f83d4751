//! Queue error types and error categorization
//!
//! The category decides what the retry policy does with a failed job:
//! - **Transient**: temporary failure, exponential backoff (1s-30s)
//! - **Permanent**: never retried, dead-lettered immediately
//! - **RateLimited**: the downstream pushed back, longer backoff (5s-120s)

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transient,
    Permanent,
    RateLimited,
}

impl ErrorCategory {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorCategory::Permanent)
    }

    pub fn base_delay(&self) -> Duration {
        match self {
            ErrorCategory::Transient => Duration::from_secs(1),
            ErrorCategory::Permanent => Duration::ZERO,
            ErrorCategory::RateLimited => Duration::from_secs(5),
        }
    }

    pub fn max_delay(&self) -> Duration {
        match self {
            ErrorCategory::Transient => Duration::from_secs(30),
            ErrorCategory::Permanent => Duration::ZERO,
            ErrorCategory::RateLimited => Duration::from_secs(120),
        }
    }

    /// Label used for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transient => "transient",
            ErrorCategory::Permanent => "permanent",
            ErrorCategory::RateLimited => "rate_limited",
        }
    }
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Processing error: {message}")]
    Processing {
        message: String,
        category: ErrorCategory,
    },

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Job timed out after {0:?}")]
    Timeout(Duration),

    #[error("Queue '{0}' is closed")]
    Closed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    pub fn transient(message: impl Into<String>) -> Self {
        QueueError::Processing {
            message: message.into(),
            category: ErrorCategory::Transient,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        QueueError::Processing {
            message: message.into(),
            category: ErrorCategory::Permanent,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        QueueError::RateLimited(message.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            QueueError::Processing { category, .. } => *category,
            QueueError::RateLimited(_) => ErrorCategory::RateLimited,
            QueueError::Timeout(_) => ErrorCategory::Transient,
            QueueError::Closed(_) => ErrorCategory::Permanent,
            QueueError::Config(_) => ErrorCategory::Permanent,
            QueueError::Internal(_) => ErrorCategory::Permanent,
        }
    }
}

//! Retry policies applied to failed jobs.

use crate::error::QueueError;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// Decides whether a failed job runs again, and when.
pub trait RetryPolicy: Send + Sync {
    /// `retry_count` is how many times the job has already been retried.
    fn decide(&self, retry_count: u32, max_retries: u32, error: &QueueError) -> RetryDecision;
}

/// Doubles the delay on every attempt, starting from the error category's
/// base delay and capped at its maximum.
#[derive(Debug, Clone, Default)]
pub struct ExponentialBackoff {
    base_delay: Option<Duration>,
}

impl ExponentialBackoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the category base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn decide(&self, retry_count: u32, max_retries: u32, error: &QueueError) -> RetryDecision {
        let category = error.category();
        if !category.is_retryable() || retry_count >= max_retries {
            return RetryDecision::GiveUp;
        }

        let base = self.base_delay.unwrap_or_else(|| category.base_delay());
        let delay = base
            .saturating_mul(2u32.saturating_pow(retry_count))
            .min(category.max_delay().max(base));
        RetryDecision::RetryAfter(delay)
    }
}

//! Dead letter queue
//!
//! Holds jobs that failed permanently or ran out of retries so operators can
//! inspect them. Bounded: the oldest entry is evicted when full.

use crate::error::{ErrorCategory, QueueError};
use crate::registry::QueueJob;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct DeadLetter<J> {
    pub job: J,
    pub error: String,
    pub category: ErrorCategory,
    pub retry_count: u32,
    pub failed_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct DeadLetterQueue<J> {
    entries: Arc<Mutex<VecDeque<DeadLetter<J>>>>,
    capacity: usize,
}

impl<J: QueueJob> DeadLetterQueue<J> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    pub async fn push(&self, job: J, error: &QueueError) {
        let entry = DeadLetter {
            retry_count: job.retry_count(),
            error: error.to_string(),
            category: error.category(),
            failed_at: Utc::now(),
            job,
        };

        info!(
            job_id = %entry.job.job_id(),
            error = %entry.error,
            retry_count = entry.retry_count,
            "Moved job to dead letter queue"
        );

        let mut entries = self.entries.lock().await;
        if entries.len() >= self.capacity
            && let Some(evicted) = entries.pop_front()
        {
            warn!(job_id = %evicted.job.job_id(), "Dead letter queue full, evicted oldest entry");
        }
        entries.push_back(entry);
    }

    pub async fn list(&self) -> Vec<DeadLetter<J>> {
        self.entries.lock().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Remove and return every entry.
    pub async fn drain(&self) -> Vec<DeadLetter<J>> {
        self.entries.lock().await.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug)]
    struct Letter(&'static str);

    impl QueueJob for Letter {
        fn job_id(&self) -> String {
            self.0.to_string()
        }

        fn retry_count(&self) -> u32 {
            2
        }

        fn with_retry(&self) -> Self {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_push_records_error_details() {
        let dlq = DeadLetterQueue::new(10);
        dlq.push(Letter("a"), &QueueError::permanent("no such mailbox")).await;

        let entries = dlq.list().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].retry_count, 2);
        assert_eq!(entries[0].category, ErrorCategory::Permanent);
        assert!(entries[0].error.contains("no such mailbox"));
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let dlq = DeadLetterQueue::new(2);
        for id in ["a", "b", "c"] {
            dlq.push(Letter(id), &QueueError::transient("x")).await;
        }

        let ids: Vec<_> = dlq.drain().await.into_iter().map(|e| e.job.0).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert!(dlq.is_empty().await);
    }
}

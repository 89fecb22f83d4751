//! Worker configuration

use crate::registry::QueueDef;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Queue name, used for logging and metric labels
    pub queue_name: String,

    /// Maximum jobs processed at the same time
    pub max_concurrent_jobs: usize,

    /// Upper bound for a single `process` call
    pub job_timeout_ms: u64,

    /// Keep processing already-buffered jobs after shutdown is signalled
    pub drain_on_shutdown: bool,

    /// How long a drain may take before remaining work is abandoned
    pub shutdown_grace_ms: u64,

    /// Dead letters kept in memory before the oldest is evicted
    pub dlq_capacity: usize,
}

impl WorkerConfig {
    pub fn from_queue_def<Q: QueueDef>() -> Self {
        Self {
            queue_name: Q::QUEUE_NAME.to_string(),
            max_concurrent_jobs: Q::MAX_CONCURRENT_JOBS,
            job_timeout_ms: Q::JOB_TIMEOUT_MS,
            drain_on_shutdown: true,
            shutdown_grace_ms: 30_000,
            dlq_capacity: Q::DLQ_CAPACITY,
        }
    }

    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            max_concurrent_jobs: 4,
            job_timeout_ms: 30_000,
            drain_on_shutdown: true,
            shutdown_grace_ms: 30_000,
            dlq_capacity: 1_000,
        }
    }

    pub fn with_max_concurrent_jobs(mut self, count: usize) -> Self {
        self.max_concurrent_jobs = count.max(1);
        self
    }

    pub fn with_job_timeout_ms(mut self, timeout: u64) -> Self {
        self.job_timeout_ms = timeout.max(1);
        self
    }

    pub fn with_drain_on_shutdown(mut self, drain: bool) -> Self {
        self.drain_on_shutdown = drain;
        self
    }

    pub fn with_shutdown_grace_ms(mut self, grace: u64) -> Self {
        self.shutdown_grace_ms = grace;
        self
    }

    pub fn with_dlq_capacity(mut self, capacity: usize) -> Self {
        self.dlq_capacity = capacity.max(1);
        self
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new("jobs")
    }
}

//! Job and processor traits plus static queue definitions.

use crate::error::QueueError;
use async_trait::async_trait;
use std::fmt::Debug;

/// A unit of work carried through the queue.
///
/// The queue owns the job from `enqueue` until a worker claims it. A retry
/// re-enqueues the value returned by `with_retry`.
pub trait QueueJob: Clone + Debug + Send + Sync + 'static {
    /// Identifier used in logs and dead letters.
    fn job_id(&self) -> String;

    fn retry_count(&self) -> u32;

    /// The same job with its retry count incremented.
    fn with_retry(&self) -> Self;

    /// Retries allowed before the job is dead-lettered.
    fn max_retries(&self) -> u32 {
        3
    }

    fn exceeded_max_retries(&self) -> bool {
        self.retry_count() >= self.max_retries()
    }
}

/// Handles jobs claimed from a queue.
///
/// Return `Ok(())` on success. Errors are categorized and handed to the
/// worker's retry policy.
#[async_trait]
pub trait JobProcessor<J: QueueJob>: Send + Sync {
    async fn process(&self, job: &J) -> Result<(), QueueError>;

    fn name(&self) -> &'static str;
}

/// Static queue definition.
///
/// ```rust,ignore
/// pub struct MailQueue;
///
/// impl QueueDef for MailQueue {
///     const QUEUE_NAME: &'static str = "mail:dispatch";
/// }
/// ```
pub trait QueueDef: Send + Sync {
    const QUEUE_NAME: &'static str;

    const MAX_CONCURRENT_JOBS: usize = 4;

    const JOB_TIMEOUT_MS: u64 = 30_000;

    const DLQ_CAPACITY: usize = 1_000;
}

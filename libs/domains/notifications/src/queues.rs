//! Queue definitions for the notifications domain.

use queue_worker::QueueDef;

/// Dispatch tasks waiting for a delivery worker.
pub struct NotificationQueue;

impl QueueDef for NotificationQueue {
    const QUEUE_NAME: &'static str = "notifications:dispatch";

    const MAX_CONCURRENT_JOBS: usize = 4;

    const JOB_TIMEOUT_MS: u64 = 30_000;

    const DLQ_CAPACITY: usize = 10_000;
}

//! Queue Worker Framework
//!
//! An in-process job queue for background work that must never block the
//! caller that produced it.
//!
//! ## Features
//!
//! - **Non-blocking producer**: `JobProducer::enqueue` is a synchronous channel send
//! - **Bounded pool**: `QueueWorker<J, P>` runs jobs concurrently behind a semaphore
//! - **Timeouts**: every `process` call is bounded by `job_timeout_ms`
//! - **Retry policies**: pluggable `RetryPolicy`, `ExponentialBackoff` by default
//! - **Dead letters**: jobs that give up land in a bounded `DeadLetterQueue`
//! - **Prometheus metrics**: received/processed/retried/dead-lettered counters
//!
//! ## Example
//!
//! ```ignore
//! use queue_worker::{channel, QueueWorker, WorkerConfig};
//!
//! let config = WorkerConfig::from_queue_def::<MailQueue>();
//! let (producer, receiver) = channel::<MailJob>(&config.queue_name);
//! let worker = QueueWorker::new(receiver, producer.clone(), processor, config);
//!
//! producer.enqueue(job)?;
//! worker.run(shutdown_rx).await;
//! ```

mod config;
mod dlq;
mod error;
pub mod metrics;
mod producer;
mod registry;
mod retry;
mod worker;

pub use config::WorkerConfig;
pub use dlq::{DeadLetter, DeadLetterQueue};
pub use error::{ErrorCategory, QueueError};
pub use metrics::{QueueMetrics, init_metrics, render_metrics};
pub use producer::{JobProducer, JobReceiver, channel};
pub use registry::{JobProcessor, QueueDef, QueueJob};
pub use retry::{ExponentialBackoff, RetryDecision, RetryPolicy};
pub use worker::{QueueWorker, WorkerReport};

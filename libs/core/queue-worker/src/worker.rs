//! The generic `QueueWorker` loop.
//!
//! A single dispatcher task claims jobs from the receiver and runs each one
//! in a `JoinSet`, bounded by a semaphore. Failures go through the
//! `RetryPolicy`: retries are re-enqueued after their backoff delay, anything
//! else lands in the dead letter queue.

use crate::config::WorkerConfig;
use crate::dlq::DeadLetterQueue;
use crate::error::QueueError;
use crate::metrics::QueueMetrics;
use crate::producer::{JobProducer, JobReceiver};
use crate::registry::{JobProcessor, QueueJob};
use crate::retry::{ExponentialBackoff, RetryDecision, RetryPolicy};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Counters for one `run` of a worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub processed: u64,
    pub failed: u64,
    pub retried: u64,
    pub dead_lettered: u64,
}

#[derive(Default)]
struct Stats {
    processed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
}

impl Stats {
    fn report(&self) -> WorkerReport {
        WorkerReport {
            processed: self.processed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            retried: self.retried.load(Ordering::SeqCst),
            dead_lettered: self.dead_lettered.load(Ordering::SeqCst),
        }
    }
}

/// State shared by every job task spawned from one worker.
struct JobContext<J: QueueJob, P> {
    processor: Arc<P>,
    producer: JobProducer<J>,
    dlq: DeadLetterQueue<J>,
    retry_policy: Arc<dyn RetryPolicy>,
    metrics: QueueMetrics,
    job_timeout: Duration,
    in_flight: AtomicUsize,
    pending_retries: Arc<AtomicUsize>,
    stats: Stats,
}

impl<J, P> JobContext<J, P>
where
    J: QueueJob,
    P: JobProcessor<J>,
{
    async fn execute(&self, job: J) {
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.metrics.in_flight(in_flight);

        let started = Instant::now();
        debug!(job_id = %job.job_id(), retry_count = job.retry_count(), "Processing job");

        let result = match tokio::time::timeout(self.job_timeout, self.processor.process(&job)).await {
            Ok(result) => result,
            Err(_) => Err(QueueError::Timeout(self.job_timeout)),
        };

        match result {
            Ok(()) => {
                self.stats.processed.fetch_add(1, Ordering::SeqCst);
                self.metrics.job_processed(started.elapsed());
                debug!(job_id = %job.job_id(), elapsed_ms = started.elapsed().as_millis() as u64, "Job processed");
            }
            Err(error) => {
                self.stats.failed.fetch_add(1, Ordering::SeqCst);
                self.metrics.job_failed(error.category().as_str());
                self.handle_failure(job, error).await;
            }
        }

        let in_flight = self.in_flight.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        self.metrics.in_flight(in_flight);
    }

    async fn handle_failure(&self, job: J, error: QueueError) {
        let category = error.category();
        match self
            .retry_policy
            .decide(job.retry_count(), job.max_retries(), &error)
        {
            RetryDecision::RetryAfter(delay) => {
                warn!(
                    job_id = %job.job_id(),
                    error = %error,
                    error_category = ?category,
                    retry_count = job.retry_count(),
                    delay_ms = delay.as_millis() as u64,
                    "Job failed, scheduling retry"
                );
                self.stats.retried.fetch_add(1, Ordering::SeqCst);
                self.metrics.job_retried();

                self.pending_retries.fetch_add(1, Ordering::SeqCst);
                let pending = Arc::clone(&self.pending_retries);
                let timer = self.producer.enqueue_after(job.with_retry(), delay);
                tokio::spawn(async move {
                    let _ = timer.await;
                    pending.fetch_sub(1, Ordering::SeqCst);
                });
            }
            RetryDecision::GiveUp => {
                warn!(
                    job_id = %job.job_id(),
                    error = %error,
                    error_category = ?category,
                    retry_count = job.retry_count(),
                    "Job failed, giving up"
                );
                self.stats.dead_lettered.fetch_add(1, Ordering::SeqCst);
                self.metrics.job_dead_lettered();
                self.dlq.push(job, &error).await;
            }
        }
    }
}

/// Generic queue worker.
///
/// * `J` - the job type
/// * `P` - the processor handling it
pub struct QueueWorker<J, P>
where
    J: QueueJob,
    P: JobProcessor<J>,
{
    receiver: JobReceiver<J>,
    context: Arc<JobContext<J, P>>,
    semaphore: Arc<Semaphore>,
    config: WorkerConfig,
}

impl<J, P> QueueWorker<J, P>
where
    J: QueueJob,
    P: JobProcessor<J> + 'static,
{
    /// `producer` must feed `receiver`; it is used to re-enqueue retries.
    pub fn new(receiver: JobReceiver<J>, producer: JobProducer<J>, processor: P, config: WorkerConfig) -> Self {
        Self::with_arc_processor(receiver, producer, Arc::new(processor), config)
    }

    pub fn with_arc_processor(
        receiver: JobReceiver<J>,
        producer: JobProducer<J>,
        processor: Arc<P>,
        config: WorkerConfig,
    ) -> Self {
        let metrics = QueueMetrics::new(config.queue_name.clone(), processor.name());
        let context = JobContext {
            processor,
            producer,
            dlq: DeadLetterQueue::new(config.dlq_capacity),
            retry_policy: Arc::new(ExponentialBackoff::new()),
            metrics,
            job_timeout: config.job_timeout(),
            in_flight: AtomicUsize::new(0),
            pending_retries: Arc::new(AtomicUsize::new(0)),
            stats: Stats::default(),
        };

        Self {
            receiver,
            context: Arc::new(context),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
            config,
        }
    }

    /// Replace the default `ExponentialBackoff`.
    ///
    /// Must be called before `run`.
    pub fn with_retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        if let Some(context) = Arc::get_mut(&mut self.context) {
            context.retry_policy = Arc::new(policy);
        }
        self
    }

    /// Handle to the dead letters collected by this worker.
    pub fn dead_letters(&self) -> DeadLetterQueue<J> {
        self.context.dlq.clone()
    }

    /// Run until the shutdown signal fires.
    ///
    /// With `drain_on_shutdown`, jobs already buffered (and retries already
    /// scheduled) still run before this returns, bounded by
    /// `shutdown_grace_ms`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> WorkerReport {
        info!(
            queue = %self.config.queue_name,
            processor = %self.context.processor.name(),
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            job_timeout_ms = self.config.job_timeout_ms,
            "Starting queue worker"
        );

        let mut tasks: JoinSet<()> = JoinSet::new();

        loop {
            if *shutdown.borrow() {
                info!("Received shutdown signal, stopping worker");
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        info!("Shutdown channel closed, stopping worker");
                        break;
                    }
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_join(joined),
                job = self.receiver.recv() => match job {
                    Some(job) => self.spawn_job(&mut tasks, job).await,
                    None => {
                        info!("All producers dropped, stopping worker");
                        break;
                    }
                },
            }
        }

        if self.config.drain_on_shutdown {
            self.drain(&mut tasks).await;
        }

        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }

        let report = self.context.stats.report();
        info!(
            queue = %self.config.queue_name,
            processed = report.processed,
            failed = report.failed,
            retried = report.retried,
            dead_lettered = report.dead_lettered,
            "Queue worker stopped"
        );
        report
    }

    async fn spawn_job(&self, tasks: &mut JoinSet<()>, job: J) {
        let Ok(permit) = Arc::clone(&self.semaphore).acquire_owned().await else {
            error!(job_id = %job.job_id(), "Concurrency semaphore closed, dropping job");
            return;
        };

        self.context.metrics.job_received();
        let context = Arc::clone(&self.context);
        tasks.spawn(async move {
            let _permit = permit;
            context.execute(job).await;
        });
    }

    async fn drain(&mut self, tasks: &mut JoinSet<()>) {
        let deadline = Instant::now() + self.config.shutdown_grace();
        info!(buffered = !self.receiver.is_empty(), in_flight = tasks.len(), "Draining queue");

        loop {
            while let Some(job) = self.receiver.try_next() {
                self.spawn_job(tasks, job).await;
            }

            if tasks.is_empty()
                && self.context.pending_retries.load(Ordering::SeqCst) == 0
                && self.receiver.is_empty()
            {
                break;
            }

            tokio::select! {
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_join(joined),
                _ = tokio::time::sleep(DRAIN_POLL_INTERVAL) => {}
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(
                        in_flight = tasks.len(),
                        pending_retries = self.context.pending_retries.load(Ordering::SeqCst),
                        "Shutdown grace period elapsed, abandoning remaining jobs"
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(error = %e, "Job task panicked");
        } else {
            debug!(error = %e, "Job task cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::channel;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    #[derive(Clone, Debug)]
    struct TestJob {
        id: u32,
        retry_count: u32,
        max_retries: u32,
    }

    impl TestJob {
        fn new(id: u32) -> Self {
            Self {
                id,
                retry_count: 0,
                max_retries: 3,
            }
        }
    }

    impl QueueJob for TestJob {
        fn job_id(&self) -> String {
            format!("job-{}", self.id)
        }

        fn retry_count(&self) -> u32 {
            self.retry_count
        }

        fn with_retry(&self) -> Self {
            Self {
                retry_count: self.retry_count + 1,
                ..self.clone()
            }
        }

        fn max_retries(&self) -> u32 {
            self.max_retries
        }
    }

    /// Fails the first `failures` attempts with `error`, then succeeds.
    struct FlakyProcessor {
        attempts: AtomicU32,
        failures: u32,
        error: fn() -> QueueError,
        delay: Duration,
        running: AtomicUsize,
        max_running: AtomicUsize,
    }

    impl FlakyProcessor {
        fn new(failures: u32, error: fn() -> QueueError) -> Self {
            Self {
                attempts: AtomicU32::new(0),
                failures,
                error,
                delay: Duration::ZERO,
                running: AtomicUsize::new(0),
                max_running: AtomicUsize::new(0),
            }
        }

        fn reliable() -> Self {
            Self::new(0, || QueueError::transient("unused"))
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl JobProcessor<TestJob> for FlakyProcessor {
        async fn process(&self, _job: &TestJob) -> Result<(), QueueError> {
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(running, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.running.fetch_sub(1, Ordering::SeqCst);

            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                Err((self.error)())
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    fn fast_retries() -> ExponentialBackoff {
        ExponentialBackoff::new().with_base_delay(Duration::from_millis(1))
    }

    async fn run_to_completion(
        processor: Arc<FlakyProcessor>,
        config: WorkerConfig,
        jobs: Vec<TestJob>,
    ) -> (WorkerReport, DeadLetterQueue<TestJob>) {
        let (producer, receiver) = channel::<TestJob>(config.queue_name.clone());
        let worker = QueueWorker::with_arc_processor(receiver, producer.clone(), processor, config)
            .with_retry_policy(fast_retries());
        let dlq = worker.dead_letters();

        for job in jobs {
            producer.enqueue(job).unwrap();
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        shutdown_tx.send(true).unwrap();
        let report = worker.run(shutdown_rx).await;
        (report, dlq)
    }

    #[tokio::test]
    async fn test_drains_buffered_jobs_on_shutdown() {
        let processor = Arc::new(FlakyProcessor::reliable());
        let jobs = (0..5).map(TestJob::new).collect();

        let (report, dlq) = run_to_completion(processor.clone(), WorkerConfig::new("test"), jobs).await;

        assert_eq!(report.processed, 5);
        assert_eq!(report.failed, 0);
        assert!(dlq.is_empty().await);
    }

    #[tokio::test]
    async fn test_without_drain_buffered_jobs_are_left() {
        let processor = Arc::new(FlakyProcessor::reliable());
        let config = WorkerConfig::new("test").with_drain_on_shutdown(false);

        let (report, _) = run_to_completion(processor.clone(), config, vec![TestJob::new(1)]).await;

        assert_eq!(report.processed, 0);
        assert_eq!(processor.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried_until_success() {
        let processor = Arc::new(FlakyProcessor::new(2, || QueueError::transient("smtp 451")));

        let (report, dlq) =
            run_to_completion(processor.clone(), WorkerConfig::new("test"), vec![TestJob::new(1)]).await;

        assert_eq!(processor.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(report.failed, 2);
        assert_eq!(report.retried, 2);
        assert_eq!(report.processed, 1);
        assert!(dlq.is_empty().await);
    }

    #[tokio::test]
    async fn test_exhausted_retries_go_to_dead_letters() {
        let processor = Arc::new(FlakyProcessor::new(u32::MAX, || QueueError::transient("down")));
        let job = TestJob {
            max_retries: 2,
            ..TestJob::new(9)
        };

        let (report, dlq) = run_to_completion(processor.clone(), WorkerConfig::new("test"), vec![job]).await;

        assert_eq!(processor.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(report.retried, 2);
        assert_eq!(report.dead_lettered, 1);
        let letters = dlq.list().await;
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].job.id, 9);
        assert_eq!(letters[0].retry_count, 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_skips_retries() {
        let processor = Arc::new(FlakyProcessor::new(u32::MAX, || QueueError::permanent("bad payload")));

        let (report, dlq) =
            run_to_completion(processor.clone(), WorkerConfig::new("test"), vec![TestJob::new(1)]).await;

        assert_eq!(processor.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(report.retried, 0);
        assert_eq!(report.dead_lettered, 1);
        assert_eq!(dlq.len().await, 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_transient_failure() {
        let processor = Arc::new(FlakyProcessor::reliable().with_delay(Duration::from_millis(500)));
        let config = WorkerConfig::new("test").with_job_timeout_ms(20);
        let job = TestJob {
            max_retries: 0,
            ..TestJob::new(1)
        };

        let (report, dlq) = run_to_completion(processor, config, vec![job]).await;

        assert_eq!(report.processed, 0);
        assert_eq!(report.dead_lettered, 1);
        let letters = dlq.list().await;
        assert!(letters[0].error.contains("timed out"));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let processor = Arc::new(FlakyProcessor::reliable().with_delay(Duration::from_millis(20)));
        let config = WorkerConfig::new("test").with_max_concurrent_jobs(2);
        let jobs = (0..8).map(TestJob::new).collect();

        let (report, _) = run_to_completion(processor.clone(), config, jobs).await;

        assert_eq!(report.processed, 8);
        assert!(processor.max_running.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_keeps_running_after_caller_producer_dropped() {
        let (producer, receiver) = channel::<TestJob>("test");
        let worker = QueueWorker::new(
            receiver,
            producer.clone(),
            FlakyProcessor::reliable(),
            WorkerConfig::new("test"),
        );
        producer.enqueue(TestJob::new(1)).unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(producer);

        // The worker holds a producer for retries.
        assert!(!handle.is_finished());
        shutdown_tx.send(true).unwrap();
        let report = handle.await.unwrap();
        assert_eq!(report.processed, 1);
    }
}

//! Queue producer and receiver halves.

use crate::error::QueueError;
use crate::metrics::QueueMetrics;
use crate::registry::QueueJob;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Create a queue, returning the producer and the single receiver.
pub fn channel<J: QueueJob>(queue_name: impl Into<String>) -> (JobProducer<J>, JobReceiver<J>) {
    let queue_name = queue_name.into();
    let (sender, receiver) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    let metrics = QueueMetrics::new(queue_name.clone(), "producer");

    (
        JobProducer {
            queue_name: queue_name.clone(),
            sender,
            depth: Arc::clone(&depth),
            metrics: metrics.clone(),
        },
        JobReceiver {
            queue_name,
            receiver,
            depth,
            metrics,
        },
    )
}

/// Sending half of a queue. Cheap to clone.
#[derive(Clone)]
pub struct JobProducer<J: QueueJob> {
    queue_name: String,
    sender: mpsc::UnboundedSender<J>,
    depth: Arc<AtomicUsize>,
    metrics: QueueMetrics,
}

impl<J: QueueJob> JobProducer<J> {
    /// Hand a job to the queue without waiting for it to run.
    ///
    /// Fails only when the receiving side has been dropped.
    pub fn enqueue(&self, job: J) -> Result<(), QueueError> {
        let job_id = job.job_id();
        self.sender
            .send(job)
            .map_err(|_| QueueError::Closed(self.queue_name.clone()))?;

        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        self.metrics.queue_depth(depth);
        debug!(queue = %self.queue_name, job_id = %job_id, depth, "Job enqueued");
        Ok(())
    }

    /// Enqueue `job` once `delay` has elapsed.
    ///
    /// Returns the timer task so callers can track outstanding retries.
    pub fn enqueue_after(&self, job: J, delay: Duration) -> tokio::task::JoinHandle<()> {
        let producer = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let job_id = job.job_id();
            if let Err(e) = producer.enqueue(job) {
                warn!(job_id = %job_id, error = %e, "Dropped delayed job");
            }
        })
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Jobs buffered but not yet claimed.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Receiving half of a queue, owned by exactly one worker.
pub struct JobReceiver<J: QueueJob> {
    queue_name: String,
    receiver: mpsc::UnboundedReceiver<J>,
    depth: Arc<AtomicUsize>,
    metrics: QueueMetrics,
}

impl<J: QueueJob> JobReceiver<J> {
    /// Wait for the next job. `None` once every producer is gone.
    pub async fn recv(&mut self) -> Option<J> {
        let job = self.receiver.recv().await;
        if job.is_some() {
            self.claimed();
        }
        job
    }

    /// Take a buffered job without waiting.
    pub fn try_next(&mut self) -> Option<J> {
        let job = self.receiver.try_recv().ok();
        if job.is_some() {
            self.claimed();
        }
        job
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    fn claimed(&self) {
        let depth = self
            .depth
            .fetch_sub(1, Ordering::SeqCst)
            .saturating_sub(1);
        self.metrics.queue_depth(depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Note(u32);

    impl QueueJob for Note {
        fn job_id(&self) -> String {
            self.0.to_string()
        }

        fn retry_count(&self) -> u32 {
            0
        }

        fn with_retry(&self) -> Self {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_enqueue_is_fifo_and_tracks_depth() {
        let (producer, mut receiver) = channel::<Note>("notes");

        producer.enqueue(Note(1)).unwrap();
        producer.enqueue(Note(2)).unwrap();
        assert_eq!(producer.depth(), 2);

        assert_eq!(receiver.recv().await, Some(Note(1)));
        assert_eq!(receiver.try_next(), Some(Note(2)));
        assert_eq!(receiver.try_next(), None);
        assert_eq!(producer.depth(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_fails_when_receiver_dropped() {
        let (producer, receiver) = channel::<Note>("notes");
        drop(receiver);

        let err = producer.enqueue(Note(1)).unwrap_err();
        assert!(matches!(err, QueueError::Closed(ref name) if name == "notes"));
        assert!(producer.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_after_delays_delivery() {
        let (producer, mut receiver) = channel::<Note>("notes");

        let timer = producer.enqueue_after(Note(7), Duration::from_secs(5));
        assert!(receiver.is_empty());

        timer.await.unwrap();
        assert_eq!(receiver.try_next(), Some(Note(7)));
    }
}

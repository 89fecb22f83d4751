//! Prometheus metrics for queue workers

use crate::error::QueueError;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::time::Duration;
use tracing::info;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder. Subsequent calls are no-ops.
pub fn init_metrics() -> Result<(), QueueError> {
    PROMETHEUS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| QueueError::Config(format!("failed to install Prometheus recorder: {e}")))?;
        info!("Prometheus metrics initialized");
        Ok::<_, QueueError>(handle)
    })?;
    Ok(())
}

/// Render metrics in the Prometheus text format. Empty before `init_metrics`.
pub fn render_metrics() -> String {
    PROMETHEUS_HANDLE.get().map(|h| h.render()).unwrap_or_default()
}

/// Labelled metric helpers for one queue/processor pair.
#[derive(Clone, Debug)]
pub struct QueueMetrics {
    queue_name: String,
    processor_name: String,
}

impl QueueMetrics {
    pub fn new(queue_name: impl Into<String>, processor_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            processor_name: processor_name.into(),
        }
    }

    pub fn job_received(&self) {
        counter!(
            "queue_worker_jobs_received_total",
            "queue" => self.queue_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .increment(1);
    }

    pub fn job_processed(&self, duration: Duration) {
        counter!(
            "queue_worker_jobs_processed_total",
            "queue" => self.queue_name.clone(),
            "processor" => self.processor_name.clone(),
            "status" => "success"
        )
        .increment(1);

        histogram!(
            "queue_worker_job_duration_seconds",
            "queue" => self.queue_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .record(duration.as_secs_f64());
    }

    pub fn job_failed(&self, category: &'static str) {
        counter!(
            "queue_worker_jobs_processed_total",
            "queue" => self.queue_name.clone(),
            "processor" => self.processor_name.clone(),
            "status" => "failed"
        )
        .increment(1);

        counter!(
            "queue_worker_job_errors_total",
            "queue" => self.queue_name.clone(),
            "processor" => self.processor_name.clone(),
            "category" => category
        )
        .increment(1);
    }

    pub fn job_retried(&self) {
        counter!(
            "queue_worker_jobs_retried_total",
            "queue" => self.queue_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .increment(1);
    }

    pub fn job_dead_lettered(&self) {
        counter!(
            "queue_worker_jobs_dlq_total",
            "queue" => self.queue_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .increment(1);
    }

    pub fn in_flight(&self, count: usize) {
        gauge!(
            "queue_worker_in_flight_jobs",
            "queue" => self.queue_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .set(count as f64);
    }

    pub fn queue_depth(&self, depth: usize) {
        gauge!("queue_worker_queue_depth", "queue" => self.queue_name.clone()).set(depth as f64);
    }
}

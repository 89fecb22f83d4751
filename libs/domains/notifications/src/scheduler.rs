//! Publication sweep: promote due posts and announce them.

use crate::error::NotificationResult;
use crate::gateway::DispatchGateway;
use crate::models::EventKind;
use chrono::{DateTime, Utc};
use domain_blog::{BlogRepository, UserDirectory, resolve_snapshot};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// A post the sweep could not finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFailure {
    pub post_id: Uuid,
    pub error: String,
}

/// Counts for one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Posts selected as due.
    pub due: usize,
    /// Posts this sweep flipped to published.
    pub published: usize,
    /// `published` notifications queued.
    pub notified: usize,
    /// Posts another writer got to first.
    pub skipped: usize,
    pub failures: Vec<SweepFailure>,
}

pub struct PublicationScheduler<R: BlogRepository, D: UserDirectory> {
    repository: Arc<R>,
    directory: Arc<D>,
    gateway: DispatchGateway,
}

impl<R: BlogRepository, D: UserDirectory> PublicationScheduler<R, D> {
    pub fn new(repository: Arc<R>, directory: Arc<D>, gateway: DispatchGateway) -> Self {
        Self {
            repository,
            directory,
            gateway,
        }
    }

    /// Publish every post due at `now` and queue one `published`
    /// notification per post this sweep flipped.
    ///
    /// Only a failure to select due posts fails the sweep. Per-post errors
    /// are logged, recorded in the report and skipped.
    pub async fn run_publication_sweep(&self, now: DateTime<Utc>) -> NotificationResult<SweepReport> {
        let due = self.repository.list_due(now).await?;
        let mut report = SweepReport {
            due: due.len(),
            ..SweepReport::default()
        };

        for mut post in due {
            let post_id = post.id;

            match self.repository.mark_published(post_id, now).await {
                Ok(true) => {}
                Ok(false) => {
                    info!(post_id = %post_id, "Post no longer due, skipping");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    error!(post_id = %post_id, error = %e, "Failed to publish post");
                    report.failures.push(SweepFailure {
                        post_id,
                        error: e.to_string(),
                    });
                    continue;
                }
            }

            report.published += 1;
            post.published = true;
            post.updated_at = now;

            let dispatched = match resolve_snapshot(self.directory.as_ref(), post).await {
                Ok(snapshot) => self.gateway.dispatch(EventKind::Published, &snapshot),
                Err(e) => Err(e.into()),
            };

            match dispatched {
                Ok(_) => report.notified += 1,
                Err(e) => {
                    warn!(post_id = %post_id, error = %e, "Post published but notification not queued");
                    report.failures.push(SweepFailure {
                        post_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            due = report.due,
            published = report.published,
            notified = report.notified,
            skipped = report.skipped,
            failures = report.failures.len(),
            "Publication sweep finished"
        );

        Ok(report)
    }
}

//! Daily digest broadcast.

use crate::error::NotificationResult;
use crate::gateway::DispatchGateway;
use crate::models::TaskHandle;
use domain_blog::{BlogRepository, UserDirectory};
use std::sync::Arc;
use tracing::info;

/// Sends every known user one message listing the newest posts.
pub struct DailyDigestJob<R: BlogRepository, D: UserDirectory> {
    repository: Arc<R>,
    directory: Arc<D>,
    gateway: DispatchGateway,
}

impl<R: BlogRepository, D: UserDirectory> DailyDigestJob<R, D> {
    pub fn new(repository: Arc<R>, directory: Arc<D>, gateway: DispatchGateway) -> Self {
        Self {
            repository,
            directory,
            gateway,
        }
    }

    /// Queue one digest for all users. `None` when there is nothing to send
    /// or nobody to send it to.
    pub async fn run_daily_digest(&self) -> NotificationResult<Option<TaskHandle>> {
        let size = self.gateway.composer().digest_size();
        let posts = self.repository.recent(size).await?;
        if posts.is_empty() {
            info!("No posts yet, skipping daily digest");
            return Ok(None);
        }

        let recipients: Vec<String> = self
            .directory
            .list_users()
            .await?
            .into_iter()
            .map(|user| user.email)
            .filter(|email| !email.trim().is_empty())
            .collect();
        if recipients.is_empty() {
            info!("No user has an email address, skipping daily digest");
            return Ok(None);
        }

        let message = self.gateway.composer().compose_digest(&posts, &recipients)?;
        let handle = self.gateway.dispatch_message(message)?;

        info!(
            task_id = %handle.task_id,
            posts = posts.len().min(size),
            recipients = handle.recipients,
            "Daily digest queued"
        );
        Ok(Some(handle))
    }
}

//! Dispatch gateway: compose and enqueue, never wait for delivery.

use crate::composer::NotificationComposer;
use crate::error::NotificationResult;
use crate::models::{DispatchTask, EventKind, NotificationMessage, TaskHandle};
use domain_blog::{ChangeNotifier, ContentEvent, PostSnapshot};
use queue_worker::JobProducer;
use std::sync::Arc;
use tracing::{error, info};

/// Turns content changes into queued dispatch tasks.
///
/// Cheap to clone; every clone feeds the same queue.
#[derive(Clone)]
pub struct DispatchGateway {
    composer: Arc<NotificationComposer>,
    producer: JobProducer<DispatchTask>,
    max_retries: u32,
}

impl DispatchGateway {
    pub fn new(composer: Arc<NotificationComposer>, producer: JobProducer<DispatchTask>, max_retries: u32) -> Self {
        Self {
            composer,
            producer,
            max_retries,
        }
    }

    pub fn composer(&self) -> &NotificationComposer {
        &self.composer
    }

    /// The queue this gateway feeds. A `QueueWorker` needs it for retries.
    pub fn producer(&self) -> &JobProducer<DispatchTask> {
        &self.producer
    }

    /// Compose the notification for `kind` and enqueue one task for it.
    pub fn dispatch(&self, kind: EventKind, snapshot: &PostSnapshot) -> NotificationResult<TaskHandle> {
        let message = self.composer.compose(kind, snapshot)?;
        let handle = self.dispatch_message(message)?;

        info!(
            task_id = %handle.task_id,
            kind = %kind,
            post_id = %snapshot.post.id,
            recipients = handle.recipients,
            "Notification queued"
        );
        Ok(handle)
    }

    /// Enqueue an already composed message.
    pub fn dispatch_message(&self, message: NotificationMessage) -> NotificationResult<TaskHandle> {
        let task = DispatchTask::new(message, self.max_retries);
        let handle = TaskHandle {
            task_id: task.id,
            kind: task.message.kind,
            recipients: task.message.recipients.len(),
        };

        self.producer.enqueue(task)?;
        Ok(handle)
    }
}

impl ChangeNotifier for DispatchGateway {
    fn notify(&self, event: ContentEvent, snapshot: &PostSnapshot) {
        if let Err(e) = self.dispatch(event.into(), snapshot) {
            error!(
                event = %event,
                post_id = %snapshot.post.id,
                error = %e,
                "Failed to dispatch notification"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotificationConfig;
    use domain_blog::{BlogPost, Category, CreateBlogPost, CreateUser, Role, User};
    use queue_worker::{QueueJob, channel};
    use uuid::Uuid;

    fn user(username: &str, role: Role) -> User {
        User::new(CreateUser {
            username: username.into(),
            email: format!("{username}@example.com"),
            first_name: String::new(),
            last_name: String::new(),
            roles: vec![role],
        })
    }

    fn snapshot() -> PostSnapshot {
        let author = user("ada", Role::Author);
        let editor = user("ed", Role::Editor);
        let publisher = user("pat", Role::Publisher);
        let post = BlogPost::new(CreateBlogPost {
            title: "Gateways".into(),
            content: "content".into(),
            image: "uploads/g.png".into(),
            category: Category::Python,
            author_id: author.id,
            editor_id: editor.id,
            publisher_id: publisher.id,
            publish_at: None,
        });
        PostSnapshot {
            post,
            author,
            editor,
            publisher,
        }
    }

    fn composer() -> Arc<NotificationComposer> {
        Arc::new(NotificationComposer::new(&NotificationConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn test_dispatch_enqueues_one_task() {
        let (producer, mut receiver) = channel::<DispatchTask>("test:dispatch");
        let gateway = DispatchGateway::new(composer(), producer, 4);

        let handle = gateway.dispatch(EventKind::Created, &snapshot()).unwrap();

        let task = receiver.try_next().unwrap();
        assert_eq!(task.id, handle.task_id);
        assert_eq!(task.max_retries(), 4);
        assert_eq!(task.message.kind, EventKind::Created);
        assert_eq!(handle.recipients, 2);
        assert!(receiver.try_next().is_none());
    }

    #[tokio::test]
    async fn test_composition_error_enqueues_nothing() {
        let (producer, mut receiver) = channel::<DispatchTask>("test:dispatch");
        let gateway = DispatchGateway::new(composer(), producer, 3);

        let err = gateway.dispatch(EventKind::Digest, &snapshot()).unwrap_err();

        assert!(err.is_composition());
        assert!(receiver.try_next().is_none());
    }

    #[tokio::test]
    async fn test_closed_queue_is_an_error_but_notify_swallows_it() {
        let (producer, receiver) = channel::<DispatchTask>("test:dispatch");
        drop(receiver);
        let gateway = DispatchGateway::new(composer(), producer, 3);

        let err = gateway.dispatch(EventKind::Updated, &snapshot()).unwrap_err();
        assert!(matches!(err, crate::error::NotificationError::Queue(_)));

        gateway.notify(ContentEvent::Updated, &snapshot());
    }

    #[test]
    fn test_dispatch_message_keeps_recipients() {
        let (producer, mut receiver) = channel::<DispatchTask>("test:dispatch");
        let gateway = DispatchGateway::new(composer(), producer, 3);
        let message = NotificationMessage {
            kind: EventKind::Digest,
            subject: "Exciting new blogs".into(),
            body: "body".into(),
            sender: "noreply@blog.local".into(),
            recipients: vec!["a@example.com".into(), "b@example.com".into(), "c@example.com".into()],
        };

        let handle = gateway.dispatch_message(message.clone()).unwrap();

        assert_eq!(handle.kind, EventKind::Digest);
        assert_eq!(handle.recipients, 3);
        assert_eq!(receiver.try_next().unwrap().message, message);
    }
}

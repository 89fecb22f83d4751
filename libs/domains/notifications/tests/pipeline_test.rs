//! End-to-end tests for the notification pipeline over in-memory storage.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use domain_blog::{
    BlogError, BlogFilter, BlogPost, BlogRepository, BlogResult, BlogService, Category, CreateBlogPost, CreateUser,
    InMemoryBlogRepository, InMemoryUserDirectory, Role, UpdateBlogPost, User, UserDirectory,
};
use domain_notifications::{
    DailyDigestJob, DeliveryOutcome, DeliveryWorker, DispatchGateway, DispatchTask, EventKind, InMemoryTransport,
    NotificationComposer, NotificationConfig, NotificationMessage, NotificationQueue, PublicationScheduler,
};
use queue_worker::{ExponentialBackoff, JobReceiver, QueueDef, QueueWorker, WorkerConfig, channel};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

struct Pipeline {
    repository: Arc<InMemoryBlogRepository>,
    directory: Arc<InMemoryUserDirectory>,
    gateway: DispatchGateway,
    receiver: JobReceiver<DispatchTask>,
    author: User,
    editor: User,
    publisher: User,
}

async fn add_user(directory: &InMemoryUserDirectory, username: &str, role: Role) -> User {
    directory
        .create_user(CreateUser {
            username: username.into(),
            email: format!("{username}@blog.example"),
            first_name: String::new(),
            last_name: String::new(),
            roles: vec![role],
        })
        .await
        .unwrap()
}

async fn pipeline() -> Pipeline {
    let directory = Arc::new(InMemoryUserDirectory::new());
    let author = add_user(&directory, "ada", Role::Author).await;
    let editor = add_user(&directory, "ed", Role::Editor).await;
    let publisher = add_user(&directory, "pat", Role::Publisher).await;

    let config = NotificationConfig::new("blog@blog.example");
    let (producer, receiver) = channel::<DispatchTask>(NotificationQueue::QUEUE_NAME);
    let composer = Arc::new(NotificationComposer::new(&config).unwrap());

    Pipeline {
        repository: Arc::new(InMemoryBlogRepository::new()),
        directory,
        gateway: DispatchGateway::new(composer, producer, config.max_delivery_retries),
        receiver,
        author,
        editor,
        publisher,
    }
}

impl Pipeline {
    fn post(&self, title: &str, publish_at: Option<DateTime<Utc>>) -> BlogPost {
        BlogPost::new(CreateBlogPost {
            title: title.into(),
            content: "content".into(),
            image: "uploads/cover.png".into(),
            category: Category::Django,
            author_id: self.author.id,
            editor_id: self.editor.id,
            publisher_id: self.publisher.id,
            publish_at,
        })
    }

    fn queued(&mut self) -> Vec<DispatchTask> {
        std::iter::from_fn(|| self.receiver.try_next()).collect()
    }

    fn scheduler<R: BlogRepository>(&self, repository: Arc<R>) -> PublicationScheduler<R, InMemoryUserDirectory> {
        PublicationScheduler::new(repository, Arc::clone(&self.directory), self.gateway.clone())
    }
}

#[tokio::test]
async fn test_due_post_is_published_and_announced() {
    let mut p = pipeline().await;
    let now = Utc::now();
    let due = p.post("Async Django", Some(now - Duration::minutes(5)));
    p.repository.insert(due.clone()).await;
    p.repository
        .insert(p.post("Next week", Some(now + Duration::days(7))))
        .await;

    let report = p
        .scheduler(Arc::clone(&p.repository))
        .run_publication_sweep(now)
        .await
        .unwrap();

    assert_eq!(report.due, 1);
    assert_eq!(report.published, 1);
    assert_eq!(report.notified, 1);
    assert!(report.failures.is_empty());
    assert!(p.repository.get_by_id(due.id).await.unwrap().unwrap().published);

    let tasks = p.queued();
    assert_eq!(tasks.len(), 1);
    let message = &tasks[0].message;
    assert_eq!(message.kind, EventKind::Published);
    assert_eq!(message.subject, "Blog Post Published: Async Django");
    assert_eq!(message.recipients, vec![p.author.email.clone(), p.editor.email.clone()]);

    let transport = Arc::new(InMemoryTransport::new());
    let outcome = DeliveryWorker::new(Arc::clone(&transport)).deliver(&tasks[0]).await;
    assert!(matches!(outcome, DeliveryOutcome::Delivered { accepted: 2, .. }));
    assert!(transport.was_sent_to(&p.author.email).await);
}

#[tokio::test]
async fn test_second_sweep_sends_nothing() {
    let mut p = pipeline().await;
    let now = Utc::now();
    for i in 0..3 {
        p.repository
            .insert(p.post(&format!("Scheduled {i}"), Some(now - Duration::seconds(i))))
            .await;
    }
    let scheduler = p.scheduler(Arc::clone(&p.repository));

    let first = scheduler.run_publication_sweep(now).await.unwrap();
    let second = scheduler.run_publication_sweep(now).await.unwrap();

    assert_eq!(first.notified, 3);
    assert_eq!(second.due, 0);
    assert_eq!(second.notified, 0);
    assert_eq!(p.queued().len(), 3);
}

#[tokio::test]
async fn test_digest_lists_three_newest_to_every_user() {
    let mut p = pipeline().await;
    let reader = add_user(&p.directory, "reader", Role::Author).await;
    let base = Utc::now() - Duration::hours(1);
    for i in 0..5 {
        let mut post = p.post(&format!("Post {i}"), None);
        post.created_at = base + Duration::minutes(i);
        p.repository.insert(post).await;
    }

    let digest = DailyDigestJob::new(Arc::clone(&p.repository), Arc::clone(&p.directory), p.gateway.clone());
    let handle = digest.run_daily_digest().await.unwrap().unwrap();

    assert_eq!(handle.kind, EventKind::Digest);
    assert_eq!(handle.recipients, 4);

    let tasks = p.queued();
    assert_eq!(tasks.len(), 1);
    let message = &tasks[0].message;
    assert_eq!(message.subject, "Exciting new blogs");
    assert!(message.recipients.contains(&reader.email));
    assert_eq!(message.body.matches("👉").count(), 3);
    for title in ["Post 4", "Post 3", "Post 2"] {
        assert!(message.body.contains(title), "missing {title}");
    }
    assert!(!message.body.contains("Post 1"));
}

#[tokio::test]
async fn test_digest_skips_without_posts() {
    let mut p = pipeline().await;
    let digest = DailyDigestJob::new(Arc::clone(&p.repository), Arc::clone(&p.directory), p.gateway.clone());

    assert!(digest.run_daily_digest().await.unwrap().is_none());
    assert!(p.queued().is_empty());
}

#[tokio::test]
async fn test_publisher_deletion_notifies_editor_and_author() {
    let mut p = pipeline().await;
    let post = p.post("Scrapy spiders", None);
    p.repository.insert(post.clone()).await;
    let service = BlogService::new(
        Arc::clone(&p.repository),
        Arc::clone(&p.directory),
        Arc::new(p.gateway.clone()),
    );

    service.delete_post(&p.publisher, post.id).await.unwrap();

    let tasks = p.queued();
    assert_eq!(tasks.len(), 1);
    let message = &tasks[0].message;
    assert_eq!(message.kind, EventKind::Deleted);
    assert_eq!(message.subject, "Blog Post Deleted: Scrapy spiders");
    assert_eq!(message.recipients, vec![p.editor.email.clone(), p.author.email.clone()]);
    assert!(message.body.contains("deleted by pat"));
}

#[tokio::test]
async fn test_rejected_mutation_queues_nothing() {
    let mut p = pipeline().await;
    let post = p.post("Protected", None);
    p.repository.insert(post.clone()).await;
    let service = BlogService::new(
        Arc::clone(&p.repository),
        Arc::clone(&p.directory),
        Arc::new(p.gateway.clone()),
    );

    let err = service.delete_post(&p.author, post.id).await.unwrap_err();

    assert!(matches!(err, BlogError::Forbidden { .. }));
    assert!(p.queued().is_empty());
}

#[tokio::test]
async fn test_failing_transport_dead_letters_with_exact_recipients() {
    let p = pipeline().await;
    let Pipeline {
        gateway,
        receiver,
        editor,
        publisher,
        ..
    } = p;
    let transport = Arc::new(InMemoryTransport::failing("550 mailbox unavailable"));
    let post = BlogPost::new(CreateBlogPost {
        title: "Bounced".into(),
        content: "content".into(),
        image: "uploads/b.png".into(),
        category: Category::Python,
        author_id: Uuid::now_v7(),
        editor_id: editor.id,
        publisher_id: publisher.id,
        publish_at: None,
    });
    let snapshot = domain_blog::PostSnapshot {
        author: editor.clone(),
        editor: editor.clone(),
        publisher: publisher.clone(),
        post,
    };

    let worker = QueueWorker::new(
        receiver,
        gateway.producer().clone(),
        DeliveryWorker::new(Arc::clone(&transport)),
        WorkerConfig::from_queue_def::<NotificationQueue>().with_shutdown_grace_ms(5_000),
    )
    .with_retry_policy(ExponentialBackoff::new().with_base_delay(std::time::Duration::from_millis(1)));
    let dead_letters = worker.dead_letters();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(worker.run(shutdown_rx));

    gateway.dispatch(EventKind::Created, &snapshot).unwrap();
    shutdown_tx.send(true).unwrap();
    let report = handle.await.unwrap();

    assert_eq!(report.processed, 0);
    assert_eq!(report.dead_lettered, 1);
    assert_eq!(transport.attempts(), 4);
    assert_eq!(transport.sent_count().await, 0);

    let letters = dead_letters.list().await;
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].job.message.recipients, vec![publisher.email, editor.email]);
    assert!(letters[0].error.contains("550 mailbox unavailable"));
}

#[tokio::test]
async fn test_refused_recipient_is_not_resent_to_accepted_ones() {
    let p = pipeline().await;
    let transport = Arc::new(InMemoryTransport::rejecting(["bad"]));
    let worker = QueueWorker::new(
        p.receiver,
        p.gateway.producer().clone(),
        DeliveryWorker::new(Arc::clone(&transport)),
        WorkerConfig::from_queue_def::<NotificationQueue>().with_shutdown_grace_ms(5_000),
    )
    .with_retry_policy(ExponentialBackoff::new().with_base_delay(std::time::Duration::from_millis(1)));
    let dead_letters = worker.dead_letters();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(worker.run(shutdown_rx));

    p.gateway
        .dispatch_message(NotificationMessage {
            kind: EventKind::Digest,
            subject: "Exciting new blogs".into(),
            body: "👉 Refusals".into(),
            sender: "blog@blog.example".into(),
            recipients: vec![p.author.email.clone(), "bad".into()],
        })
        .unwrap();
    shutdown_tx.send(true).unwrap();
    let report = handle.await.unwrap();

    assert_eq!(transport.attempts(), 1);
    assert_eq!(transport.sent_count().await, 1);
    assert_eq!(report.retried, 0);
    assert_eq!(report.dead_lettered, 1);

    let letters = dead_letters.list().await;
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].retry_count, 0);
    assert!(letters[0].error.contains("1 recipient(s) rejected"));
}

#[tokio::test]
async fn test_created_post_is_delivered_by_worker_pool() {
    let p = pipeline().await;
    let transport = Arc::new(InMemoryTransport::new());
    let worker = QueueWorker::new(
        p.receiver,
        p.gateway.producer().clone(),
        DeliveryWorker::new(Arc::clone(&transport)),
        WorkerConfig::from_queue_def::<NotificationQueue>(),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(worker.run(shutdown_rx));

    let service = BlogService::new(
        Arc::clone(&p.repository),
        Arc::clone(&p.directory),
        Arc::new(p.gateway.clone()),
    );
    service
        .create_post(
            &p.author,
            CreateBlogPost {
                title: "Power BI tips".into(),
                content: "content".into(),
                image: "uploads/pbi.png".into(),
                category: Category::PowerBi,
                author_id: p.author.id,
                editor_id: p.editor.id,
                publisher_id: p.publisher.id,
                publish_at: None,
            },
        )
        .await
        .unwrap();

    shutdown_tx.send(true).unwrap();
    let report = handle.await.unwrap();

    assert_eq!(report.processed, 1);
    let sent = transport.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "New Blog Post Created: Power BI tips");
    assert_eq!(sent[0].recipients, vec![p.publisher.email.clone(), p.editor.email.clone()]);
    assert!(sent[0].body.contains("Category: PowerBI"));
}

/// Fails `mark_published` for one post and delegates everything else.
struct BrokenRow {
    inner: Arc<InMemoryBlogRepository>,
    broken: Uuid,
}

#[async_trait]
impl BlogRepository for BrokenRow {
    async fn create(&self, input: CreateBlogPost) -> BlogResult<BlogPost> {
        self.inner.create(input).await
    }

    async fn get_by_id(&self, id: Uuid) -> BlogResult<Option<BlogPost>> {
        self.inner.get_by_id(id).await
    }

    async fn list(&self, filter: BlogFilter) -> BlogResult<Vec<BlogPost>> {
        self.inner.list(filter).await
    }

    async fn update(&self, id: Uuid, input: UpdateBlogPost) -> BlogResult<BlogPost> {
        self.inner.update(id, input).await
    }

    async fn delete(&self, id: Uuid) -> BlogResult<bool> {
        self.inner.delete(id).await
    }

    async fn list_due(&self, now: DateTime<Utc>) -> BlogResult<Vec<BlogPost>> {
        self.inner.list_due(now).await
    }

    async fn mark_published(&self, id: Uuid, now: DateTime<Utc>) -> BlogResult<bool> {
        if id == self.broken {
            return Err(BlogError::Database("deadlock detected".into()));
        }
        self.inner.mark_published(id, now).await
    }

    async fn recent(&self, limit: usize) -> BlogResult<Vec<BlogPost>> {
        self.inner.recent(limit).await
    }
}

#[tokio::test]
async fn test_one_failing_row_does_not_stop_the_sweep() {
    let mut p = pipeline().await;
    let now = Utc::now();
    let broken = p.post("Broken", Some(now - Duration::minutes(2)));
    let healthy = p.post("Healthy", Some(now - Duration::minutes(1)));
    p.repository.insert(broken.clone()).await;
    p.repository.insert(healthy.clone()).await;
    let repository = Arc::new(BrokenRow {
        inner: Arc::clone(&p.repository),
        broken: broken.id,
    });

    let report = p.scheduler(repository).run_publication_sweep(now).await.unwrap();

    assert_eq!(report.due, 2);
    assert_eq!(report.published, 1);
    assert_eq!(report.notified, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].post_id, broken.id);
    assert!(!p.repository.get_by_id(broken.id).await.unwrap().unwrap().published);

    let tasks = p.queued();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].message.subject, "Blog Post Published: Healthy");
}

#[tokio::test]
async fn test_missing_role_holder_publishes_without_notifying() {
    let mut p = pipeline().await;
    let now = Utc::now();
    let mut orphan = p.post("Orphan", Some(now - Duration::minutes(1)));
    orphan.editor_id = Uuid::now_v7();
    p.repository.insert(orphan.clone()).await;

    let report = p
        .scheduler(Arc::clone(&p.repository))
        .run_publication_sweep(now)
        .await
        .unwrap();

    assert_eq!(report.published, 1);
    assert_eq!(report.notified, 0);
    assert_eq!(report.failures.len(), 1);
    assert!(p.queued().is_empty());
}

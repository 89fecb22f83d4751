//! Notifications Domain
//!
//! Email notifications for blog content changes, the scheduled publication
//! sweep and the daily digest.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   ┌──────────────────────┐   ┌────────────────┐
//! │   BlogService   │   │ PublicationScheduler │   │ DailyDigestJob │
//! └────────┬────────┘   └──────────┬───────────┘   └───────┬────────┘
//!          │ ChangeNotifier        │ published             │ digest
//! ┌────────▼───────────────────────▼───────────────────────▼────────┐
//! │                         DispatchGateway                         │  ← compose + enqueue
//! └────────────────────────────────┬────────────────────────────────┘
//!                                  │
//! ┌────────────────────────────────▼────────────────────────────────┐
//! │               queue-worker (notifications:dispatch)             │  ← retries, DLQ
//! └────────────────────────────────┬────────────────────────────────┘
//!                                  │
//!                         ┌────────▼────────┐
//!                         │ DeliveryWorker  │
//!                         └────────┬────────┘
//!                                  │
//!                         ┌────────▼────────┐
//!                         │  MailTransport  │  ← SMTP, in-memory
//!                         └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_notifications::{
//!     DeliveryWorker, DispatchGateway, NotificationComposer, NotificationConfig, NotificationQueue,
//!     providers::InMemoryTransport,
//! };
//! use queue_worker::{QueueWorker, WorkerConfig, channel};
//!
//! let config = NotificationConfig::default();
//! let (producer, receiver) = channel(NotificationQueue::QUEUE_NAME);
//! let composer = Arc::new(NotificationComposer::new(&config)?);
//! let gateway = DispatchGateway::new(composer, producer.clone(), config.max_delivery_retries);
//!
//! let worker = DeliveryWorker::new(Arc::new(InMemoryTransport::new()));
//! let pool = QueueWorker::new(receiver, producer, worker, WorkerConfig::from_queue_def::<NotificationQueue>());
//! tokio::spawn(pool.run(shutdown_rx));
//!
//! gateway.dispatch(EventKind::Created, &snapshot)?;
//! ```
//!
//! # Embedding in a CRUD host
//!
//! The queue is an in-process channel. `created`, `updated` and `deleted`
//! notifications are only delivered when the process that runs `BlogService`
//! also owns the gateway and a worker pool draining it:
//!
//! ```rust,ignore
//! let service = BlogService::new(repository, directory, Arc::new(gateway.clone()));
//! service.create_post(&actor, input).await?; // queued on `gateway`, sent by `pool`
//! ```
//!
//! The `blog-notifier` binary wires the same pieces for the publication sweep
//! and the daily digest only.

pub mod composer;
pub mod config;
pub mod digest;
pub mod error;
pub mod gateway;
pub mod models;
pub mod providers;
pub mod queues;
pub mod scheduler;
pub mod worker;

pub use composer::NotificationComposer;
pub use config::NotificationConfig;
pub use digest::DailyDigestJob;
pub use error::{NotificationError, NotificationResult};
pub use gateway::DispatchGateway;
pub use models::{DeliveryOutcome, DispatchTask, EventKind, NotificationMessage, TaskHandle};
pub use providers::{InMemoryTransport, MailTransport, SendReport, SmtpConfig, SmtpTransport};
pub use queues::NotificationQueue;
pub use scheduler::{PublicationScheduler, SweepFailure, SweepReport};
pub use worker::DeliveryWorker;

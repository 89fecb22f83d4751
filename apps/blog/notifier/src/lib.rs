//! Blog Notifier Service
//!
//! Background process that delivers blog notifications, publishes scheduled
//! posts and sends the daily digest.
//!
//! ## Architecture
//!
//! ```text
//! JobScheduler (cron)
//!   ├─ PublicationScheduler ──┐
//!   └─ DailyDigestJob ────────┤
//!                             ↓
//!                      DispatchGateway
//!                             ↓ (notifications:dispatch)
//!          QueueWorker<DispatchTask, DeliveryWorker>
//!                             ↓
//!                      SMTP / dry run
//! ```
//!
//! ## Modes
//!
//! - `serve`: cron jobs, delivery workers and the health server until
//!   SIGINT/SIGTERM
//! - `sweep` / `digest`: run one job, deliver what it queued, exit
//!
//! Only `published` and `digest` notifications flow through this process.
//! Create, update and delete notifications are queued in-process by whatever
//! host runs `BlogService`, which must embed its own `DispatchGateway` and
//! delivery worker pool (see `domain_notifications`).

pub mod config;
pub mod db;
pub mod health;
pub mod transport;

use chrono::Utc;
use config::Config;
use core_config::{Environment, FromEnv};
use domain_blog::{PgBlogRepository, PgUserDirectory};
use domain_notifications::{
    DailyDigestJob, DeliveryWorker, DispatchGateway, DispatchTask, NotificationComposer, NotificationQueue,
    PublicationScheduler,
};
use eyre::{Result, WrapErr};
use health::HealthState;
use queue_worker::{DeadLetterQueue, QueueDef, QueueWorker, WorkerConfig, WorkerReport, channel};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};
use transport::Transport;

const DEFAULT_LOG_DIRECTIVES: &str = "info,blog_notifier=debug,domain_notifications=debug,queue_worker=info";

/// What the process should do once started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Long running: cron jobs plus delivery. Cron overrides fall back to config.
    Serve {
        sweep_cron: Option<String>,
        digest_cron: Option<String>,
    },
    /// One publication sweep, then exit once its notifications are delivered.
    Sweep,
    /// One daily digest, then exit once it is delivered.
    Digest,
}

type Scheduler = PublicationScheduler<PgBlogRepository, PgUserDirectory>;
type Digest = DailyDigestJob<PgBlogRepository, PgUserDirectory>;

/// Everything wired up and the delivery worker already running.
struct Pipeline {
    db: DatabaseConnection,
    gateway: DispatchGateway,
    scheduler: Arc<Scheduler>,
    digest: Arc<Digest>,
    dead_letters: DeadLetterQueue<DispatchTask>,
    shutdown_tx: watch::Sender<bool>,
    worker: JoinHandle<WorkerReport>,
}

impl Pipeline {
    async fn start(config: &Config) -> Result<Self> {
        info!("Connecting to PostgreSQL...");
        let db = db::connect_with_retry(&config.database)
            .await
            .wrap_err("Failed to connect to PostgreSQL")?;

        if config.run_migrations {
            db::run_migrations(&db).await.wrap_err("Failed to run migrations")?;
        }

        let repository = Arc::new(PgBlogRepository::new(db.clone()));
        let directory = Arc::new(PgUserDirectory::new(db.clone()));

        let composer = Arc::new(
            NotificationComposer::new(&config.notifications).wrap_err("Failed to register notification templates")?,
        );
        let (producer, receiver) = channel::<DispatchTask>(NotificationQueue::QUEUE_NAME);
        let gateway = DispatchGateway::new(composer, producer.clone(), config.notifications.max_delivery_retries);

        let transport = Transport::from_config(config).wrap_err("Failed to set up mail transport")?;
        let worker_config = WorkerConfig::from_queue_def::<NotificationQueue>()
            .with_max_concurrent_jobs(config.worker_concurrency)
            .with_job_timeout_ms(config.delivery_timeout_secs.saturating_mul(1000));
        info!(
            queue = %worker_config.queue_name,
            max_concurrent_jobs = worker_config.max_concurrent_jobs,
            job_timeout_ms = worker_config.job_timeout_ms,
            "Worker configuration loaded"
        );

        let worker = QueueWorker::new(
            receiver,
            producer,
            DeliveryWorker::new(Arc::new(transport)),
            worker_config,
        );
        let dead_letters = worker.dead_letters();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(worker.run(shutdown_rx));

        Ok(Self {
            scheduler: Arc::new(PublicationScheduler::new(
                repository.clone(),
                directory.clone(),
                gateway.clone(),
            )),
            digest: Arc::new(DailyDigestJob::new(repository, directory, gateway.clone())),
            db,
            gateway,
            dead_letters,
            shutdown_tx,
            worker,
        })
    }

    /// Signal the worker and wait for it to drain.
    async fn stop(self) -> Result<WorkerReport> {
        let _ = self.shutdown_tx.send(true);
        let report = self.worker.await.wrap_err("Delivery worker panicked")?;

        let dead = self.dead_letters.list().await;
        for letter in &dead {
            warn!(
                task_id = %letter.job.id,
                kind = %letter.job.message.kind,
                recipients = ?letter.job.message.recipients,
                retry_count = letter.retry_count,
                error = %letter.error,
                "Notification was not delivered"
            );
        }

        info!(
            delivered = report.processed,
            failed = report.failed,
            retried = report.retried,
            dead_lettered = report.dead_lettered,
            "Delivery worker stopped"
        );
        Ok(report)
    }
}

async fn sweep_once(scheduler: &Scheduler) {
    match scheduler.run_publication_sweep(Utc::now()).await {
        Ok(report) => info!(
            due = report.due,
            published = report.published,
            notified = report.notified,
            skipped = report.skipped,
            failures = report.failures.len(),
            "Publication sweep complete"
        ),
        Err(e) => error!(error = %e, "Publication sweep failed"),
    }
}

async fn digest_once(digest: &Digest) {
    match digest.run_daily_digest().await {
        Ok(Some(handle)) => info!(
            task_id = %handle.task_id,
            recipients = handle.recipients,
            "Daily digest queued"
        ),
        Ok(None) => info!("Daily digest skipped, nothing to send"),
        Err(e) => error!(error = %e, "Daily digest failed"),
    }
}

async fn schedule_jobs(pipeline: &Pipeline, sweep_cron: &str, digest_cron: &str) -> Result<JobScheduler> {
    let sched = JobScheduler::new().await.wrap_err("Failed to create job scheduler")?;

    let scheduler = pipeline.scheduler.clone();
    let sweep = Job::new_async(sweep_cron, move |_uuid, _l| {
        let scheduler = scheduler.clone();
        Box::pin(async move {
            sweep_once(&scheduler).await;
        })
    })
    .wrap_err_with(|| format!("Invalid sweep cron expression '{}'", sweep_cron))?;

    let digest = pipeline.digest.clone();
    let daily = Job::new_async(digest_cron, move |_uuid, _l| {
        let digest = digest.clone();
        Box::pin(async move {
            digest_once(&digest).await;
        })
    })
    .wrap_err_with(|| format!("Invalid digest cron expression '{}'", digest_cron))?;

    sched.add(sweep).await?;
    sched.add(daily).await?;
    sched.start().await?;

    info!(sweep_cron, digest_cron, "Scheduler started");
    Ok(sched)
}

/// Run the notifier in the given mode.
///
/// # Errors
///
/// Returns an error if configuration is invalid, PostgreSQL is unreachable,
/// a cron expression does not parse or the delivery worker panics.
pub async fn run(mode: Mode) -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment, DEFAULT_LOG_DIRECTIVES);

    if let Err(e) = queue_worker::init_metrics() {
        warn!(error = %e, "Metrics exporter unavailable");
    }

    let config = Config::from_env().wrap_err("Failed to load configuration")?;
    let app_name = env!("CARGO_PKG_NAME");
    let app_version = env!("CARGO_PKG_VERSION");
    info!(name = app_name, version = app_version, ?mode, "Starting blog notifier");

    let pipeline = Pipeline::start(&config).await?;

    match mode {
        Mode::Serve {
            sweep_cron,
            digest_cron,
        } => {
            let sweep_cron = sweep_cron.unwrap_or_else(|| config.sweep_cron.clone());
            let digest_cron = digest_cron.unwrap_or_else(|| config.digest_cron.clone());
            let mut sched = schedule_jobs(&pipeline, &sweep_cron, &digest_cron).await?;

            let health_state = HealthState {
                db: pipeline.db.clone(),
                app_name: app_name.to_string(),
                app_version: app_version.to_string(),
                queue: pipeline.gateway.producer().clone(),
                dead_letters: pipeline.dead_letters.clone(),
            };
            let health_port = config.health_port;
            tokio::spawn(async move {
                if let Err(e) = health::serve_health(health_state, health_port).await {
                    error!(error = %e, "Health server failed");
                }
            });

            shutdown_signal().await?;

            if let Err(e) = sched.shutdown().await {
                warn!(error = %e, "Scheduler did not shut down cleanly");
            }
            pipeline.stop().await?;
        }
        Mode::Sweep => {
            sweep_once(&pipeline.scheduler).await;
            pipeline.stop().await?;
        }
        Mode::Digest => {
            digest_once(&pipeline.digest).await;
            pipeline.stop().await?;
        }
    }

    info!("Blog notifier stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.wrap_err("Failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .wrap_err("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<(), eyre::Report>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        result = ctrl_c => {
            result?;
            info!("Received Ctrl+C, initiating shutdown...");
        },
        result = terminate => {
            result?;
            info!("Received SIGTERM, initiating shutdown...");
        },
    }

    Ok(())
}

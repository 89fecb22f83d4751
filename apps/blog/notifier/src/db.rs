//! PostgreSQL connection and migrations

use crate::config::PostgresConfig;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection, DbErr};
use std::time::Duration;
use tracing::{info, warn};

const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(250);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Connect with exponential backoff between attempts.
pub async fn connect_with_retry(config: &PostgresConfig) -> Result<DatabaseConnection, DbErr> {
    let attempts = config.connect_retries.max(1);
    let mut delay = INITIAL_RETRY_DELAY;
    let mut attempt = 1;

    loop {
        match Database::connect(config.connect_options()).await {
            Ok(db) => {
                info!(attempt, "Connected to PostgreSQL");
                return Ok(db);
            }
            Err(e) if attempt < attempts => {
                warn!(
                    attempt,
                    max_attempts = attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "PostgreSQL connection failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_RETRY_DELAY);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

pub async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    info!("Running database migrations");
    Migrator::up(db, None).await?;
    info!("Database migrations complete");
    Ok(())
}

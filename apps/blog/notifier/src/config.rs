//! Configuration for the blog notifier

use core_config::{ConfigError, Environment, FromEnv, env_flag, env_or_default, env_parse, env_required};
use domain_notifications::{NotificationConfig, SmtpConfig};
use sea_orm::ConnectOptions;
use std::time::Duration;
use tracing::log::LevelFilter;

/// PostgreSQL pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub acquire_timeout_secs: u64,
    /// Attempts before giving up on startup.
    pub connect_retries: u32,
    pub sqlx_logging: bool,
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 8,
            acquire_timeout_secs: 8,
            connect_retries: 5,
            sqlx_logging: false,
        }
    }

    pub fn connect_options(&self) -> ConnectOptions {
        let mut opt = ConnectOptions::new(&self.url);
        opt.max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .sqlx_logging(self.sqlx_logging)
            .sqlx_logging_level(LevelFilter::Debug);
        opt
    }
}

/// Environment variables:
/// - `DATABASE_URL` (required)
/// - `DB_MAX_CONNECTIONS` (default: 10)
/// - `DB_MIN_CONNECTIONS` (default: 1)
/// - `DB_CONNECT_TIMEOUT_SECS` (default: 8)
/// - `DB_ACQUIRE_TIMEOUT_SECS` (default: 8)
/// - `DB_CONNECT_RETRIES` (default: 5)
/// - `DB_SQLX_LOGGING` (default: false)
impl FromEnv for PostgresConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::new(env_required("DATABASE_URL")?);
        Ok(Self {
            max_connections: env_parse("DB_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: env_parse("DB_MIN_CONNECTIONS", defaults.min_connections)?,
            connect_timeout_secs: env_parse("DB_CONNECT_TIMEOUT_SECS", defaults.connect_timeout_secs)?,
            acquire_timeout_secs: env_parse("DB_ACQUIRE_TIMEOUT_SECS", defaults.acquire_timeout_secs)?,
            connect_retries: env_parse("DB_CONNECT_RETRIES", defaults.connect_retries)?,
            sqlx_logging: env_flag("DB_SQLX_LOGGING", defaults.sqlx_logging)?,
            ..defaults
        })
    }
}

/// Which mail transport the delivery worker uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Smtp,
    /// Record messages in memory and log them. For dry runs.
    Memory,
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "smtp" => Ok(TransportKind::Smtp),
            "memory" => Ok(TransportKind::Memory),
            other => Err(format!("unknown mail transport '{other}', expected smtp or memory")),
        }
    }
}

const MAX_DELIVERY_TIMEOUT_SECS: u64 = 3_600;

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub database: PostgresConfig,
    pub notifications: NotificationConfig,
    pub smtp: SmtpConfig,
    pub transport: TransportKind,
    pub health_port: u16,
    pub worker_concurrency: usize,
    pub delivery_timeout_secs: u64,
    pub sweep_cron: String,
    pub digest_cron: String,
    pub run_migrations: bool,
}

impl FromEnv for Config {
    fn from_env() -> Result<Self, ConfigError> {
        let worker_concurrency = env_parse("WORKER_CONCURRENCY", 4usize)?;
        if worker_concurrency == 0 {
            return Err(ConfigError::Invalid("WORKER_CONCURRENCY must be at least 1".into()));
        }

        let delivery_timeout_secs = env_parse("DELIVERY_TIMEOUT_SECS", 30u64)?;
        if !(1..=MAX_DELIVERY_TIMEOUT_SECS).contains(&delivery_timeout_secs) {
            return Err(ConfigError::Invalid(format!(
                "DELIVERY_TIMEOUT_SECS must be between 1 and {MAX_DELIVERY_TIMEOUT_SECS}"
            )));
        }

        Ok(Self {
            environment: Environment::from_env(),
            database: PostgresConfig::from_env()?,
            notifications: NotificationConfig::from_env()?,
            smtp: SmtpConfig::from_env()?,
            transport: env_parse("MAIL_TRANSPORT", TransportKind::Smtp)?,
            health_port: env_parse("HEALTH_PORT", 8090)?,
            worker_concurrency,
            delivery_timeout_secs,
            sweep_cron: env_or_default("SWEEP_CRON", "0 * * * * *"),
            digest_cron: env_or_default("DIGEST_CRON", "0 0 9 * * *"),
            run_migrations: env_flag("RUN_MIGRATIONS", false)?,
        })
    }
}

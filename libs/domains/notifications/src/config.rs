use core_config::{ConfigError, FromEnv, env_or_default, env_parse};

/// Settings shared by the composer, gateway and digest job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    /// Sender address on every message.
    pub default_sender: String,
    /// Posts listed in the daily digest.
    pub digest_size: usize,
    /// Delivery retries before a task is dead-lettered.
    pub max_delivery_retries: u32,
}

impl NotificationConfig {
    pub fn new(default_sender: impl Into<String>) -> Self {
        Self {
            default_sender: default_sender.into(),
            ..Self::default()
        }
    }

    pub fn with_digest_size(mut self, size: usize) -> Self {
        self.digest_size = size;
        self
    }

    pub fn with_max_delivery_retries(mut self, retries: u32) -> Self {
        self.max_delivery_retries = retries;
        self
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if !self.default_sender.contains('@') {
            return Err(ConfigError::Invalid(format!(
                "DEFAULT_FROM_EMAIL '{}' is not an email address",
                self.default_sender
            )));
        }
        if self.digest_size == 0 {
            return Err(ConfigError::Invalid("DIGEST_SIZE must be at least 1".into()));
        }
        Ok(self)
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            default_sender: "noreply@blog.local".into(),
            digest_size: 3,
            max_delivery_retries: 3,
        }
    }
}

impl FromEnv for NotificationConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Self {
            default_sender: env_or_default("DEFAULT_FROM_EMAIL", &defaults.default_sender),
            digest_size: env_parse("DIGEST_SIZE", defaults.digest_size)?,
            max_delivery_retries: env_parse("DELIVERY_MAX_RETRIES", defaults.max_delivery_retries)?,
        }
        .validate()
    }
}

//! Client configuration
//!
//! Connection settings of the Queue API client.

use std::time::Duration;

use crate::error::{ClientError, Result};

/// Queue API connection settings
#[derive(Clone)]
pub struct ClientConfig {
    /// Queue API base URL (e.g., "https://queue.example.com")
    pub base_url: String,

    /// Internal API token sent with every request
    pub token: String,

    /// Timeout of a single request
    pub timeout: Duration,
}

impl ClientConfig {
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    /// Creates a new configuration with defaults
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - JOB_QUEUE_URL (required)
    /// - JOB_QUEUE_TOKEN (required)
    /// - JOB_QUEUE_TIMEOUT (optional, seconds, default: 120)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = lookup("JOB_QUEUE_URL")
            .ok_or_else(|| ClientError::ConfigError("JOB_QUEUE_URL environment variable not set".to_string()))?;

        let token = lookup("JOB_QUEUE_TOKEN")
            .ok_or_else(|| ClientError::ConfigError("JOB_QUEUE_TOKEN environment variable not set".to_string()))?;

        let timeout = match lookup("JOB_QUEUE_TIMEOUT") {
            None => Self::DEFAULT_TIMEOUT,
            Some(value) => value.parse::<u64>().map(Duration::from_secs).map_err(|_| {
                ClientError::ConfigError(format!("JOB_QUEUE_TIMEOUT must be a number of seconds, got \"{value}\""))
            })?,
        };

        Ok(Self {
            base_url,
            token,
            timeout,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(ClientError::ConfigError("base_url cannot be empty".to_string()));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ClientError::ConfigError(
                "base_url must start with http:// or https://".to_string(),
            ));
        }

        if self.token.is_empty() {
            return Err(ClientError::ConfigError("token cannot be empty".to_string()));
        }

        if self.timeout.is_zero() {
            return Err(ClientError::ConfigError("timeout must be greater than 0".to_string()));
        }

        Ok(())
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("token", &"***")
            .field("timeout", &self.timeout)
            .finish()
    }
}

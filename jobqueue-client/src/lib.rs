//! Job Queue Client
//!
//! Builds, validates, encrypts and sends jobs to the job queue control-plane
//! API.
//!
//! This crate provides:
//! - [`NewJobFactory`]: turns caller input into a complete, encrypted job,
//!   resolving runtime settings and the job type on the way
//! - [`ExistingJobFactory`]: wraps stored job records and derives modified copies
//! - [`Job`]: the resolved job with lazily decrypted views
//! - [`OrchestrationTaskMatcher`]: pairs orchestration tasks with child jobs
//! - [`QueueClient`]: HTTP client of the Queue API
//!
//! Remote collaborators (token verification, component registry, encryption,
//! token issuance, data planes) are traits in [`services`]; implementations
//! are injected by the caller.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use jobqueue_client::{ClientConfig, ExistingJobFactory, JobDependencies, NewJobFactory, QueueClient};
//! use serde_json::json;
//!
//! # async fn example(deps: JobDependencies) -> jobqueue_client::Result<()> {
//! let deps = Arc::new(deps);
//! let client = QueueClient::from_config(&ClientConfig::from_env()?, ExistingJobFactory::new(deps.clone()))?;
//!
//! let job = NewJobFactory::new(deps)
//!     .create_new_job(json!({
//!         "#tokenString": "my-storage-token",
//!         "componentId": "keboola.ex-db-snowflake",
//!         "configId": "123",
//!     }))
//!     .await?;
//!
//! let created = client.create_job(&job).await?;
//! println!("Created job: {}", created.id());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod encryption;
pub mod error;
pub mod factory;
pub mod job;
mod jobs;
pub mod orchestration;
pub mod query;
pub mod runtime;
pub mod services;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use factory::{ExistingJobFactory, JobDependencies, NewJobFactory};
pub use job::Job;
pub use orchestration::{JobPage, JobRepository, MatchMode, OrchestrationTaskMatcher};
pub use query::ListJobsOptions;

use reqwest::Client;
use serde::de::DeserializeOwned;

/// Header carrying the internal API token
const TOKEN_HEADER: &str = "X-JobQueue-InternalApi-Token";

/// HTTP client for the Queue API
///
/// Responses are turned into [`Job`]s through the given
/// [`ExistingJobFactory`], so returned jobs can decrypt and look up their
/// component like any other.
#[derive(Clone)]
pub struct QueueClient {
    /// Base URL of the Queue API (e.g., "https://queue.example.com")
    base_url: String,
    /// Internal API token
    token: String,
    /// HTTP client instance
    client: Client,
    factory: ExistingJobFactory,
}

impl QueueClient {
    /// Create a new Queue API client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the Queue API
    /// * `token` - Internal API token
    /// * `factory` - Factory wrapping returned job records
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, factory: ExistingJobFactory) -> Self {
        Self::with_client(base_url, token, Client::new(), factory)
    }

    /// Create a new Queue API client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(
        base_url: impl Into<String>,
        token: impl Into<String>,
        client: Client,
        factory: ExistingJobFactory,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            client,
            factory,
        }
    }

    /// Create a client from validated configuration
    pub fn from_config(config: &ClientConfig, factory: ExistingJobFactory) -> Result<Self> {
        config.validate()?;
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self::with_client(&config.base_url, &config.token, client, factory))
    }

    /// Get the base URL of the Queue API
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

impl std::fmt::Debug for QueueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

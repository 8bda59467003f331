//! Error types for the job queue client

use jobqueue_core::ValidationError;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when building, loading or sending jobs
#[derive(Debug, Error)]
pub enum ClientError {
    /// Job data failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Storage token is invalid or expired
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token is valid but not allowed to do this
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Remote collaborator failed while resolving `context`
    #[error("{context}: {source}")]
    Dependency {
        context: String,
        #[source]
        source: Box<ClientError>,
    },

    /// Project or id refers to a data plane that does not exist
    #[error("Data plane not found: {0}")]
    DataPlaneNotFound(String),

    /// Encryption cannot be set up for this deployment or job
    #[error("Encryption configuration error: {0}")]
    EncryptionConfig(String),

    /// Underlying encryption capability failed
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Job cannot be matched against its orchestration
    #[error("Orchestration job \"{job_id}\": {reason}")]
    Orchestration { job_id: String, reason: String },

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Client configuration is unusable
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    pub fn orchestration(job_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Orchestration {
            job_id: job_id.into(),
            reason: reason.into(),
        }
    }

    /// Add context to a collaborator failure
    ///
    /// Errors the caller is expected to act on (validation, token,
    /// permission, encryption setup, missing data plane) pass through as is.
    pub fn context(self, context: impl Into<String>) -> Self {
        match self {
            Self::Validation(_)
            | Self::InvalidToken(_)
            | Self::PermissionDenied(_)
            | Self::DataPlaneNotFound(_)
            | Self::EncryptionConfig(_) => self,
            other => Self::Dependency {
                context: context.into(),
                source: Box::new(other),
            },
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) | Self::DataPlaneNotFound(_) | Self::ApiError { status: 404, .. } => true,
            Self::Dependency { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::ApiError { status, .. } => (400..500).contains(status),
            Self::Dependency { source, .. } => source.is_client_error(),
            _ => false,
        }
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        match self {
            Self::ApiError { status, .. } => *status >= 500,
            Self::Dependency { source, .. } => source.is_server_error(),
            _ => false,
        }
    }

    /// Check if the token was rejected or lacks permissions
    pub fn is_permission_error(&self) -> bool {
        matches!(self, Self::InvalidToken(_) | Self::PermissionDenied(_))
    }
}

/// Extension for attaching context to collaborator results
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.context(f()))
    }
}

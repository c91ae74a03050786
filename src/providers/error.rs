//! Error types for the project-metadata API client.

use thiserror::Error;

/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors raised while talking to the project-metadata API.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Authentication failed or the token lacks access.
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded, retry after {retry_after_secs} seconds")]
    RateLimitExceeded {
        /// Seconds until rate limit resets.
        retry_after_secs: u64,
    },

    /// Resource not found (project, pipeline, commit).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Project could not be resolved by its path.
    #[error("Project not found: {path}")]
    ProjectNotFound {
        /// Full project path, e.g. `group/project`.
        path: String,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Error message from API.
        message: String,
    },

    /// URL parsing failed.
    #[error("URL parsing failed: {0}")]
    UrlParseError(#[from] url::ParseError),
}

impl ProviderError {
    /// Create a project not found error.
    #[must_use]
    pub fn project_not_found(path: impl Into<String>) -> Self {
        Self::ProjectNotFound { path: path.into() }
    }

    /// Create a rate limited error.
    #[must_use]
    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self::RateLimitExceeded { retry_after_secs }
    }
}

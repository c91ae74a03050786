//! Error types for artifact host access.

use thiserror::Error;

/// Result type alias for artifact operations.
pub type Result<T> = std::result::Result<T, ArtifactError>;

/// Errors raised while reading the static artifact host.
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Host answered with a non-success status other than 404.
    #[error("unexpected status {status} for {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// Descriptor document is not valid TOML for its type.
    #[error("descriptor parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Descriptor carried a timestamp we cannot read.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

//! Error types for buildboard

use thiserror::Error;

/// Result type alias for crate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Error, Debug)]
pub enum Error {
    /// Project-metadata API error
    #[error("provider error: {0}")]
    Provider(#[from] crate::providers::ProviderError),

    /// Artifact host error
    #[error("artifact error: {0}")]
    Artifact(#[from] crate::artifacts::ArtifactError),

    /// A refresh produced no usable data
    #[error("refresh failed: {0}")]
    RefreshFailed(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Create a refresh failure error
    #[must_use]
    pub fn refresh_failed(reason: impl Into<String>) -> Self {
        Self::RefreshFailed(reason.into())
    }
}

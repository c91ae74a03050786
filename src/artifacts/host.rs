//! Static artifact host client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::error::{ArtifactError, Result};

/// Read-only access to the static file server publishing artifacts.
#[async_trait]
pub trait ArtifactHost: Send + Sync {
    /// Fetch a document as text. `Ok(None)` means the host has no such file.
    async fn fetch_text(&self, url: &str) -> Result<Option<String>>;
}

/// [`ArtifactHost`] over plain HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpArtifactHost {
    client: Client,
}

impl HttpArtifactHost {
    /// Create a host client with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArtifactHost for HttpArtifactHost {
    async fn fetch_text(&self, url: &str) -> Result<Option<String>> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.text().await?)),
            status => Err(ArtifactError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}

/// Join a directory URL and a relative name with exactly one slash.
pub fn join_url(base: &str, name: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        name.trim_start_matches('/')
    )
}

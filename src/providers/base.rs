//! Shared HTTP plumbing for the project-metadata API client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::error::{ProviderError, Result};

/// Authentication type for the project-metadata API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// Personal or project access token, sent as `PRIVATE-TOKEN`.
    Token,
    /// OAuth access token, sent as `Authorization: Bearer`.
    OAuth,
}

/// Authentication credentials for the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAuth {
    /// How the token is presented.
    pub auth_type: AuthType,
    /// The secret itself.
    pub token: String,
}

impl ProviderAuth {
    /// Create a personal access token authentication.
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            auth_type: AuthType::Token,
            token: token.into(),
        }
    }

    /// Create an OAuth bearer authentication.
    pub fn oauth(token: impl Into<String>) -> Self {
        Self {
            auth_type: AuthType::OAuth,
            token: token.into(),
        }
    }

    /// Insert the matching header into `headers`.
    pub fn apply(&self, headers: &mut HeaderMap) {
        match self.auth_type {
            AuthType::Token => {
                if let Ok(value) = HeaderValue::from_str(&self.token) {
                    headers.insert("PRIVATE-TOKEN", value);
                }
            }
            AuthType::OAuth => {
                if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.token)) {
                    headers.insert(AUTHORIZATION, value);
                }
            }
        }
    }
}

/// Fixed-window rate limiter for API requests.
///
/// A refresh fans out several requests per tracked repository at once; the
/// limiter keeps that burst inside the API quota by parking callers until the
/// current window rolls over.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

#[derive(Debug)]
struct WindowState {
    started: Instant,
    used: u32,
}

impl RateLimiter {
    /// Create a new rate limiter.
    pub fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window: Duration::from_secs(window_seconds),
            state: Mutex::new(WindowState {
                started: Instant::now(),
                used: 0,
            }),
        }
    }

    /// Take one request slot, waiting for the next window when exhausted.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let elapsed = state.started.elapsed();
                if elapsed >= self.window {
                    state.started = Instant::now();
                    state.used = 0;
                }
                if state.used < self.max_requests {
                    state.used += 1;
                    return;
                }
                self.window.saturating_sub(elapsed)
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Requests left in the current window.
    pub async fn remaining(&self) -> u32 {
        let state = self.state.lock().await;
        if state.started.elapsed() >= self.window {
            self.max_requests
        } else {
            self.max_requests - state.used
        }
    }
}

/// Project identity as resolved from its path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// Numeric project id assigned by the API.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Browser URL of the project.
    pub url: String,
}

/// CI pipeline state, normalized across the API's status vocabulary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Finished successfully.
    Success,
    /// Finished with a failure.
    Failed,
    /// Currently executing.
    Running,
    /// Queued or waiting on resources.
    Pending,
    /// Cancelled before finishing.
    Canceled,
    /// No pipeline found, or a status we do not track.
    #[default]
    Unknown,
}

impl PipelineState {
    /// Map an API status string onto a state.
    pub fn from_api(status: &str) -> Self {
        match status {
            "success" => Self::Success,
            "failed" => Self::Failed,
            "running" => Self::Running,
            "pending" | "created" | "preparing" | "waiting_for_resource" | "scheduled" => {
                Self::Pending
            }
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::Unknown,
        }
    }

    /// Lowercase label used in output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Running => "running",
            Self::Pending => "pending",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Most recent pipeline run for a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineInfo {
    /// Normalized state.
    pub state: PipelineState,
    /// Browser URL of the run.
    pub url: Option<String>,
}

/// Most recent commit on a project's default branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Full commit hash.
    pub hash: String,
    /// First line of the commit message.
    pub message: String,
    /// Author display name.
    pub author: String,
    /// Commit creation time.
    pub timestamp: DateTime<Utc>,
}

impl CommitInfo {
    /// Hash truncated to the display width used for matching.
    pub fn short_hash(&self) -> &str {
        short_hash(&self.hash)
    }
}

/// Characters of a commit hash shown and compared.
pub const SHORT_HASH_LEN: usize = 7;

/// Truncate a hash to [`SHORT_HASH_LEN`] characters.
pub fn short_hash(hash: &str) -> &str {
    match hash.char_indices().nth(SHORT_HASH_LEN) {
        Some((idx, _)) => &hash[..idx],
        None => hash,
    }
}

/// Read access to the project-metadata API.
#[async_trait]
pub trait ProjectApi: Send + Sync {
    /// Get the provider name.
    fn provider_name(&self) -> &'static str;

    /// Resolve a project by its full path (`group/project`).
    async fn get_project(&self, path: &str) -> Result<ProjectInfo>;

    /// Most recent pipeline on `branch`, if any ran.
    async fn latest_pipeline(&self, project_id: u64, branch: &str) -> Result<Option<PipelineInfo>>;

    /// Most recent commit on the default branch, if the repository has any.
    async fn latest_commit(&self, project_id: u64) -> Result<Option<CommitInfo>>;
}

/// Configuration for the API client.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL for the API.
    pub base_url: String,
    /// Authentication credentials.
    pub auth: Option<ProviderAuth>,
    /// Maximum requests per rate limit window.
    pub rate_limit_requests: u32,
    /// Rate limit window in seconds.
    pub rate_limit_window: u64,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth: None,
            rate_limit_requests: 600,
            rate_limit_window: 60,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Pooled client, base URL and rate limiter shared by API calls.
#[derive(Debug)]
pub struct BaseProvider {
    /// HTTP client with connection pooling.
    pub client: Client,
    /// Base URL for the API, without trailing slash.
    pub base_url: String,
    /// Authentication credentials.
    pub auth: Option<ProviderAuth>,
    /// Rate limiter.
    pub rate_limiter: RateLimiter,
}

impl BaseProvider {
    /// Create a new base provider.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(ProviderError::ConfigurationError(
                "missing base_url".to_string(),
            ));
        }
        url::Url::parse(&config.base_url)?;

        let client = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(ProviderError::HttpError)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth: config.auth,
            rate_limiter: RateLimiter::new(config.rate_limit_requests, config.rate_limit_window),
        })
    }

    /// Issue a rate-limited GET against `path` with query parameters.
    pub async fn get(
        &self,
        path: &str,
        headers: HeaderMap,
        params: &[(&str, &str)],
    ) -> Result<reqwest::Response> {
        self.rate_limiter.acquire().await;

        let url = format!("{}{}", self.base_url, path);
        debug!(
            "GET {} ({} requests left in window)",
            url,
            self.rate_limiter.remaining().await
        );
        let response = self
            .client
            .get(&url)
            .headers(headers)
            .query(params)
            .send()
            .await?;
        Self::check_response(response).await
    }

    /// Make a GET request and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        headers: HeaderMap,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let body = self.get(path, headers, params).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Check response status and return error if not successful.
    pub async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(response.url().path().to_string()));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::AuthenticationError(
                "Authentication failed".to_string(),
            ));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(ProviderError::rate_limited(retry_after));
        }

        let message = response.text().await.unwrap_or_default();
        Err(ProviderError::ApiError {
            status: status.as_u16(),
            message,
        })
    }
}

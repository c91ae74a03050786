//! Configuration management

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::directory::{ProjectDirectory, TrackedRepository};
use crate::providers::GitLabApi;

/// Project-metadata API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API base URL
    pub base_url: String,
    /// Access token for higher rate limits and private projects
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Maximum requests per rate limit window
    pub rate_limit_requests: u32,
    /// Rate limit window in seconds
    pub rate_limit_window_secs: u64,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: GitLabApi::DEFAULT_BASE_URL.to_string(),
            token: None,
            rate_limit_requests: 600,
            rate_limit_window_secs: 60,
            timeout_secs: 30,
        }
    }
}

/// Static artifact host settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Listing of per-platform package directories
    pub package_base_url: String,
    /// Listing of per-platform image directories
    pub image_base_url: String,
    /// Platform tokens, matched as listing name prefixes
    pub platforms: Vec<String>,
    /// Hours before an unmatched package counts as outdated
    pub staleness_hours: i64,
    /// Concurrent descriptor downloads per platform
    pub max_concurrent_fetches: usize,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            package_base_url: "https://static.redox-os.org/pkg/".to_string(),
            image_base_url: "https://static.redox-os.org/img/".to_string(),
            platforms: vec![
                "x86_64".to_string(),
                "i686".to_string(),
                "aarch64".to_string(),
            ],
            staleness_hours: 24,
            max_concurrent_fetches: 8,
            timeout_secs: 30,
        }
    }
}

/// Snapshot cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Seconds a snapshot is served before refreshing
    pub ttl_secs: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Debug mode
    pub debug: bool,
    /// Log level
    pub log_level: String,
    /// Metadata API
    pub api: ApiConfig,
    /// Artifact host
    pub artifacts: ArtifactConfig,
    /// Snapshot cache
    pub cache: CacheConfig,
    /// Tracked repositories, in display order
    pub repositories: Vec<TrackedRepository>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "info".to_string(),
            api: ApiConfig::default(),
            artifacts: ArtifactConfig::default(),
            cache: CacheConfig::default(),
            repositories: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from environment variables
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("BUILDBOARD_DEBUG") {
            self.debug = val == "1" || val.to_lowercase() == "true";
        }

        if let Ok(val) = std::env::var("BUILDBOARD_LOG_LEVEL") {
            self.log_level = val;
        }

        if let Ok(val) = std::env::var("BUILDBOARD_API_URL") {
            self.api.base_url = val;
        }

        if let Ok(val) = std::env::var("BUILDBOARD_API_TOKEN") {
            self.api.token = Some(val);
        } else if let Ok(val) = std::env::var("GITLAB_TOKEN") {
            self.api.token = Some(val);
        }

        if let Ok(val) = std::env::var("BUILDBOARD_PACKAGE_URL") {
            self.artifacts.package_base_url = val;
        }

        if let Ok(val) = std::env::var("BUILDBOARD_IMAGE_URL") {
            self.artifacts.image_base_url = val;
        }

        if let Ok(val) = std::env::var("BUILDBOARD_PLATFORMS") {
            self.artifacts.platforms = parse_list(&val);
        }

        if let Some(hours) = env_parse("BUILDBOARD_STALENESS_HOURS") {
            self.artifacts.staleness_hours = hours;
        }

        if let Some(secs) = env_parse("BUILDBOARD_CACHE_TTL_SECS") {
            self.cache.ttl_secs = secs;
        }
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Ok(serde_yaml::from_str(&content)?),
            Some("toml") => Ok(toml::from_str(&content)?),
            _ => Ok(serde_json::from_str(&content)?),
        }
    }

    /// Check settings that would make every refresh fail or misbehave
    pub fn validate(&self) -> crate::Result<()> {
        if self.artifacts.platforms.is_empty() {
            return Err(config_error("no platforms configured"));
        }
        if self.artifacts.staleness_hours <= 0 {
            return Err(config_error("staleness_hours must be positive"));
        }
        if self.cache.ttl_secs <= 0 {
            return Err(config_error("ttl_secs must be positive"));
        }
        if self.artifacts.max_concurrent_fetches == 0 {
            return Err(config_error("max_concurrent_fetches must be at least 1"));
        }

        let mut seen = HashSet::new();
        for repo in &self.repositories {
            if repo.path.trim().is_empty() {
                return Err(config_error("repository with empty path"));
            }
            if repo.branch.trim().is_empty() {
                return Err(config_error(format!("{}: empty branch", repo.path)));
            }
            if !seen.insert(repo.path.as_str()) {
                return Err(config_error(format!("duplicate repository: {}", repo.path)));
            }
        }

        Ok(())
    }

    /// The tracked repositories as an immutable directory
    pub fn directory(&self) -> ProjectDirectory {
        ProjectDirectory::new(self.repositories.clone())
    }
}

fn config_error(message: impl Into<String>) -> crate::Error {
    crate::Error::Config(message.into())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

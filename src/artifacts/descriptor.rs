//! Package and repository descriptors published next to artifacts.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Deserializer, Serialize, de};
use tracing::{debug, warn};

use super::error::{ArtifactError, Result};
use super::host::{ArtifactHost, join_url};

/// Build metadata embedded in a published package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    /// Commit of the package's upstream source.
    #[serde(alias = "source_identifier")]
    pub source_commit_hash: String,
    /// Commit of the recipe tree the package was built from.
    #[serde(alias = "commit_identifier")]
    pub built_commit_hash: String,
    /// When the package was published.
    #[serde(alias = "time_identifier", deserialize_with = "deserialize_timestamp")]
    pub published_at: DateTime<Utc>,
    /// Package name, when recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Package version, when recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Target triple, when recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Runtime dependencies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
}

impl PackageDescriptor {
    /// Parse a package descriptor document.
    pub fn from_toml(document: &str) -> Result<Self> {
        Ok(toml::from_str(document)?)
    }
}

/// Server-side classification of a platform's package set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    /// Up-to-date packages and their version marker.
    #[serde(default, alias = "packages")]
    pub synced_packages: BTreeMap<String, String>,
    /// Packages the server knows to be behind.
    #[serde(default)]
    pub outdated_packages: BTreeMap<String, PackageDescriptor>,
}

impl RepositoryDescriptor {
    /// Parse a repository descriptor document. Missing tables default to empty.
    pub fn from_toml(document: &str) -> Result<Self> {
        Ok(toml::from_str(document)?)
    }

    /// Whether the server lists `name` as outdated.
    pub fn is_outdated(&self, name: &str) -> bool {
        self.outdated_packages.contains_key(name)
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = match toml::Value::deserialize(deserializer)? {
        toml::Value::String(s) => s,
        toml::Value::Datetime(dt) => dt.to_string(),
        other => {
            return Err(de::Error::custom(format!(
                "expected a timestamp, found {}",
                other.type_str()
            )));
        }
    };
    parse_timestamp(&text).map_err(de::Error::custom)
}

/// Parse an RFC 3339 timestamp, or a zone-less one taken as UTC.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ArtifactError::InvalidTimestamp(text.to_string()))
}

/// Outcome of looking up one package descriptor.
///
/// Keeps "not published yet" apart from "could not be read", although both
/// reconcile the same way today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DescriptorLookup {
    /// Descriptor fetched and parsed.
    Found {
        /// The parsed descriptor.
        descriptor: PackageDescriptor,
    },
    /// The host has no descriptor for this package.
    Missing,
    /// Fetching or parsing failed.
    Failed {
        /// Failure reason.
        reason: String,
    },
}

impl DescriptorLookup {
    /// The descriptor, when one was found.
    pub fn descriptor(&self) -> Option<&PackageDescriptor> {
        match self {
            Self::Found { descriptor } => Some(descriptor),
            Self::Missing | Self::Failed { .. } => None,
        }
    }
}

impl From<Result<Option<PackageDescriptor>>> for DescriptorLookup {
    fn from(result: Result<Option<PackageDescriptor>>) -> Self {
        match result {
            Ok(Some(descriptor)) => Self::Found { descriptor },
            Ok(None) => Self::Missing,
            Err(e) => Self::Failed {
                reason: e.to_string(),
            },
        }
    }
}

/// Downloads descriptors for one platform's package directory.
#[derive(Clone)]
pub struct DescriptorFetcher {
    host: Arc<dyn ArtifactHost>,
    max_concurrent: usize,
}

impl DescriptorFetcher {
    /// Name of the repository-level descriptor.
    pub const REPOSITORY_FILE: &'static str = "repo.toml";

    /// Create a fetcher issuing at most `max_concurrent` requests at once.
    pub fn new(host: Arc<dyn ArtifactHost>, max_concurrent: usize) -> Self {
        Self {
            host,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// URL of a package descriptor.
    pub fn package_url(platform_url: &str, package: &str) -> String {
        join_url(platform_url, &format!("{package}.toml"))
    }

    /// URL of the repository descriptor.
    pub fn repository_url(platform_url: &str) -> String {
        join_url(platform_url, Self::REPOSITORY_FILE)
    }

    /// Fetch the repository descriptor. A missing file yields an empty one.
    pub async fn fetch_repository(&self, platform_url: &str) -> Result<RepositoryDescriptor> {
        let url = Self::repository_url(platform_url);
        match self.host.fetch_text(&url).await? {
            Some(document) => RepositoryDescriptor::from_toml(&document),
            None => {
                debug!("No repository descriptor at {}", url);
                Ok(RepositoryDescriptor::default())
            }
        }
    }

    /// Fetch one package descriptor. Never fails; see [`DescriptorLookup`].
    pub async fn fetch_package(&self, platform_url: &str, package: &str) -> DescriptorLookup {
        let url = Self::package_url(platform_url, package);
        let result = match self.host.fetch_text(&url).await {
            Ok(Some(document)) => PackageDescriptor::from_toml(&document).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            warn!("Descriptor for {} unavailable: {}", package, e);
        }
        result.into()
    }

    /// Fetch many package descriptors with bounded concurrency, keeping order.
    pub async fn fetch_packages<I, S>(
        &self,
        platform_url: &str,
        packages: I,
    ) -> Vec<(String, DescriptorLookup)>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let packages: Vec<String> = packages.into_iter().map(Into::into).collect();
        stream::iter(packages)
            .map(|package: String| async move {
                let lookup = self.fetch_package(platform_url, &package).await;
                (package, lookup)
            })
            .buffered(self.max_concurrent)
            .collect()
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;

    pub(crate) const PACKAGE_TOML: &str = r#"
name = "kernel"
version = "0.5.12"
target = "x86_64-unknown-redox"
blake3 = "4c0f5e1b"
source_identifier = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b"
commit_identifier = "abcdef1234567890abcdef1234567890abcdef12"
time_identifier = "2024-03-01T10:00:00Z"
depends = ["relibc"]
"#;

    /// In-memory host keyed by URL; URLs listed in `broken` fail.
    #[derive(Default)]
    pub(crate) struct FakeHost {
        pub files: HashMap<String, String>,
        pub broken: Vec<String>,
        pub requests: AtomicUsize,
    }

    impl FakeHost {
        pub fn with_file(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
            self.files.insert(url.into(), body.into());
            self
        }

        pub fn with_broken(mut self, url: impl Into<String>) -> Self {
            self.broken.push(url.into());
            self
        }
    }

    #[async_trait]
    impl ArtifactHost for FakeHost {
        async fn fetch_text(&self, url: &str) -> Result<Option<String>> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if self.broken.iter().any(|b| b == url) {
                return Err(ArtifactError::Status {
                    url: url.to_string(),
                    status: 500,
                });
            }
            Ok(self.files.get(url).cloned())
        }
    }

    #[test]
    fn test_parse_package_descriptor() {
        let descriptor = PackageDescriptor::from_toml(PACKAGE_TOML).unwrap();

        assert_eq!(
            descriptor.built_commit_hash,
            "abcdef1234567890abcdef1234567890abcdef12"
        );
        assert_eq!(
            descriptor.source_commit_hash,
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b"
        );
        assert_eq!(
            descriptor.published_at,
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(descriptor.version.as_deref(), Some("0.5.12"));
        assert_eq!(descriptor.depends, vec!["relibc".to_string()]);
    }

    #[test]
    fn test_parse_native_toml_datetime() {
        let doc = r#"
source_identifier = "a"
commit_identifier = "b"
time_identifier = 2024-03-01T10:00:00+02:00
"#;
        let descriptor = PackageDescriptor::from_toml(doc).unwrap();
        assert_eq!(
            descriptor.published_at,
            Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
        );
        assert!(descriptor.name.is_none());
    }

    #[test]
    fn test_parse_package_descriptor_missing_field() {
        let result = PackageDescriptor::from_toml("source_identifier = \"a\"\n");
        assert!(matches!(result, Err(ArtifactError::Toml(_))));
    }

    #[test]
    fn test_parse_package_descriptor_bad_time() {
        let doc = "source_identifier = \"a\"\ncommit_identifier = \"b\"\ntime_identifier = \"soon\"\n";
        assert!(PackageDescriptor::from_toml(doc).is_err());
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01T10:00:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-01T10:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-01 10:00:00").unwrap(), expected);
        assert!(matches!(
            parse_timestamp("2024-03-01"),
            Err(ArtifactError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_parse_repository_descriptor() {
        let doc = r#"
[packages]
kernel = "0.5.12"
relibc = "0.2.5"

[outdated_packages.drivers]
source_identifier = "1111111aaaa"
commit_identifier = "2222222bbbb"
time_identifier = "2024-02-01T00:00:00Z"
"#;
        let descriptor = RepositoryDescriptor::from_toml(doc).unwrap();

        assert_eq!(descriptor.synced_packages.len(), 2);
        assert_eq!(descriptor.synced_packages["kernel"], "0.5.12");
        assert!(descriptor.is_outdated("drivers"));
        assert!(!descriptor.is_outdated("kernel"));
    }

    #[test]
    fn test_repository_descriptor_tables_default_to_empty() {
        let descriptor = RepositoryDescriptor::from_toml("").unwrap();
        assert!(descriptor.synced_packages.is_empty());
        assert!(descriptor.outdated_packages.is_empty());

        let only_synced = RepositoryDescriptor::from_toml("[packages]\nkernel = \"1\"\n").unwrap();
        assert_eq!(only_synced.synced_packages.len(), 1);
        assert!(only_synced.outdated_packages.is_empty());
    }

    #[test]
    fn test_descriptor_urls() {
        assert_eq!(
            DescriptorFetcher::package_url("https://static.example.com/pkg/x86_64/", "kernel"),
            "https://static.example.com/pkg/x86_64/kernel.toml"
        );
        assert_eq!(
            DescriptorFetcher::repository_url("https://static.example.com/pkg/x86_64"),
            "https://static.example.com/pkg/x86_64/repo.toml"
        );
    }

    #[tokio::test]
    async fn test_fetch_packages_isolates_failures() {
        let base = "https://static.example.com/pkg/x86_64/";
        let host = FakeHost::default()
            .with_file(format!("{base}kernel.toml"), PACKAGE_TOML)
            .with_file(format!("{base}garbage.toml"), "not = [valid")
            .with_broken(format!("{base}drivers.toml"));
        let fetcher = DescriptorFetcher::new(Arc::new(host), 2);

        let results = fetcher
            .fetch_packages(base, ["drivers", "garbage", "kernel", "unpublished"])
            .await;

        let names: Vec<&str> = results.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["drivers", "garbage", "kernel", "unpublished"]);
        assert!(matches!(results[0].1, DescriptorLookup::Failed { .. }));
        assert!(matches!(results[1].1, DescriptorLookup::Failed { .. }));
        assert!(results[2].1.descriptor().is_some());
        assert_eq!(results[3].1, DescriptorLookup::Missing);
    }

    #[tokio::test]
    async fn test_fetch_packages_runs_on_spawned_task() {
        let base = "https://static.example.com/pkg/x86_64/";
        let host = FakeHost::default().with_file(format!("{base}kernel.toml"), PACKAGE_TOML);
        let fetcher = Arc::new(DescriptorFetcher::new(Arc::new(host), 2));
        let names = vec!["kernel".to_string(), "relibc".to_string()];

        let results = tokio::spawn(async move { fetcher.fetch_packages(base, names).await })
            .await
            .unwrap();

        assert!(results[0].1.descriptor().is_some());
        assert_eq!(results[1].1, DescriptorLookup::Missing);
    }

    #[tokio::test]
    async fn test_fetch_repository_missing_is_empty() {
        let fetcher = DescriptorFetcher::new(Arc::new(FakeHost::default()), 4);
        let descriptor = fetcher
            .fetch_repository("https://static.example.com/pkg/x86_64/")
            .await
            .unwrap();
        assert_eq!(descriptor, RepositoryDescriptor::default());
    }

    #[tokio::test]
    async fn test_fetch_repository_error_propagates() {
        let host = FakeHost::default().with_broken("https://static.example.com/pkg/x86_64/repo.toml");
        let fetcher = DescriptorFetcher::new(Arc::new(host), 4);
        assert!(
            fetcher
                .fetch_repository("https://static.example.com/pkg/x86_64/")
                .await
                .is_err()
        );
    }
}

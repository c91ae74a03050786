//! One refresh cycle: fetch everything, reconcile, assemble a [`Snapshot`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

use super::model::{PlatformSnapshot, Snapshot};
use crate::artifacts::{
    ArtifactHost, ArtifactIndexParser, DescriptorFetcher, DescriptorLookup, HttpArtifactHost,
    RepositoryDescriptor,
};
use crate::config::{ArtifactConfig, Config};
use crate::directory::ProjectDirectory;
use crate::providers::{GitLabApi, ProjectApi, ProviderAuth, ProviderConfig};
use crate::reconcile::ReconciliationEngine;
use crate::status::{RepositoryStatus, RepositoryStatusFetcher};
use crate::{Error, Result};

/// Produces complete snapshots on demand.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Run one full refresh cycle.
    async fn build(&self, now: DateTime<Utc>) -> Result<Snapshot>;
}

/// Fetches repository status and artifact metadata and reconciles them.
pub struct SnapshotBuilder {
    directory: ProjectDirectory,
    statuses: RepositoryStatusFetcher,
    host: Arc<dyn ArtifactHost>,
    descriptors: DescriptorFetcher,
    packages: ArtifactIndexParser,
    images: ArtifactIndexParser,
    platforms: Vec<String>,
    engine: ReconciliationEngine,
}

impl SnapshotBuilder {
    /// Create a builder over explicit collaborators.
    pub fn new(
        directory: ProjectDirectory,
        api: Arc<dyn ProjectApi>,
        host: Arc<dyn ArtifactHost>,
        config: &ArtifactConfig,
    ) -> Self {
        Self {
            directory,
            statuses: RepositoryStatusFetcher::new(api),
            descriptors: DescriptorFetcher::new(Arc::clone(&host), config.max_concurrent_fetches),
            host,
            packages: ArtifactIndexParser::new(config.package_base_url.clone()),
            images: ArtifactIndexParser::new(config.image_base_url.clone()),
            platforms: config.platforms.clone(),
            engine: ReconciliationEngine::with_hours(config.staleness_hours),
        }
    }

    /// Create a builder talking to the configured GitLab instance and artifact host.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api = GitLabApi::new(ProviderConfig {
            base_url: config.api.base_url.clone(),
            auth: config.api.token.clone().map(ProviderAuth::token),
            rate_limit_requests: config.api.rate_limit_requests,
            rate_limit_window: config.api.rate_limit_window_secs,
            timeout: Duration::from_secs(config.api.timeout_secs),
        })?;
        let host = HttpArtifactHost::new(Duration::from_secs(config.artifacts.timeout_secs))?;

        Ok(Self::new(
            config.directory(),
            Arc::new(api),
            Arc::new(host),
            &config.artifacts,
        ))
    }

    /// The tracked repositories.
    pub fn directory(&self) -> &ProjectDirectory {
        &self.directory
    }

    /// Download a directory listing. Unreachable listings are logged and yield `None`.
    async fn fetch_listing(&self, parser: &ArtifactIndexParser) -> Option<String> {
        match self.host.fetch_text(parser.base_url()).await {
            Ok(Some(document)) => Some(document),
            Ok(None) => {
                warn!("Listing {} not found", parser.base_url());
                None
            }
            Err(e) => {
                warn!("Listing {} unreachable: {}", parser.base_url(), e);
                None
            }
        }
    }

    async fn build_platform(
        &self,
        platform: &str,
        package_listing: &str,
        image_listing: Option<&str>,
        resolved: &HashMap<&str, Arc<RepositoryStatus>>,
        now: DateTime<Utc>,
    ) -> PlatformSnapshot {
        let package_index = self.packages.find(package_listing, platform);
        let image_index = image_listing.and_then(|doc| self.images.find(doc, platform));

        let owners: Vec<(&str, Arc<RepositoryStatus>)> = self
            .directory
            .repositories()
            .iter()
            .filter_map(|repo| resolved.get(repo.path.as_str()).map(|status| (repo, status)))
            .flat_map(|(repo, status)| {
                repo.packages
                    .iter()
                    .map(move |name| (name.as_str(), Arc::clone(status)))
            })
            .collect();

        let (repository_descriptor, lookups) = match &package_index {
            Some(entry) => {
                let (repository, packages) = tokio::join!(
                    self.descriptors.fetch_repository(&entry.url),
                    self.descriptors
                        .fetch_packages(&entry.url, owners.iter().map(|(name, _)| *name)),
                );
                let repository = repository.unwrap_or_else(|e| {
                    warn!("Repository descriptor for {} unavailable: {}", platform, e);
                    RepositoryDescriptor::default()
                });
                (repository, packages.into_iter().map(|(_, l)| l).collect())
            }
            None => {
                debug!("No package directory for {}", platform);
                (
                    RepositoryDescriptor::default(),
                    vec![DescriptorLookup::Missing; owners.len()],
                )
            }
        };

        let packages = owners
            .into_iter()
            .zip(lookups)
            .map(|((name, repository), lookup)| self.engine.reconcile(name, repository, lookup, now))
            .collect();

        PlatformSnapshot {
            platform: platform.to_string(),
            package_index,
            image_index,
            packages,
            repository_descriptor,
        }
    }
}

#[async_trait]
impl SnapshotSource for SnapshotBuilder {
    async fn build(&self, now: DateTime<Utc>) -> Result<Snapshot> {
        let started = Instant::now();
        info!(
            "Refreshing {} repositories across {} platforms",
            self.directory.len(),
            self.platforms.len()
        );

        let (statuses, package_listing, image_listing) = tokio::join!(
            self.statuses.fetch_all(self.directory.repositories()),
            self.fetch_listing(&self.packages),
            self.fetch_listing(&self.images),
        );

        let repositories: Vec<Arc<RepositoryStatus>> =
            statuses.into_iter().map(Arc::new).collect();
        let resolved: HashMap<&str, Arc<RepositoryStatus>> = repositories
            .iter()
            .map(|status| (status.path.as_str(), Arc::clone(status)))
            .collect();

        let platforms = match package_listing.as_deref() {
            Some(listing) => {
                join_all(self.platforms.iter().map(|platform| {
                    self.build_platform(
                        platform,
                        listing,
                        image_listing.as_deref(),
                        &resolved,
                        now,
                    )
                }))
                .await
            }
            None => Vec::new(),
        };

        let nothing_configured = self.directory.is_empty() && self.platforms.is_empty();
        if repositories.is_empty() && platforms.is_empty() && !nothing_configured {
            return Err(Error::refresh_failed(
                "no repository resolved and no platform produced",
            ));
        }

        info!(
            "Refreshed {} of {} repositories, {} of {} platforms in {:?}",
            repositories.len(),
            self.directory.len(),
            platforms.len(),
            self.platforms.len(),
            started.elapsed()
        );

        Ok(Snapshot {
            repositories,
            platforms,
            captured_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use chrono::{TimeDelta, TimeZone};

    use crate::artifacts::descriptor::tests::{FakeHost, PACKAGE_TOML};
    use crate::artifacts::index::tests::listing;
    use crate::directory::TrackedRepository;
    use crate::reconcile::SyncState;
    use crate::snapshot::SnapshotCache;
    use crate::status::tests::FakeApi;

    const PKG: &str = "https://static.example.com/pkg/";
    const IMG: &str = "https://static.example.com/img/";
    const X86_64: &str = "https://static.example.com/pkg/x86_64-unknown-redox/";

    fn artifact_config() -> ArtifactConfig {
        ArtifactConfig {
            package_base_url: PKG.to_string(),
            image_base_url: IMG.to_string(),
            platforms: vec![
                "x86_64".to_string(),
                "aarch64".to_string(),
                "i686".to_string(),
            ],
            staleness_hours: 24,
            max_concurrent_fetches: 4,
            timeout_secs: 5,
        }
    }

    fn directory() -> ProjectDirectory {
        ProjectDirectory::new(vec![
            TrackedRepository::new("redox-os/kernel", "master").with_packages(["kernel"]),
            TrackedRepository::new("redox-os/gone", "master").with_packages(["ghost"]),
            TrackedRepository::new("redox-os/relibc", "master").with_packages(["relibc"]),
        ])
    }

    fn api() -> FakeApi {
        FakeApi::default()
            .with_project("redox-os/kernel", 1, Some("abcdef1234567890"))
            .with_project("redox-os/relibc", 2, Some("9999999aaaaaaa"))
    }

    fn host() -> FakeHost {
        FakeHost::default()
            .with_file(
                PKG,
                listing(&[
                    ("x86_64-unknown-redox", "2024-03-01 09:00"),
                    ("aarch64-unknown-redox", "2024-02-01 09:00"),
                ]),
            )
            .with_file(IMG, listing(&[("x86_64-unknown-redox", "2024-03-01 08:00")]))
            .with_file(format!("{X86_64}kernel.toml"), PACKAGE_TOML)
            .with_file(format!("{X86_64}relibc.toml"), PACKAGE_TOML)
            .with_file(
                format!("{X86_64}repo.toml"),
                "[packages]\nkernel = \"0.5.12\"\n",
            )
    }

    fn builder(api: FakeApi, host: FakeHost) -> SnapshotBuilder {
        SnapshotBuilder::new(directory(), Arc::new(api), Arc::new(host), &artifact_config())
    }

    fn early() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_build_reconciles_each_platform() {
        let snapshot = builder(api(), host()).build(early()).await.unwrap();

        assert_eq!(snapshot.captured_at, early());
        let paths: Vec<&str> = snapshot.repositories.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["redox-os/kernel", "redox-os/relibc"]);

        let tokens: Vec<&str> = snapshot.platforms.iter().map(|p| p.platform.as_str()).collect();
        assert_eq!(tokens, vec!["x86_64", "aarch64", "i686"]);

        let x86_64 = snapshot.platform("x86_64").unwrap();
        assert_eq!(x86_64.package_index.as_ref().unwrap().url, X86_64);
        assert!(x86_64.image_index.is_some());
        assert_eq!(
            x86_64.repository_descriptor.synced_packages.get("kernel").map(String::as_str),
            Some("0.5.12")
        );
        let names: Vec<&str> = x86_64.packages.iter().map(|p| p.package_name.as_str()).collect();
        assert_eq!(names, vec!["kernel", "relibc"]);
        assert_eq!(x86_64.package("kernel").unwrap().sync_state, SyncState::Synced);
        assert_eq!(x86_64.package("relibc").unwrap().sync_state, SyncState::Pending);
    }

    #[tokio::test]
    async fn test_unpublished_platform_is_outdated() {
        let snapshot = builder(api(), host()).build(early()).await.unwrap();

        let aarch64 = snapshot.platform("aarch64").unwrap();
        assert!(aarch64.package_index.is_some());
        assert!(aarch64.image_index.is_none());
        assert_eq!(aarch64.summary().outdated, 2);
        assert_eq!(aarch64.package("kernel").unwrap().descriptor, DescriptorLookup::Missing);

        let i686 = snapshot.platform("i686").unwrap();
        assert!(i686.package_index.is_none());
        assert_eq!(i686.repository_descriptor, RepositoryDescriptor::default());
        assert!(i686
            .packages
            .iter()
            .all(|p| p.sync_state == SyncState::Outdated && p.built_commit() == "-"));
    }

    #[tokio::test]
    async fn test_stale_mismatch_becomes_outdated() {
        let later = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let snapshot = builder(api(), host()).build(later).await.unwrap();

        let x86_64 = snapshot.platform("x86_64").unwrap();
        assert_eq!(x86_64.package("kernel").unwrap().sync_state, SyncState::Synced);
        assert_eq!(x86_64.package("relibc").unwrap().sync_state, SyncState::Outdated);
    }

    #[tokio::test]
    async fn test_unreachable_package_listing_omits_platforms() {
        let snapshot = builder(api(), host().with_broken(PKG))
            .build(early())
            .await
            .unwrap();

        assert_eq!(snapshot.repositories.len(), 2);
        assert!(snapshot.platforms.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_image_listing_keeps_packages() {
        let snapshot = builder(api(), host().with_broken(IMG))
            .build(early())
            .await
            .unwrap();

        let x86_64 = snapshot.platform("x86_64").unwrap();
        assert!(x86_64.image_index.is_none());
        assert_eq!(x86_64.package("kernel").unwrap().sync_state, SyncState::Synced);
    }

    #[tokio::test]
    async fn test_broken_repository_descriptor_is_empty() {
        let snapshot = builder(api(), host().with_broken(format!("{X86_64}repo.toml")))
            .build(early())
            .await
            .unwrap();

        let x86_64 = snapshot.platform("x86_64").unwrap();
        assert_eq!(x86_64.repository_descriptor, RepositoryDescriptor::default());
        assert_eq!(x86_64.packages.len(), 2);
    }

    #[tokio::test]
    async fn test_nothing_obtained_is_refresh_failure() {
        let result = builder(FakeApi::default(), FakeHost::default().with_broken(PKG))
            .build(early())
            .await;

        assert!(matches!(result, Err(Error::RefreshFailed(_))));
    }

    #[tokio::test]
    async fn test_unresolved_repositories_with_listing_still_succeed() {
        let snapshot = builder(FakeApi::default(), host()).build(early()).await.unwrap();

        assert!(snapshot.repositories.is_empty());
        assert_eq!(snapshot.platforms.len(), 3);
        assert!(snapshot.platforms.iter().all(|p| p.packages.is_empty()));
    }

    #[tokio::test]
    async fn test_no_platforms_and_no_repositories_is_refresh_failure() {
        let config = ArtifactConfig {
            platforms: vec![],
            ..artifact_config()
        };
        let directory = ProjectDirectory::new(vec![
            TrackedRepository::new("redox-os/kernel", "master").with_packages(["kernel"]),
        ]);
        let builder = SnapshotBuilder::new(
            directory,
            Arc::new(FakeApi::default()),
            Arc::new(host()),
            &config,
        );

        let result = builder.build(early()).await;

        assert!(matches!(result, Err(Error::RefreshFailed(_))));
    }

    #[tokio::test]
    async fn test_empty_configuration_builds_empty_snapshot() {
        let config = ArtifactConfig {
            platforms: vec![],
            ..artifact_config()
        };
        let builder = SnapshotBuilder::new(
            ProjectDirectory::new(vec![]),
            Arc::new(FakeApi::default()),
            Arc::new(FakeHost::default()),
            &config,
        );

        let snapshot = builder.build(early()).await.unwrap();

        assert!(snapshot.repositories.is_empty());
        assert!(snapshot.platforms.is_empty());
    }

    #[tokio::test]
    async fn test_build_runs_on_spawned_task() {
        let builder = Arc::new(builder(api(), host()));

        let handle = tokio::spawn({
            let builder = Arc::clone(&builder);
            async move { builder.build(early()).await }
        });

        let snapshot = handle.await.unwrap().unwrap();
        assert_eq!(snapshot.platforms.len(), 3);
    }

    #[tokio::test]
    async fn test_cache_hit_sends_no_requests() {
        let api = Arc::new(api());
        let host = Arc::new(host());
        let builder = SnapshotBuilder::new(
            directory(),
            api.clone(),
            host.clone(),
            &artifact_config(),
        );
        let cache = SnapshotCache::new(Arc::new(builder), TimeDelta::minutes(5));
        let counts = || {
            (
                api.calls.load(Ordering::SeqCst),
                host.requests.load(Ordering::SeqCst),
            )
        };

        cache.get_snapshot(early()).await.unwrap();
        let (calls, requests) = counts();
        assert!(calls > 0);
        assert!(requests > 0);

        cache
            .get_snapshot(early() + TimeDelta::minutes(4))
            .await
            .unwrap();
        assert_eq!(counts(), (calls, requests));

        cache
            .get_snapshot(early() + TimeDelta::minutes(5))
            .await
            .unwrap();
        assert_eq!(counts(), (calls * 2, requests * 2));
    }
}

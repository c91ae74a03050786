//! Snapshot data handed to consumers.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::artifacts::{ArtifactIndexEntry, RepositoryDescriptor};
use crate::reconcile::{PackageReconciliation, SyncState};
use crate::status::RepositoryStatus;

/// Package counts per [`SyncState`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Packages built from the latest commit.
    pub synced: usize,
    /// Packages behind but recently published.
    pub pending: usize,
    /// Packages behind and stale, or unpublished.
    pub outdated: usize,
}

impl SyncSummary {
    /// Total packages counted.
    pub fn total(&self) -> usize {
        self.synced + self.pending + self.outdated
    }
}

/// Artifact state of one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSnapshot {
    /// Platform token, e.g. `x86_64`.
    pub platform: String,
    /// Package directory entry for this platform.
    pub package_index: Option<ArtifactIndexEntry>,
    /// Disk image directory entry for this platform.
    pub image_index: Option<ArtifactIndexEntry>,
    /// Per-package classification, in tracked order.
    pub packages: Vec<PackageReconciliation>,
    /// Server-side package classification.
    pub repository_descriptor: RepositoryDescriptor,
}

impl PlatformSnapshot {
    /// Count packages per state.
    pub fn summary(&self) -> SyncSummary {
        self.packages
            .iter()
            .fold(SyncSummary::default(), |mut acc, p| {
                match p.sync_state {
                    SyncState::Synced => acc.synced += 1,
                    SyncState::Pending => acc.pending += 1,
                    SyncState::Outdated => acc.outdated += 1,
                }
                acc
            })
    }

    /// Find a package by name.
    pub fn package(&self, name: &str) -> Option<&PackageReconciliation> {
        self.packages.iter().find(|p| p.package_name == name)
    }
}

/// Result of one complete refresh cycle. Never mutated once published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Resolved repositories, in tracked order.
    pub repositories: Vec<Arc<RepositoryStatus>>,
    /// Platforms whose package listing was reachable, in configured order.
    pub platforms: Vec<PlatformSnapshot>,
    /// When the refresh ran.
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    /// Time since capture.
    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.captured_at
    }

    /// Find a repository by tracked path.
    pub fn repository(&self, path: &str) -> Option<&RepositoryStatus> {
        self.repositories
            .iter()
            .map(AsRef::as_ref)
            .find(|r| r.path == path)
    }

    /// Find a platform by token.
    pub fn platform(&self, platform: &str) -> Option<&PlatformSnapshot> {
        self.platforms.iter().find(|p| p.platform == platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::artifacts::DescriptorLookup;
    use crate::providers::PipelineState;

    fn repository() -> Arc<RepositoryStatus> {
        Arc::new(RepositoryStatus {
            id: 1,
            path: "redox-os/kernel".to_string(),
            name: "kernel".to_string(),
            url: "https://gitlab.example.com/redox-os/kernel".to_string(),
            pipeline_state: PipelineState::Failed,
            pipeline_url: None,
            latest_commit: None,
        })
    }

    fn package(name: &str, sync_state: SyncState) -> PackageReconciliation {
        PackageReconciliation {
            package_name: name.to_string(),
            repository: repository(),
            descriptor: DescriptorLookup::Missing,
            sync_state,
        }
    }

    #[test]
    fn test_platform_summary() {
        let platform = PlatformSnapshot {
            platform: "x86_64".to_string(),
            package_index: None,
            image_index: None,
            packages: vec![
                package("a", SyncState::Synced),
                package("b", SyncState::Outdated),
                package("c", SyncState::Pending),
                package("d", SyncState::Outdated),
            ],
            repository_descriptor: RepositoryDescriptor::default(),
        };

        let summary = platform.summary();
        assert_eq!(summary.synced, 1);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.outdated, 2);
        assert_eq!(summary.total(), 4);
        assert!(platform.package("c").is_some());
        assert!(platform.package("z").is_none());
    }

    #[test]
    fn test_snapshot_lookups() {
        let captured_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let snapshot = Snapshot {
            repositories: vec![repository()],
            platforms: Vec::new(),
            captured_at,
        };

        assert_eq!(
            snapshot.age(captured_at + TimeDelta::minutes(5)),
            TimeDelta::minutes(5)
        );
        assert_eq!(snapshot.repository("redox-os/kernel").unwrap().id, 1);
        assert!(snapshot.repository("redox-os/other").is_none());
        assert!(snapshot.platform("x86_64").is_none());
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let snapshot = Snapshot {
            repositories: vec![repository()],
            platforms: Vec::new(),
            captured_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["repositories"][0]["pipeline_state"], "failed");
        assert_eq!(json["captured_at"], "2024-01-01T00:00:00Z");
    }
}

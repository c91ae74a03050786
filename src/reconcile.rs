//! Package synchronization classification.
//!
//! A package is compared against the latest commit of the repository it is
//! built from:
//!
//! - **synced**: the package was built from that commit.
//! - **pending**: built from an older commit, but published recently enough
//!   that a rebuild is plausibly still on its way.
//! - **outdated**: behind and not recently published, or never published.
//!
//! Commits are compared on their first
//! [`SHORT_HASH_LEN`](crate::providers::SHORT_HASH_LEN) characters, the
//! same truncation used for display.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::artifacts::{DescriptorLookup, PackageDescriptor};
use crate::providers::short_hash;
use crate::status::RepositoryStatus;

/// Placeholder shown when no commit is known.
pub const NO_COMMIT: &str = "-";

/// How a published package relates to its repository's latest commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Built from the latest commit.
    Synced,
    /// Behind, but published within the staleness window.
    Pending,
    /// Behind and stale, or not published.
    Outdated,
}

impl SyncState {
    /// Lowercase label used in output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::Outdated => "outdated",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one package on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageReconciliation {
    /// Package name.
    pub package_name: String,
    /// Repository the package is built from.
    pub repository: Arc<RepositoryStatus>,
    /// Descriptor lookup outcome.
    pub descriptor: DescriptorLookup,
    /// Resulting state.
    pub sync_state: SyncState,
}

impl PackageReconciliation {
    /// Short hash of the commit the package was built from, or `-`.
    pub fn built_commit(&self) -> &str {
        self.descriptor
            .descriptor()
            .map_or(NO_COMMIT, |d| short_hash(&d.built_commit_hash))
    }

    /// Short hash of the repository's latest commit, or `-`.
    pub fn latest_commit(&self) -> &str {
        self.repository.short_commit()
    }
}

/// Classifies packages against repository commits.
#[derive(Debug, Clone, Copy)]
pub struct ReconciliationEngine {
    staleness: TimeDelta,
}

impl ReconciliationEngine {
    /// Create an engine with the given staleness window.
    pub fn new(staleness: TimeDelta) -> Self {
        Self { staleness }
    }

    /// Create an engine with a staleness window in hours.
    pub fn with_hours(hours: i64) -> Self {
        Self::new(TimeDelta::hours(hours))
    }

    /// The staleness window.
    pub fn staleness(&self) -> TimeDelta {
        self.staleness
    }

    /// Classify a descriptor against the repository's latest commit.
    pub fn classify(
        &self,
        repository: &RepositoryStatus,
        descriptor: Option<&PackageDescriptor>,
        now: DateTime<Utc>,
    ) -> SyncState {
        let Some(descriptor) = descriptor else {
            return SyncState::Outdated;
        };

        if commits_match(&descriptor.built_commit_hash, repository.short_commit()) {
            SyncState::Synced
        } else if now - descriptor.published_at < self.staleness {
            SyncState::Pending
        } else {
            SyncState::Outdated
        }
    }

    /// Build the reconciliation record for one package.
    pub fn reconcile(
        &self,
        package_name: impl Into<String>,
        repository: Arc<RepositoryStatus>,
        descriptor: DescriptorLookup,
        now: DateTime<Utc>,
    ) -> PackageReconciliation {
        let sync_state = self.classify(&repository, descriptor.descriptor(), now);
        PackageReconciliation {
            package_name: package_name.into(),
            repository,
            descriptor,
            sync_state,
        }
    }
}

/// Compare a built hash with a repository's short hash.
///
/// An unknown repository commit never matches.
fn commits_match(built: &str, latest_short: &str) -> bool {
    latest_short != NO_COMMIT && !latest_short.is_empty() && short_hash(built) == latest_short
}

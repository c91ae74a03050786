#![allow(
    clippy::collapsible_if,
    clippy::field_reassign_with_default,
    clippy::uninlined_format_args
)]
//! Buildboard - build health snapshots for tracked repositories
//!
//! This crate provides:
//! - **providers**: project-metadata API client (pipelines, commits) for GitLab
//! - **status**: concurrent per-repository status resolution
//! - **artifacts**: directory-listing parser and package descriptor fetcher
//! - **reconcile**: synced / pending / outdated classification of packages
//! - **snapshot**: the refresh pipeline and a TTL cache in front of it
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use buildboard::prelude::*;
//!
//! # async fn run() -> buildboard::Result<()> {
//! let config = Config::from_env();
//! let cache = SnapshotCache::new(
//!     Arc::new(SnapshotBuilder::from_config(&config)?),
//!     chrono::TimeDelta::seconds(config.cache.ttl_secs),
//! );
//!
//! let snapshot = cache.get().await?;
//! for repo in &snapshot.repositories {
//!     println!("{} {} {}", repo.path, repo.pipeline_state, repo.short_commit());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod artifacts;
pub mod directory;
pub mod providers;
pub mod reconcile;
pub mod snapshot;
pub mod status;

pub mod commands;
pub mod config;
pub mod error;
pub mod output;

// Re-export provider types
pub use providers::{GitLabApi, ProjectApi, ProviderError};

// Re-export artifact types
pub use artifacts::{ArtifactError, ArtifactIndexParser, DescriptorFetcher};

// Re-export core types
pub use directory::{ProjectDirectory, TrackedRepository};
pub use reconcile::{ReconciliationEngine, SyncState};
pub use snapshot::{Snapshot, SnapshotBuilder, SnapshotCache};
pub use status::{RepositoryStatus, RepositoryStatusFetcher};

// Re-export CLI types
pub use config::Config;
pub use error::{Error, Result};

/// Prelude for commonly used types
pub mod prelude {
    pub use crate::artifacts::{
        ArtifactHost, ArtifactIndexEntry, ArtifactIndexParser, DescriptorFetcher,
        DescriptorLookup, PackageDescriptor, RepositoryDescriptor,
    };
    pub use crate::directory::{ProjectDirectory, TrackedRepository};
    pub use crate::providers::prelude::*;
    pub use crate::reconcile::{PackageReconciliation, ReconciliationEngine, SyncState};
    pub use crate::snapshot::{
        CacheState, PlatformSnapshot, Snapshot, SnapshotBuilder, SnapshotCache, SnapshotSource,
    };
    pub use crate::status::{RepositoryStatus, RepositoryStatusFetcher};

    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
}

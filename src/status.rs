//! Repository CI status resolution.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::directory::TrackedRepository;
use crate::providers::{CommitInfo, PipelineState, ProjectApi, Result};

/// Point-in-time CI status of one tracked repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryStatus {
    /// Project id assigned by the metadata API.
    pub id: u64,
    /// Tracked path this status was resolved from.
    pub path: String,
    /// Display name.
    pub name: String,
    /// Browser URL of the project.
    pub url: String,
    /// State of the latest pipeline on the tracked branch.
    pub pipeline_state: PipelineState,
    /// Browser URL of that pipeline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_url: Option<String>,
    /// Latest commit on the default branch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_commit: Option<CommitInfo>,
}

impl RepositoryStatus {
    /// Short hash of the latest commit, or `-` when unknown.
    pub fn short_commit(&self) -> &str {
        self.latest_commit
            .as_ref()
            .map_or("-", CommitInfo::short_hash)
    }
}

/// Resolves [`RepositoryStatus`] values for tracked repositories.
#[derive(Clone)]
pub struct RepositoryStatusFetcher {
    api: Arc<dyn ProjectApi>,
}

impl RepositoryStatusFetcher {
    /// Create a fetcher over the given API.
    pub fn new(api: Arc<dyn ProjectApi>) -> Self {
        Self { api }
    }

    /// Resolve every repository concurrently.
    ///
    /// Output keeps input order. Repositories whose project cannot be
    /// resolved are logged and left out; they never affect their siblings.
    pub async fn fetch_all(&self, repositories: &[TrackedRepository]) -> Vec<RepositoryStatus> {
        let results = join_all(repositories.iter().map(|repo| self.fetch_one(repo))).await;

        repositories
            .iter()
            .zip(results)
            .filter_map(|(repo, result)| match result {
                Ok(status) => Some(status),
                Err(e) => {
                    warn!("Skipping {}: {}", repo.path, e);
                    None
                }
            })
            .collect()
    }

    /// Resolve one repository.
    ///
    /// Only the project lookup is fatal. A failed pipeline or commit lookup
    /// degrades to `unknown` / no commit.
    pub async fn fetch_one(&self, repo: &TrackedRepository) -> Result<RepositoryStatus> {
        let project = self.api.get_project(&repo.path).await?;

        let (pipeline, commit) = tokio::join!(
            self.api.latest_pipeline(project.id, &repo.branch),
            self.api.latest_commit(project.id),
        );

        let pipeline = pipeline.unwrap_or_else(|e| {
            warn!("Pipeline lookup failed for {}: {}", repo.path, e);
            None
        });
        let latest_commit = commit.unwrap_or_else(|e| {
            warn!("Commit lookup failed for {}: {}", repo.path, e);
            None
        });

        let (pipeline_state, pipeline_url) = match pipeline {
            Some(p) => (p.state, p.url),
            None => (PipelineState::Unknown, None),
        };

        debug!(
            "Resolved {} (id={}, pipeline={}, commit={})",
            repo.path,
            project.id,
            pipeline_state,
            latest_commit
                .as_ref()
                .map_or("-", CommitInfo::short_hash)
        );

        Ok(RepositoryStatus {
            id: project.id,
            path: repo.path.clone(),
            name: project.name,
            url: project.url,
            pipeline_state,
            pipeline_url,
            latest_commit,
        })
    }
}

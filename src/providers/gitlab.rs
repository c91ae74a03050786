//! GitLab v4 implementation of the project-metadata API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Deserialize;

use super::base::{
    BaseProvider, CommitInfo, PipelineInfo, PipelineState, ProjectApi, ProjectInfo,
    ProviderAuth, ProviderConfig,
};
use super::error::{ProviderError, Result};

/// GitLab API response for a project.
#[derive(Debug, Deserialize)]
struct GitLabProject {
    id: u64,
    name: String,
    #[serde(alias = "url")]
    web_url: String,
}

/// GitLab API response for a pipeline.
#[derive(Debug, Deserialize)]
struct GitLabPipeline {
    status: String,
    web_url: Option<String>,
}

/// GitLab API response for a commit.
#[derive(Debug, Deserialize)]
struct GitLabCommit {
    id: String,
    title: String,
    author_name: String,
    created_at: DateTime<Utc>,
}

/// GitLab project-metadata client.
#[derive(Debug)]
pub struct GitLabApi {
    base: BaseProvider,
}

impl GitLabApi {
    /// Default GitLab API URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://gitlab.com/api/v4";

    /// Create a new client with the given configuration.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        Ok(Self {
            base: BaseProvider::new(config)?,
        })
    }

    /// Create a client for a self-hosted instance, appending `/api/v4` when missing.
    pub fn with_base_url(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let mut url = base_url.into();
        if !url.trim_end_matches('/').ends_with("/api/v4") {
            url = format!("{}/api/v4", url.trim_end_matches('/'));
        }
        Self::new(ProviderConfig {
            base_url: url,
            auth: token.map(ProviderAuth::token),
            ..Default::default()
        })
    }

    /// Base URL requests are issued against.
    pub fn base_url(&self) -> &str {
        &self.base.base_url
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(auth) = &self.base.auth {
            auth.apply(&mut headers);
        }
        headers
    }

    fn encode_project_path(path: &str) -> String {
        urlencoding::encode(path.trim_matches('/')).into_owned()
    }
}

#[async_trait]
impl ProjectApi for GitLabApi {
    fn provider_name(&self) -> &'static str {
        "gitlab"
    }

    async fn get_project(&self, path: &str) -> Result<ProjectInfo> {
        let api_path = format!("/projects/{}", Self::encode_project_path(path));

        let project: GitLabProject =
            match self.base.get_json(&api_path, self.build_headers(), &[]).await {
                Ok(project) => project,
                Err(ProviderError::NotFound(_)) => {
                    return Err(ProviderError::project_not_found(path));
                }
                Err(e) => return Err(e),
            };

        Ok(ProjectInfo {
            id: project.id,
            name: project.name,
            url: project.web_url,
        })
    }

    async fn latest_pipeline(&self, project_id: u64, branch: &str) -> Result<Option<PipelineInfo>> {
        let path = format!("/projects/{}/pipelines", project_id);
        let params = [("ref", branch), ("per_page", "1")];

        let pipelines: Vec<GitLabPipeline> =
            self.base.get_json(&path, self.build_headers(), &params).await?;

        Ok(pipelines.into_iter().next().map(|p| PipelineInfo {
            state: PipelineState::from_api(&p.status),
            url: p.web_url,
        }))
    }

    async fn latest_commit(&self, project_id: u64) -> Result<Option<CommitInfo>> {
        let path = format!("/projects/{}/repository/commits", project_id);
        let params = [("per_page", "1")];

        let commits: Vec<GitLabCommit> =
            self.base.get_json(&path, self.build_headers(), &params).await?;

        Ok(commits.into_iter().next().map(|c| CommitInfo {
            hash: c.id,
            message: c.title,
            author: c.author_name,
            timestamp: c.created_at,
        }))
    }
}

//! Project-metadata API access.
//!
//! The refresh pipeline only needs three reads per tracked repository: the
//! project identity, its latest pipeline on a branch, and its latest commit.
//! [`ProjectApi`] is the seam; [`GitLabApi`] talks to a GitLab v4 instance.
//!
//! # Usage
//!
//! ```rust,no_run
//! use buildboard::providers::{GitLabApi, ProjectApi};
//!
//! #[tokio::main]
//! async fn main() -> buildboard::providers::Result<()> {
//!     let api = GitLabApi::with_base_url("https://gitlab.redox-os.org", None)?;
//!
//!     let project = api.get_project("redox-os/kernel").await?;
//!     if let Some(commit) = api.latest_commit(project.id).await? {
//!         println!("{} @ {}", project.name, commit.short_hash());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod base;
pub mod error;
pub mod gitlab;

pub use base::{
    AuthType, BaseProvider, CommitInfo, PipelineInfo, PipelineState, ProjectApi, ProjectInfo,
    ProviderAuth, ProviderConfig, RateLimiter, SHORT_HASH_LEN, short_hash,
};
pub use error::{ProviderError, Result};
pub use gitlab::GitLabApi;

/// Prelude for commonly used types.
pub mod prelude {
    pub use super::base::{CommitInfo, PipelineState, ProjectApi, ProjectInfo, ProviderAuth};
    pub use super::error::{ProviderError, Result};
    pub use super::gitlab::GitLabApi;
}

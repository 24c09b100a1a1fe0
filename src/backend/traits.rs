// Backend seam - everything the workflow needs from the RepoFlow API

use async_trait::async_trait;

use super::errors::BackendError;
use super::types::{Artifact, BackendVerdict};

/// The HTTP contract consumed by the workflow, with response schemas already validated.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RepoFlowBackend: Send + Sync {
    /// POST /api/receive-repo
    async fn submit_repo(&self, repo_url: &str) -> Result<BackendVerdict, BackendError>;

    /// GET /api/check-workspaces
    async fn check_workspaces(&self) -> Result<bool, BackendError>;

    /// POST /api/get-workspaces
    async fn get_workspaces(&self) -> Result<Vec<Artifact>, BackendError>;

    /// POST /api/select-workspace
    async fn select_workspace(&self, artifact: &Artifact) -> Result<BackendVerdict, BackendError>;

    /// GET /api/check-rag-ready
    async fn check_rag_ready(&self) -> Result<bool, BackendError>;

    /// POST /api/chat
    async fn chat(&self, query: &str) -> Result<String, BackendError>;
}

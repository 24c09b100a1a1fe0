use std::sync::Arc;
use tracing::{debug, warn};

use super::errors::{FetchError, SelectionError};
use crate::backend::{Artifact, BackendVerdict, RepoFlowBackend};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionReceipt {
    pub artifact: Artifact,
    pub message: Option<String>,
}

/// Workspace listing and selection, plus the probe that says when a listing exists.
#[derive(Clone)]
pub struct ArtifactSelector {
    backend: Arc<dyn RepoFlowBackend>,
}

impl ArtifactSelector {
    pub fn new(backend: Arc<dyn RepoFlowBackend>) -> Self {
        Self { backend }
    }

    /// Probe for the ingestion stage
    pub async fn ingestion_ready(&self) -> Result<bool, FetchError> {
        Ok(self.backend.check_workspaces().await?)
    }

    /// Fetch the current listing. Side-effect free; an empty listing is not an error.
    pub async fn list(&self) -> Result<Vec<Artifact>, FetchError> {
        let artifacts = self.backend.get_workspaces().await.map_err(|err| {
            warn!(error = %err, "Failed to fetch workspaces");
            FetchError(err)
        })?;
        debug!(count = artifacts.len(), "Workspace listing fetched");
        Ok(artifacts)
    }

    /// Ask the backend to index `artifact`. One-shot and mutating.
    pub async fn select(&self, artifact: &Artifact) -> Result<SelectionReceipt, SelectionError> {
        debug!(workspace = %artifact.name, "Selecting workspace");

        match self.backend.select_workspace(artifact).await {
            Ok(BackendVerdict::Accepted { message }) => Ok(SelectionReceipt {
                artifact: artifact.clone(),
                message,
            }),
            Ok(BackendVerdict::Rejected { reason }) => {
                warn!(workspace = %artifact.name, %reason, "Backend rejected workspace selection");
                Err(SelectionError::Rejected(reason))
            }
            Err(err) => {
                warn!(workspace = %artifact.name, error = %err, "Workspace selection failed");
                Err(SelectionError::Unreachable(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, MockRepoFlowBackend};

    #[tokio::test]
    async fn test_empty_listing_is_ok_not_error() {
        let mut backend = MockRepoFlowBackend::new();
        backend.expect_get_workspaces().times(1).returning(|| Ok(vec![]));
        let selector = ArtifactSelector::new(Arc::new(backend));

        assert_eq!(selector.list().await, Ok(vec![]));
    }

    #[tokio::test]
    async fn test_listing_failure_is_fetch_error() {
        let mut backend = MockRepoFlowBackend::new();
        backend.expect_get_workspaces().returning(|| {
            Err(BackendError::Status {
                endpoint: "/api/get-workspaces".to_string(),
                status: 500,
            })
        });
        let selector = ArtifactSelector::new(Arc::new(backend));

        assert!(selector.list().await.is_err());
    }

    #[tokio::test]
    async fn test_listing_preserves_backend_order() {
        let mut backend = MockRepoFlowBackend::new();
        backend.expect_get_workspaces().returning(|| {
            Ok(vec![
                Artifact::new("frontend", "React client"),
                Artifact::new("backend", "FastAPI server"),
            ])
        });
        let selector = ArtifactSelector::new(Arc::new(backend));

        let names: Vec<String> = selector
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["frontend", "backend"]);
    }

    #[tokio::test]
    async fn test_select_sends_artifact_by_value() {
        let mut backend = MockRepoFlowBackend::new();
        backend
            .expect_select_workspace()
            .withf(|artifact| {
                artifact.name == "backend" && artifact.description == "FastAPI server"
            })
            .times(1)
            .returning(|_| {
                Ok(BackendVerdict::Accepted {
                    message: Some("Workspace selected".to_string()),
                })
            });
        let selector = ArtifactSelector::new(Arc::new(backend));

        let receipt = selector
            .select(&Artifact::new("backend", "FastAPI server"))
            .await
            .unwrap();

        assert_eq!(receipt.artifact.name, "backend");
        assert_eq!(receipt.message.as_deref(), Some("Workspace selected"));
    }

    #[tokio::test]
    async fn test_select_error_shape_matches_submission() {
        let mut backend = MockRepoFlowBackend::new();
        backend
            .expect_select_workspace()
            .returning(|_| Err(BackendError::Transport("reset by peer".to_string())));
        let selector = ArtifactSelector::new(Arc::new(backend));

        let err = selector
            .select(&Artifact::new("backend", "FastAPI server"))
            .await
            .unwrap_err();

        assert!(matches!(err, SelectionError::Unreachable(_)));
    }
}

use std::sync::Arc;
use tracing::debug;

use super::errors::{FetchError, SessionError};
use crate::backend::RepoFlowBackend;

/// Terminal readiness check for the query session.
///
/// Polled during `Indexing`; called exactly once when the session view is entered
/// without going through the workflow.
#[derive(Clone)]
pub struct SessionGate {
    backend: Arc<dyn RepoFlowBackend>,
}

impl SessionGate {
    pub fn new(backend: Arc<dyn RepoFlowBackend>) -> Self {
        Self { backend }
    }

    pub async fn check_ready(&self) -> Result<bool, FetchError> {
        let ready = self.backend.check_rag_ready().await?;
        debug!(ready, "Session readiness checked");
        Ok(ready)
    }

    /// Send a query to the session. Callers are responsible for checking the stage.
    pub async fn ask(&self, query: &str) -> Result<String, SessionError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SessionError::EmptyQuery);
        }
        self.backend
            .chat(query)
            .await
            .map_err(SessionError::Unreachable)
    }
}

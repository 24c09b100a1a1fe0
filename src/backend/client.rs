use async_trait::async_trait;
use tracing::debug;

use super::errors::BackendError;
use super::traits::RepoFlowBackend;
use super::types::{
    endpoints, Artifact, BackendVerdict, ChatRequest, ChatResponse, ReadinessResponse,
    ReceiveRepoRequest, ReceiveRepoResponse, SelectWorkspaceResponse,
};
use crate::config::RepoFlowConfig;
use crate::http::RateLimitedHttpClient;

/// `RepoFlowBackend` over HTTP. Every response is checked against its schema before
/// the workflow trusts it.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: RateLimitedHttpClient,
}

impl HttpBackend {
    pub fn new(client: RateLimitedHttpClient) -> Self {
        Self { client }
    }

    /// Build the backend from the `backend` and `rate_limit` config sections
    pub fn from_config(config: &RepoFlowConfig) -> anyhow::Result<Self> {
        let client = RateLimitedHttpClient::new(
            &config.backend.base_url,
            config.rate_limit.quota()?,
            &config.backend.user_agent,
        )?;
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &RateLimitedHttpClient {
        &self.client
    }
}

#[async_trait]
impl RepoFlowBackend for HttpBackend {
    async fn submit_repo(&self, repo_url: &str) -> Result<BackendVerdict, BackendError> {
        let response: ReceiveRepoResponse = self
            .client
            .post_json(endpoints::RECEIVE_REPO, &ReceiveRepoRequest { repo_url })
            .await?;
        response.into_verdict()
    }

    async fn check_workspaces(&self) -> Result<bool, BackendError> {
        let response: ReadinessResponse = self.client.get_json(endpoints::CHECK_WORKSPACES).await?;
        response.into_ready(endpoints::CHECK_WORKSPACES)
    }

    async fn get_workspaces(&self) -> Result<Vec<Artifact>, BackendError> {
        let artifacts: Vec<Artifact> = self.client.post_empty(endpoints::GET_WORKSPACES).await?;
        debug!(count = artifacts.len(), "Fetched workspace listing");
        Ok(artifacts)
    }

    async fn select_workspace(&self, artifact: &Artifact) -> Result<BackendVerdict, BackendError> {
        let response: SelectWorkspaceResponse = self
            .client
            .post_json(endpoints::SELECT_WORKSPACE, artifact)
            .await?;
        response.into_verdict()
    }

    async fn check_rag_ready(&self) -> Result<bool, BackendError> {
        let response: ReadinessResponse = self.client.get_json(endpoints::CHECK_RAG_READY).await?;
        response.into_ready(endpoints::CHECK_RAG_READY)
    }

    async fn chat(&self, query: &str) -> Result<String, BackendError> {
        let response: ChatResponse = self
            .client
            .post_json(endpoints::CHAT, &ChatRequest { query })
            .await?;
        response.into_answer()
    }
}

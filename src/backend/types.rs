use serde::{Deserialize, Serialize};

use super::errors::BackendError;

pub mod endpoints {
    pub const RECEIVE_REPO: &str = "/api/receive-repo";
    pub const CHECK_WORKSPACES: &str = "/api/check-workspaces";
    pub const GET_WORKSPACES: &str = "/api/get-workspaces";
    pub const SELECT_WORKSPACE: &str = "/api/select-workspace";
    pub const CHECK_RAG_READY: &str = "/api/check-rag-ready";
    pub const CHAT: &str = "/api/chat";
}

const INVALID_REPO_REASON: &str =
    "Repository URL is not valid. Please enter a valid GitHub repository URL.";
const SELECTION_REFUSED_REASON: &str = "The backend refused the selected workspace.";

/// A workspace generated by the ingestion job. Identity is the name; selection is by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub description: String,
}

impl Artifact {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Outcome of a one-shot mutating call once the response schema has been validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendVerdict {
    Accepted { message: Option<String> },
    Rejected { reason: String },
}

#[derive(Debug, Serialize)]
pub struct ReceiveRepoRequest<'a> {
    #[serde(rename = "repoUrl")]
    pub repo_url: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub query: &'a str,
}

// Response schemas keep every consumed field optional so that a missing field is
// reported as a malformed response instead of silently defaulting to `false`.

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiveRepoResponse {
    pub err: Option<bool>,
    pub message: Option<String>,
}

impl ReceiveRepoResponse {
    pub fn into_verdict(self) -> Result<BackendVerdict, BackendError> {
        match self.err {
            Some(false) => Ok(BackendVerdict::Accepted {
                message: self.message,
            }),
            Some(true) => Ok(BackendVerdict::Rejected {
                reason: self
                    .message
                    .unwrap_or_else(|| INVALID_REPO_REASON.to_string()),
            }),
            None => Err(BackendError::malformed(
                endpoints::RECEIVE_REPO,
                "missing `err` field",
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadinessResponse {
    #[serde(rename = "isReady")]
    pub is_ready: Option<bool>,
}

impl ReadinessResponse {
    pub fn into_ready(self, endpoint: &str) -> Result<bool, BackendError> {
        self.is_ready
            .ok_or_else(|| BackendError::malformed(endpoint, "missing `isReady` field"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectWorkspaceResponse {
    pub message: Option<String>,
    pub err: Option<bool>,
}

impl SelectWorkspaceResponse {
    pub fn into_verdict(self) -> Result<BackendVerdict, BackendError> {
        let message = self.message.ok_or_else(|| {
            BackendError::malformed(endpoints::SELECT_WORKSPACE, "missing `message` field")
        })?;
        if self.err == Some(true) {
            let reason = if message.trim().is_empty() {
                SELECTION_REFUSED_REASON.to_string()
            } else {
                message
            };
            return Ok(BackendVerdict::Rejected { reason });
        }
        Ok(BackendVerdict::Accepted {
            message: Some(message),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub response: Option<String>,
}

impl ChatResponse {
    pub fn into_answer(self) -> Result<String, BackendError> {
        self.response
            .ok_or_else(|| BackendError::malformed(endpoints::CHAT, "missing `response` field"))
    }
}

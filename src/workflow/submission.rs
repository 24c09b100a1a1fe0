use std::sync::Arc;
use tracing::{debug, warn};

use super::errors::SubmissionError;
use crate::backend::{BackendVerdict, RepoFlowBackend};

/// A repository identifier as typed by the user, plus its trimmed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    raw: String,
    repo_url: String,
}

impl Submission {
    /// Rejects empty and whitespace-only input.
    pub fn parse(raw: &str) -> Result<Self, SubmissionError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SubmissionError::Empty);
        }
        Ok(Self {
            raw: raw.to_string(),
            repo_url: trimmed.to_string(),
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub submission: Submission,
    pub message: Option<String>,
}

/// The one-shot "submit repository" call that starts ingestion.
#[derive(Clone)]
pub struct SubmissionGateway {
    backend: Arc<dyn RepoFlowBackend>,
}

impl SubmissionGateway {
    pub fn new(backend: Arc<dyn RepoFlowBackend>) -> Self {
        Self { backend }
    }

    pub async fn submit(&self, raw: &str) -> Result<SubmissionReceipt, SubmissionError> {
        let submission = Submission::parse(raw)?;

        debug!(repo_url = submission.repo_url(), "Submitting repository");

        match self.backend.submit_repo(submission.repo_url()).await {
            Ok(BackendVerdict::Accepted { message }) => Ok(SubmissionReceipt {
                submission,
                message,
            }),
            Ok(BackendVerdict::Rejected { reason }) => {
                warn!(repo_url = submission.repo_url(), %reason, "Backend rejected repository");
                Err(SubmissionError::Rejected(reason))
            }
            Err(err) => {
                warn!(
                    repo_url = submission.repo_url(),
                    error = %err,
                    "Repository submission failed"
                );
                Err(SubmissionError::Unreachable(err))
            }
        }
    }
}

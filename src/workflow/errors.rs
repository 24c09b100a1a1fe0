use serde::Serialize;
use std::fmt;
use thiserror::Error;

use super::stage::WorkflowStage;
use crate::backend::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// Local input was unusable; no network call was made
    Validation,
    /// The backend answered and explicitly refused
    Rejected,
    /// Transport failure or a response that did not match its schema
    Unreachable,
}

/// Why the workflow entered `Failed`, in a form the presentation layer can show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowFailure {
    pub kind: FailureKind,
    pub reason: String,
}

impl WorkflowFailure {
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for WorkflowFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("Please enter a GitHub repository URL.")]
    Empty,
    #[error("{0}")]
    Rejected(String),
    #[error("Could not reach the RepoFlow backend: {0}")]
    Unreachable(BackendError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("{0}")]
    Rejected(String),
    #[error("Failed to send workspace to the backend: {0}")]
    Unreachable(BackendError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Could not determine backend state: {0}")]
pub struct FetchError(#[from] pub BackendError);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("the session is not active (current stage: {0})")]
    NotActive(WorkflowStage),
    #[error("query must not be empty")]
    EmptyQuery,
    #[error("Could not get a response from the RAG model: {0}")]
    Unreachable(BackendError),
}

impl From<SubmissionError> for WorkflowFailure {
    fn from(err: SubmissionError) -> Self {
        let kind = match err {
            SubmissionError::Empty => FailureKind::Validation,
            SubmissionError::Rejected(_) => FailureKind::Rejected,
            SubmissionError::Unreachable(_) => FailureKind::Unreachable,
        };
        WorkflowFailure::new(kind, err.to_string())
    }
}

impl From<SelectionError> for WorkflowFailure {
    fn from(err: SelectionError) -> Self {
        let kind = match err {
            SelectionError::Rejected(_) => FailureKind::Rejected,
            SelectionError::Unreachable(_) => FailureKind::Unreachable,
        };
        WorkflowFailure::new(kind, err.to_string())
    }
}

impl From<FetchError> for WorkflowFailure {
    fn from(err: FetchError) -> Self {
        WorkflowFailure::new(FailureKind::Unreachable, err.to_string())
    }
}

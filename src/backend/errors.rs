use thiserror::Error;

/// Failures talking to the RepoFlow backend.
///
/// The workflow does not interpret HTTP status codes beyond success/failure, so every
/// variant collapses to "unreachable" once it reaches a stage boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("backend returned HTTP {status} for {endpoint}")]
    Status { endpoint: String, status: u16 },
    #[error("malformed response from {endpoint}: {detail}")]
    MalformedResponse { endpoint: String, detail: String },
}

impl BackendError {
    pub fn malformed(endpoint: &str, detail: impl Into<String>) -> Self {
        BackendError::MalformedResponse {
            endpoint: endpoint.to_string(),
            detail: detail.into(),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            let endpoint = err
                .url()
                .map(|u| u.path().to_string())
                .unwrap_or_default();
            return BackendError::MalformedResponse {
                endpoint,
                detail: err.to_string(),
            };
        }
        BackendError::Transport(err.to_string())
    }
}

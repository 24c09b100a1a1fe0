use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::backend::BackendError;

/// Rate-limited HTTP client for the RepoFlow backend.
///
/// No request timeout is set; a call fails only when the transport reports an error.
#[derive(Debug, Clone)]
pub struct RateLimitedHttpClient {
    http: reqwest::Client,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    base_url: String,
}

impl RateLimitedHttpClient {
    /// Create a client rooted at `base_url`, e.g. `http://127.0.0.1:8000`
    pub fn new(base_url: &str, quota: Quota, user_agent: &str) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get_json<T>(&self, path: &str) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
    {
        let request = self.http.get(self.url(path));
        self.execute(path, request).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.http.post(self.url(path)).json(body);
        self.execute(path, request).await
    }

    /// POST without a request body
    pub async fn post_empty<T>(&self, path: &str) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
    {
        let request = self.http.post(self.url(path));
        self.execute(path, request).await
    }

    async fn execute<T>(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
    {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(50)))
            .await;

        debug!(endpoint = path, "Calling RepoFlow backend");

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            debug!(
                endpoint = path,
                status = status.as_u16(),
                "Backend returned non-success status"
            );
            return Err(BackendError::Status {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }

        // Body read errors are transport failures; only decoding marks the response malformed
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| BackendError::malformed(path, e.to_string()))
    }
}

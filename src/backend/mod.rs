// RepoFlow backend contract: wire schemas, the backend trait and its HTTP implementation

pub mod client;
pub mod errors;
pub mod traits;
pub mod types;

pub use client::HttpBackend;
pub use errors::BackendError;
#[cfg(any(test, feature = "testing"))]
pub use traits::MockRepoFlowBackend;
pub use traits::RepoFlowBackend;
pub use types::{endpoints, Artifact, BackendVerdict};

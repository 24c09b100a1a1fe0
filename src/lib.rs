// RepoFlow client library - repository onboarding workflow for a RAG backend
// This exposes the core components for the CLI and for integration tests

pub mod backend;
pub mod cli;
pub mod config;
pub mod http;
pub mod shutdown;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use backend::{Artifact, BackendError, BackendVerdict, HttpBackend, RepoFlowBackend};
pub use config::{config, init_config, RepoFlowConfig};
pub use http::RateLimitedHttpClient;
pub use shutdown::ShutdownCoordinator;
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry};
pub use workflow::{
    FailureKind, PollerConfig, StagePayload, StageUpdate, StatusPoller, TransitionResult,
    WorkflowController, WorkflowEvent, WorkflowFailure, WorkflowStage,
};

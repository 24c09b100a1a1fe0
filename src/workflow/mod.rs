// Repository onboarding workflow: submit, ingest, select, index, query

pub mod artifacts;
pub mod controller;
pub mod errors;
pub mod poller;
pub mod session;
pub mod stage;
pub mod submission;

#[cfg(test)]
pub mod mocks;

pub use artifacts::{ArtifactSelector, SelectionReceipt};
pub use controller::{StagePayload, StageUpdate, Subscription, WorkflowController};
pub use errors::{
    FailureKind, FetchError, SelectionError, SessionError, SubmissionError, WorkflowFailure,
};
pub use poller::{PollHandle, PollerConfig, StatusPoller};
pub use session::SessionGate;
pub use stage::{
    attempt_transition, next_stage, StageTransitionEngine, StageTransitionRecord,
    TransitionResult, WorkflowEvent, WorkflowStage,
};
pub use submission::{Submission, SubmissionGateway, SubmissionReceipt};

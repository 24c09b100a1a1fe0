// Stage transition table for the onboarding workflow

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

use super::errors::WorkflowFailure;
use crate::backend::Artifact;

const HISTORY_LIMIT: usize = 64;

/// The discrete phases of the workflow. Exactly one is current at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WorkflowStage {
    Idle,
    Submitting,
    Ingesting,
    SelectingArtifact,
    SubmittingSelection,
    Indexing,
    SessionActive,
    Failed,
}

impl WorkflowStage {
    /// Stages that own a readiness poll while they are current
    pub fn is_polling(self) -> bool {
        matches!(self, WorkflowStage::Ingesting | WorkflowStage::Indexing)
    }

    /// Stages waiting on the backend, i.e. where the presentation shows a spinner
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            WorkflowStage::Submitting
                | WorkflowStage::Ingesting
                | WorkflowStage::SubmittingSelection
                | WorkflowStage::Indexing
        )
    }

    pub fn accepts_input(self) -> bool {
        matches!(self, WorkflowStage::Idle | WorkflowStage::SelectingArtifact)
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkflowStage::Idle => "idle",
            WorkflowStage::Submitting => "submitting",
            WorkflowStage::Ingesting => "ingesting",
            WorkflowStage::SelectingArtifact => "selecting-artifact",
            WorkflowStage::SubmittingSelection => "submitting-selection",
            WorkflowStage::Indexing => "indexing",
            WorkflowStage::SessionActive => "session-active",
            WorkflowStage::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Events that drive the workflow.
///
/// `SubmittedOk`, `Ready`, `SelectedOk` and `SessionConfirmed` are raised by the
/// controller itself when a backend call completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    Submit { raw: String },
    SubmittedOk,
    Ready,
    Select { artifact: Artifact },
    SelectedOk,
    SessionConfirmed,
    Fail { failure: WorkflowFailure },
    Retry,
}

impl WorkflowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::Submit { .. } => "submit",
            WorkflowEvent::SubmittedOk => "submitted-ok",
            WorkflowEvent::Ready => "ready",
            WorkflowEvent::Select { .. } => "select",
            WorkflowEvent::SelectedOk => "selected-ok",
            WorkflowEvent::SessionConfirmed => "session-confirmed",
            WorkflowEvent::Fail { .. } => "fail",
            WorkflowEvent::Retry => "retry",
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            WorkflowEvent::SubmittedOk
                | WorkflowEvent::Ready
                | WorkflowEvent::SelectedOk
                | WorkflowEvent::SessionConfirmed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    pub accepted: bool,
    pub next_stage: WorkflowStage,
    pub reason: Option<String>,
}

impl TransitionResult {
    pub fn accepted(next_stage: WorkflowStage) -> Self {
        Self {
            accepted: true,
            next_stage,
            reason: None,
        }
    }

    /// A rejected result reports the unchanged stage as `next_stage`
    pub fn rejected(current: WorkflowStage, reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            next_stage: current,
            reason: Some(reason.into()),
        }
    }
}

/// The transition table. Returns `None` for events that are illegal in `current`.
pub fn next_stage(current: WorkflowStage, event: &WorkflowEvent) -> Option<WorkflowStage> {
    use WorkflowEvent as E;
    use WorkflowStage as S;

    match (current, event) {
        (S::Idle, E::Submit { .. }) => Some(S::Submitting),
        (S::Submitting, E::SubmittedOk) => Some(S::Ingesting),
        (S::Ingesting, E::Ready) => Some(S::SelectingArtifact),
        (S::SelectingArtifact, E::Select { .. }) => Some(S::SubmittingSelection),
        (S::SubmittingSelection, E::SelectedOk) => Some(S::Indexing),
        (S::Indexing, E::Ready) => Some(S::SessionActive),
        (S::Idle, E::SessionConfirmed) => Some(S::SessionActive),
        (S::Failed, E::Retry) => Some(S::Idle),
        (S::Failed, E::Fail { .. }) => None,
        (_, E::Fail { .. }) => Some(S::Failed),
        _ => None,
    }
}

/// Pure form of the engine: what would happen to `current` on `event`
pub fn attempt_transition(current: WorkflowStage, event: &WorkflowEvent) -> TransitionResult {
    match next_stage(current, event) {
        Some(next) => TransitionResult::accepted(next),
        None => TransitionResult::rejected(
            current,
            format!("event `{}` is not valid in stage `{}`", event.name(), current),
        ),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageTransitionRecord {
    pub from: WorkflowStage,
    pub to: WorkflowStage,
    pub event: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// Holds the current stage and applies transitions from the table.
#[derive(Debug)]
pub struct StageTransitionEngine {
    current: WorkflowStage,
    history: Vec<StageTransitionRecord>,
    rejected: u64,
}

impl Default for StageTransitionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTransitionEngine {
    pub fn new() -> Self {
        Self {
            current: WorkflowStage::Idle,
            history: Vec::new(),
            rejected: 0,
        }
    }

    pub fn current(&self) -> WorkflowStage {
        self.current
    }

    /// Apply `event`. Rejected events leave the stage untouched.
    pub fn attempt_transition(&mut self, event: &WorkflowEvent) -> TransitionResult {
        let result = attempt_transition(self.current, event);

        if !result.accepted {
            self.rejected += 1;
            warn!(
                stage = %self.current,
                event = event.name(),
                "Illegal workflow transition ignored"
            );
            return result;
        }

        let record = StageTransitionRecord {
            from: self.current,
            to: result.next_stage,
            event: event.name(),
            timestamp: Utc::now(),
        };

        info!(
            from = %record.from,
            to = %record.to,
            event = record.event,
            "Workflow stage transition"
        );

        if self.history.len() == HISTORY_LIMIT {
            self.history.remove(0);
        }
        self.history.push(record);
        self.current = result.next_stage;
        result
    }

    /// Refuse `event` for a reason the table cannot see (e.g. an unknown artifact).
    /// Counted like any other illegal transition.
    pub fn reject(&mut self, event: &WorkflowEvent, reason: impl Into<String>) -> TransitionResult {
        let result = TransitionResult::rejected(self.current, reason);
        self.rejected += 1;
        warn!(
            stage = %self.current,
            event = event.name(),
            reason = result.reason.as_deref().unwrap_or_default(),
            "Workflow event refused"
        );
        result
    }

    pub fn history(&self) -> &[StageTransitionRecord] {
        &self.history
    }

    /// Number of illegal events seen so far. Non-zero outside tests usually means a race.
    pub fn rejected_transitions(&self) -> u64 {
        self.rejected
    }
}

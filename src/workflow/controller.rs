// Workflow controller - the only object the presentation layer talks to

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, Instrument};

use super::artifacts::ArtifactSelector;
use super::errors::{SessionError, WorkflowFailure};
use super::poller::{PollHandle, PollerConfig, StatusPoller};
use super::session::SessionGate;
use super::stage::{
    next_stage, StageTransitionEngine, StageTransitionRecord, TransitionResult, WorkflowEvent,
    WorkflowStage,
};
use super::submission::{Submission, SubmissionGateway};
use crate::backend::{Artifact, RepoFlowBackend};
use crate::telemetry::{create_workflow_span, generate_correlation_id};

/// Stage-scoped data delivered with every stage notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagePayload {
    None,
    /// The listing for `SelectingArtifact`. May be empty.
    Artifacts(Vec<Artifact>),
    /// Why the workflow is in `Failed`
    Failure(WorkflowFailure),
    /// A direct session entry found the session not ready; the workflow stays in `Idle`
    SessionUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageUpdate {
    pub stage: WorkflowStage,
    pub payload: StagePayload,
}

type Listener = Arc<dyn Fn(&StageUpdate) + Send + Sync>;

/// Detaches a listener registered with [`WorkflowController::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    inner: Weak<ControllerInner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            lock(&inner).listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

struct ControllerState {
    engine: StageTransitionEngine,
    /// Bumped on every accepted transition and on disposal. Async work carries the
    /// epoch it was started in and is discarded once the epoch has moved on.
    epoch: u64,
    submission: Option<Submission>,
    artifacts: Option<Vec<Artifact>>,
    selected: Option<Artifact>,
    failure: Option<WorkflowFailure>,
    poll: Option<PollHandle>,
    session_check_pending: bool,
    correlation_id: Option<String>,
    listeners: Vec<(u64, Listener)>,
    next_listener_id: u64,
    disposed: bool,
}

impl ControllerState {
    fn new() -> Self {
        Self {
            engine: StageTransitionEngine::new(),
            epoch: 0,
            submission: None,
            artifacts: None,
            selected: None,
            failure: None,
            poll: None,
            session_check_pending: false,
            correlation_id: None,
            listeners: Vec::new(),
            next_listener_id: 0,
            disposed: false,
        }
    }

    fn snapshot(&self) -> StageUpdate {
        let stage = self.engine.current();
        let payload = match stage {
            WorkflowStage::SelectingArtifact => {
                StagePayload::Artifacts(self.artifacts.clone().unwrap_or_default())
            }
            WorkflowStage::Failed => match &self.failure {
                Some(failure) => StagePayload::Failure(failure.clone()),
                None => StagePayload::None,
            },
            _ => StagePayload::None,
        };
        StageUpdate { stage, payload }
    }

    fn notify(&self, update: &StageUpdate) {
        for (_, listener) in &self.listeners {
            listener(update);
        }
    }

    fn cancel_poll(&mut self) {
        if let Some(handle) = self.poll.take() {
            handle.cancel();
        }
    }
}

struct ControllerInner {
    state: Mutex<ControllerState>,
    submission: SubmissionGateway,
    selector: ArtifactSelector,
    gate: SessionGate,
    poller: StatusPoller,
    runtime: Handle,
}

fn lock(inner: &ControllerInner) -> MutexGuard<'_, ControllerState> {
    inner.state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives the workflow: owns the stage engine, starts and stops readiness polls as
/// stages change, and publishes a single current-stage signal.
///
/// Must be created inside a Tokio runtime. Background work is spawned on that
/// runtime, so events can afterwards be dispatched from any thread.
///
/// Listeners run while the controller is locked and must not call back into it
/// synchronously. Use [`WorkflowController::updates`] to react to stages with
/// further dispatches.
#[derive(Clone)]
pub struct WorkflowController {
    inner: Arc<ControllerInner>,
}

impl WorkflowController {
    pub fn new(backend: Arc<dyn RepoFlowBackend>, poller: PollerConfig) -> Self {
        Self::from_parts(
            SubmissionGateway::new(Arc::clone(&backend)),
            ArtifactSelector::new(Arc::clone(&backend)),
            SessionGate::new(backend),
            StatusPoller::new(poller),
        )
    }

    pub fn from_parts(
        submission: SubmissionGateway,
        selector: ArtifactSelector,
        gate: SessionGate,
        poller: StatusPoller,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                state: Mutex::new(ControllerState::new()),
                submission,
                selector,
                gate,
                poller,
                runtime: Handle::current(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        lock(&self.inner)
    }

    fn upgrade(weak: &Weak<ControllerInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn stage(&self) -> WorkflowStage {
        self.lock().engine.current()
    }

    /// Current stage with its payload, as a newly attached view would render it
    pub fn snapshot(&self) -> StageUpdate {
        self.lock().snapshot()
    }

    pub fn submission(&self) -> Option<Submission> {
        self.lock().submission.clone()
    }

    pub fn artifacts(&self) -> Option<Vec<Artifact>> {
        self.lock().artifacts.clone()
    }

    pub fn selected_artifact(&self) -> Option<Artifact> {
        self.lock().selected.clone()
    }

    pub fn last_failure(&self) -> Option<WorkflowFailure> {
        self.lock().failure.clone()
    }

    pub fn correlation_id(&self) -> Option<String> {
        self.lock().correlation_id.clone()
    }

    /// Live polls started by this controller; never more than one
    pub fn live_polls(&self) -> usize {
        self.inner.poller.live_handles()
    }

    pub fn rejected_transitions(&self) -> u64 {
        self.lock().engine.rejected_transitions()
    }

    pub fn history(&self) -> Vec<StageTransitionRecord> {
        self.lock().engine.history().to_vec()
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StageUpdate) + Send + Sync + 'static,
    {
        let mut state = self.lock();
        let id = state.next_listener_id;
        state.next_listener_id += 1;
        if !state.disposed {
            state.listeners.push((id, Arc::new(listener)));
        }
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Channel-backed subscription. The receiver closes when the controller is disposed.
    pub fn updates(&self) -> (mpsc::UnboundedReceiver<StageUpdate>, Subscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |update| {
            let _ = tx.send(update.clone());
        });
        (rx, subscription)
    }

    /// Feed an event into the workflow. Backend calls the event starts run in the
    /// background; their outcome arrives through the listeners.
    pub fn dispatch(&self, event: WorkflowEvent) -> TransitionResult {
        let mut state = self.lock();
        let current = state.engine.current();

        if state.disposed {
            debug!(event = event.name(), "Ignoring event on disposed controller");
            return TransitionResult::rejected(current, "controller has been disposed");
        }

        if next_stage(current, &event).is_some() {
            if event.is_internal() {
                let reason = format!("event `{}` is raised by the controller only", event.name());
                return state.engine.reject(&event, reason);
            }
            if let WorkflowEvent::Select { artifact } = &event {
                let listed = state
                    .artifacts
                    .as_ref()
                    .is_some_and(|listing| listing.contains(artifact));
                if !listed {
                    let reason =
                        format!("workspace `{}` is not in the current listing", artifact.name);
                    return state.engine.reject(&event, reason);
                }
            }
        }

        self.transition(&mut state, event)
    }

    /// Enter the session view without having gone through the workflow.
    ///
    /// Only valid from `Idle`. The session gate is asked once: ready moves to
    /// `SessionActive`, not ready leaves the workflow in `Idle` with a
    /// [`StagePayload::SessionUnavailable`] notice.
    pub fn enter_session(&self) -> TransitionResult {
        let mut state = self.lock();
        let current = state.engine.current();

        if state.disposed {
            return TransitionResult::rejected(current, "controller has been disposed");
        }

        match current {
            WorkflowStage::SessionActive => TransitionResult::accepted(current),
            WorkflowStage::Idle if state.session_check_pending => TransitionResult {
                accepted: true,
                next_stage: current,
                reason: Some("session readiness check already in flight".to_string()),
            },
            WorkflowStage::Idle => {
                state.session_check_pending = true;
                self.spawn_session_check(state.epoch);
                TransitionResult {
                    accepted: true,
                    next_stage: current,
                    reason: Some("checking session readiness".to_string()),
                }
            }
            _ => state.engine.reject(
                &WorkflowEvent::SessionConfirmed,
                format!("the session view cannot be entered directly from `{current}`"),
            ),
        }
    }

    /// Send a query while the session is active
    pub async fn ask(&self, query: &str) -> Result<String, SessionError> {
        let stage = self.stage();
        if stage != WorkflowStage::SessionActive {
            return Err(SessionError::NotActive(stage));
        }
        self.inner.gate.ask(query).await
    }

    /// Stop any live poll and detach every listener. Further dispatches are no-ops.
    pub fn dispose(&self) {
        let mut state = self.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.epoch += 1;
        state.cancel_poll();
        state.listeners.clear();
        info!(stage = %state.engine.current(), "Workflow controller disposed");
    }

    /// Apply an event produced by async work started in `epoch`. Stale completions are
    /// dropped before they reach the engine.
    fn complete(&self, epoch: u64, event: WorkflowEvent) -> Option<TransitionResult> {
        let mut state = self.lock();
        if state.disposed || state.epoch != epoch {
            debug!(
                event = event.name(),
                started_in = epoch,
                current = state.epoch,
                "Discarding completion from a superseded stage"
            );
            return None;
        }
        Some(self.transition(&mut state, event))
    }

    fn transition(&self, state: &mut ControllerState, event: WorkflowEvent) -> TransitionResult {
        let from = state.engine.current();
        let result = state.engine.attempt_transition(&event);
        if !result.accepted {
            return result;
        }

        // Whatever owned the poll slot is finished once the stage changes
        state.cancel_poll();
        state.epoch += 1;
        state.session_check_pending = false;
        let epoch = state.epoch;

        if from == WorkflowStage::SelectingArtifact {
            state.artifacts = None;
        }

        match (result.next_stage, event) {
            (WorkflowStage::Submitting, WorkflowEvent::Submit { raw }) => {
                state.correlation_id = Some(generate_correlation_id());
                state.submission = Submission::parse(&raw).ok();
                state.failure = None;
                self.spawn_submit(epoch, raw, state.correlation_id.clone());
            }
            (WorkflowStage::Ingesting, _) => {
                self.start_ingestion_poll(state, epoch);
            }
            (WorkflowStage::SubmittingSelection, WorkflowEvent::Select { artifact }) => {
                state.selected = Some(artifact.clone());
                self.spawn_select(epoch, artifact, state.correlation_id.clone());
            }
            (WorkflowStage::Indexing, _) => {
                self.start_indexing_poll(state, epoch);
            }
            (WorkflowStage::Failed, WorkflowEvent::Fail { failure }) => {
                info!(kind = ?failure.kind, reason = %failure.reason, "Workflow failed");
                state.failure = Some(failure);
                state.submission = None;
                state.artifacts = None;
                state.selected = None;
            }
            (WorkflowStage::Idle, _) => {
                state.submission = None;
                state.artifacts = None;
                state.selected = None;
                state.failure = None;
                state.correlation_id = None;
            }
            _ => {}
        }

        let update = state.snapshot();
        state.notify(&update);
        result
    }

    fn spawn_submit(&self, epoch: u64, raw: String, correlation_id: Option<String>) {
        let weak = Arc::downgrade(&self.inner);
        let gateway = self.inner.submission.clone();
        let span = create_workflow_span("submit", correlation_id.as_deref());

        self.inner.runtime.spawn(
            async move {
                let event = match gateway.submit(&raw).await {
                    Ok(receipt) => {
                        info!(
                            repo_url = receipt.submission.repo_url(),
                            backend_message = receipt.message.as_deref().unwrap_or_default(),
                            "Repository accepted"
                        );
                        WorkflowEvent::SubmittedOk
                    }
                    Err(err) => WorkflowEvent::Fail {
                        failure: err.into(),
                    },
                };
                if let Some(controller) = Self::upgrade(&weak) {
                    controller.complete(epoch, event);
                }
            }
            .instrument(span),
        );
    }

    fn spawn_select(&self, epoch: u64, artifact: Artifact, correlation_id: Option<String>) {
        let weak = Arc::downgrade(&self.inner);
        let selector = self.inner.selector.clone();
        let span = create_workflow_span("select", correlation_id.as_deref());

        self.inner.runtime.spawn(
            async move {
                let event = match selector.select(&artifact).await {
                    Ok(receipt) => {
                        info!(
                            workspace = %receipt.artifact.name,
                            backend_message = receipt.message.as_deref().unwrap_or_default(),
                            "Workspace accepted"
                        );
                        WorkflowEvent::SelectedOk
                    }
                    Err(err) => WorkflowEvent::Fail {
                        failure: err.into(),
                    },
                };
                if let Some(controller) = Self::upgrade(&weak) {
                    controller.complete(epoch, event);
                }
            }
            .instrument(span),
        );
    }

    fn spawn_listing(&self, epoch: u64) {
        let weak = Arc::downgrade(&self.inner);
        let selector = self.inner.selector.clone();

        self.inner.runtime.spawn(async move {
            let listing = selector.list().await;
            let Some(controller) = Self::upgrade(&weak) else {
                return;
            };
            match listing {
                Ok(artifacts) => {
                    let mut state = controller.lock();
                    if state.disposed || state.epoch != epoch {
                        debug!(
                            started_in = epoch,
                            "Discarding workspace listing for a superseded stage"
                        );
                        return;
                    }
                    state.artifacts = Some(artifacts);
                    controller.transition(&mut state, WorkflowEvent::Ready);
                }
                Err(err) => {
                    controller.complete(
                        epoch,
                        WorkflowEvent::Fail {
                            failure: err.into(),
                        },
                    );
                }
            }
        });
    }

    fn spawn_session_check(&self, epoch: u64) {
        let weak = Arc::downgrade(&self.inner);
        let gate = self.inner.gate.clone();

        self.inner.runtime.spawn(async move {
            let readiness = gate.check_ready().await;
            let Some(controller) = Self::upgrade(&weak) else {
                return;
            };
            match readiness {
                Ok(true) => {
                    controller.complete(epoch, WorkflowEvent::SessionConfirmed);
                }
                Ok(false) => {
                    let mut state = controller.lock();
                    if state.disposed || state.epoch != epoch {
                        return;
                    }
                    state.session_check_pending = false;
                    info!("Session requested but indexing has not completed");
                    state.notify(&StageUpdate {
                        stage: state.engine.current(),
                        payload: StagePayload::SessionUnavailable,
                    });
                }
                Err(err) => {
                    controller.complete(
                        epoch,
                        WorkflowEvent::Fail {
                            failure: err.into(),
                        },
                    );
                }
            }
        });
    }

    fn start_ingestion_poll(&self, state: &mut ControllerState, epoch: u64) {
        let selector = self.inner.selector.clone();
        let on_ready = Arc::downgrade(&self.inner);
        let on_error = on_ready.clone();

        let handle = self.inner.poller.start(
            move || {
                let selector = selector.clone();
                async move { selector.ingestion_ready().await }
            },
            move || {
                if let Some(controller) = Self::upgrade(&on_ready) {
                    controller.spawn_listing(epoch);
                }
            },
            move |err| {
                if let Some(controller) = Self::upgrade(&on_error) {
                    controller.complete(
                        epoch,
                        WorkflowEvent::Fail {
                            failure: err.into(),
                        },
                    );
                }
            },
        );
        self.install_poll(state, handle);
    }

    fn start_indexing_poll(&self, state: &mut ControllerState, epoch: u64) {
        let gate = self.inner.gate.clone();
        let on_ready = Arc::downgrade(&self.inner);
        let on_error = on_ready.clone();

        let handle = self.inner.poller.start(
            move || {
                let gate = gate.clone();
                async move { gate.check_ready().await }
            },
            move || {
                if let Some(controller) = Self::upgrade(&on_ready) {
                    controller.complete(epoch, WorkflowEvent::Ready);
                }
            },
            move |err| {
                if let Some(controller) = Self::upgrade(&on_error) {
                    controller.complete(
                        epoch,
                        WorkflowEvent::Fail {
                            failure: err.into(),
                        },
                    );
                }
            },
        );
        self.install_poll(state, handle);
    }

    fn install_poll(&self, state: &mut ControllerState, handle: PollHandle) {
        // One slot: the previous occupant is always cancelled before reuse
        state.cancel_poll();
        debug!(poll.id = %handle.id(), stage = %state.engine.current(), "Readiness poll started");
        state.poll = Some(handle);
    }
}

impl std::fmt::Debug for WorkflowController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("WorkflowController")
            .field("stage", &state.engine.current())
            .field("epoch", &state.epoch)
            .field("poll", &state.poll.as_ref().map(PollHandle::id))
            .field("listeners", &state.listeners.len())
            .field("disposed", &state.disposed)
            .finish()
    }
}

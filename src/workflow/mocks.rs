// Scripted backend for controller tests - no network, responses released on demand

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::oneshot;

use crate::backend::{Artifact, BackendError, BackendVerdict, RepoFlowBackend};

/// Every call the workflow made, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    SubmitRepo(String),
    CheckWorkspaces,
    GetWorkspaces,
    SelectWorkspace(Artifact),
    CheckRagReady,
    Chat(String),
}

enum Scripted<T> {
    Now(Result<T, BackendError>),
    Later(oneshot::Receiver<Result<T, BackendError>>),
}

struct Script<T> {
    steps: Mutex<VecDeque<Scripted<T>>>,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T> Script<T> {
    fn push(&self, result: Result<T, BackendError>) {
        self.steps.lock().unwrap().push_back(Scripted::Now(result));
    }

    fn push_later(&self) -> oneshot::Sender<Result<T, BackendError>> {
        let (tx, rx) = oneshot::channel();
        self.steps.lock().unwrap().push_back(Scripted::Later(rx));
        tx
    }

    /// An exhausted script, or a dropped sender, never resolves
    async fn next(&self) -> Result<T, BackendError> {
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Scripted::Now(result)) => result,
            Some(Scripted::Later(rx)) => match rx.await {
                Ok(result) => result,
                Err(_) => std::future::pending().await,
            },
            None => std::future::pending().await,
        }
    }
}

#[derive(Default)]
pub struct ScriptedBackend {
    submit: Script<BackendVerdict>,
    check_workspaces: Script<bool>,
    workspaces: Script<Vec<Artifact>>,
    select: Script<BackendVerdict>,
    rag_ready: Script<bool>,
    chat: Script<String>,
    calls: Mutex<Vec<BackendCall>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept_submit(&self) {
        self.submit.push(Ok(BackendVerdict::Accepted {
            message: Some("Repository cloned".to_string()),
        }));
    }

    pub fn reply_submit(&self, result: Result<BackendVerdict, BackendError>) {
        self.submit.push(result);
    }

    pub fn hold_submit(&self) -> oneshot::Sender<Result<BackendVerdict, BackendError>> {
        self.submit.push_later()
    }

    pub fn ingestion_probes(&self, answers: &[bool]) {
        for ready in answers {
            self.check_workspaces.push(Ok(*ready));
        }
    }

    pub fn fail_ingestion_probe(&self, err: BackendError) {
        self.check_workspaces.push(Err(err));
    }

    pub fn hold_ingestion_probe(&self) -> oneshot::Sender<Result<bool, BackendError>> {
        self.check_workspaces.push_later()
    }

    pub fn listing(&self, result: Result<Vec<Artifact>, BackendError>) {
        self.workspaces.push(result);
    }

    pub fn accept_select(&self) {
        self.select.push(Ok(BackendVerdict::Accepted {
            message: Some("Workspace selected".to_string()),
        }));
    }

    pub fn reply_select(&self, result: Result<BackendVerdict, BackendError>) {
        self.select.push(result);
    }

    pub fn index_probes(&self, answers: &[bool]) {
        for ready in answers {
            self.rag_ready.push(Ok(*ready));
        }
    }

    pub fn fail_index_probe(&self, err: BackendError) {
        self.rag_ready.push(Err(err));
    }

    pub fn hold_index_probe(&self) -> oneshot::Sender<Result<bool, BackendError>> {
        self.rag_ready.push_later()
    }

    pub fn answer(&self, result: Result<String, BackendError>) {
        self.chat.push(result);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RepoFlowBackend for ScriptedBackend {
    async fn submit_repo(&self, repo_url: &str) -> Result<BackendVerdict, BackendError> {
        self.record(BackendCall::SubmitRepo(repo_url.to_string()));
        self.submit.next().await
    }

    async fn check_workspaces(&self) -> Result<bool, BackendError> {
        self.record(BackendCall::CheckWorkspaces);
        self.check_workspaces.next().await
    }

    async fn get_workspaces(&self) -> Result<Vec<Artifact>, BackendError> {
        self.record(BackendCall::GetWorkspaces);
        self.workspaces.next().await
    }

    async fn select_workspace(&self, artifact: &Artifact) -> Result<BackendVerdict, BackendError> {
        self.record(BackendCall::SelectWorkspace(artifact.clone()));
        self.select.next().await
    }

    async fn check_rag_ready(&self) -> Result<bool, BackendError> {
        self.record(BackendCall::CheckRagReady);
        self.rag_ready.next().await
    }

    async fn chat(&self, query: &str) -> Result<String, BackendError> {
        self.record(BackendCall::Chat(query.to_string()));
        self.chat.next().await
    }
}

use anyhow::{bail, Result};

use super::chat::run_session;
use super::{connect_backend, Command, Prompt};
use crate::backend::Artifact;
use crate::config::config;
use crate::shutdown::ShutdownCoordinator;
use crate::workflow::{
    PollerConfig, StagePayload, StageUpdate, WorkflowController, WorkflowEvent, WorkflowStage,
};

pub struct RunCommand {
    pub repo_url: String,
    pub workspace: Option<String>,
    pub no_chat: bool,
}

impl RunCommand {
    pub fn new(repo_url: String) -> Self {
        Self {
            repo_url,
            workspace: None,
            no_chat: false,
        }
    }

    pub fn with_workspace(mut self, workspace: Option<String>) -> Self {
        self.workspace = workspace;
        self
    }

    pub fn with_no_chat(mut self, no_chat: bool) -> Self {
        self.no_chat = no_chat;
        self
    }
}

impl Command for RunCommand {
    async fn execute(&self) -> Result<()> {
        let backend = connect_backend()?;
        let controller = WorkflowController::new(backend, PollerConfig::from(&config()?.polling));
        let (mut updates, _subscription) = controller.updates();
        let signals = ShutdownCoordinator::new(controller.clone()).spawn();
        let mut prompt = Prompt::new()?;

        println!("🚀 Submitting {}", self.repo_url.trim());
        controller.dispatch(WorkflowEvent::Submit {
            raw: self.repo_url.clone(),
        });

        let outcome = self.follow(&controller, &mut updates, &mut prompt).await;

        signals.abort();
        controller.dispose();
        outcome
    }
}

impl RunCommand {
    async fn follow(
        &self,
        controller: &WorkflowController,
        updates: &mut tokio::sync::mpsc::UnboundedReceiver<StageUpdate>,
        prompt: &mut Prompt,
    ) -> Result<()> {
        while let Some(update) = updates.recv().await {
            match (update.stage, update.payload) {
                (WorkflowStage::Submitting, _) => {}
                (WorkflowStage::Ingesting, _) => {
                    println!("📥 Repository accepted, waiting for ingestion to finish...");
                }
                (WorkflowStage::SelectingArtifact, StagePayload::Artifacts(artifacts)) => {
                    if artifacts.is_empty() {
                        println!("📂 Ingestion finished but produced no workspaces");
                        return Ok(());
                    }
                    let Some(artifact) = self.choose(&artifacts, prompt).await? else {
                        println!("👋 No workspace selected");
                        return Ok(());
                    };
                    println!("🎯 Selecting workspace '{}'", artifact.name);
                    controller.dispatch(WorkflowEvent::Select { artifact });
                }
                (WorkflowStage::SubmittingSelection, _) => {}
                (WorkflowStage::Indexing, _) => {
                    println!("🧠 Workspace accepted, waiting for indexing to finish...");
                }
                (WorkflowStage::SessionActive, _) => {
                    println!("✅ Session ready");
                    if self.no_chat {
                        return Ok(());
                    }
                    return run_session(controller, prompt).await;
                }
                (WorkflowStage::Failed, StagePayload::Failure(failure)) => {
                    bail!("Workflow failed: {failure}");
                }
                (stage, _) => {
                    tracing::debug!(%stage, "Stage update not rendered");
                }
            }
        }

        // The update channel only closes when the controller is disposed
        println!();
        println!("🛑 Interrupted");
        Ok(())
    }

    async fn choose(
        &self,
        artifacts: &[Artifact],
        prompt: &mut Prompt,
    ) -> Result<Option<Artifact>> {
        if let Some(name) = &self.workspace {
            return match artifacts.iter().find(|a| &a.name == name) {
                Some(artifact) => Ok(Some(artifact.clone())),
                None => bail!(
                    "Workspace '{}' not found. Available: {}",
                    name,
                    artifacts.iter().map(|a| a.name.as_str()).collect::<Vec<_>>().join(", ")
                ),
            };
        }

        println!("📂 Available workspaces:");
        for (index, artifact) in artifacts.iter().enumerate() {
            println!("   {}. {} - {}", index + 1, artifact.name, artifact.description);
        }

        loop {
            let Some(answer) = prompt.ask("Select a workspace (number or name): ").await? else {
                return Ok(None);
            };
            if let Some(artifact) = pick(artifacts, &answer) {
                return Ok(Some(artifact.clone()));
            }
            println!("❌ '{answer}' is not one of the listed workspaces");
        }
    }
}

/// Resolve a 1-based index or an exact name against the listing
fn pick<'a>(artifacts: &'a [Artifact], answer: &str) -> Option<&'a Artifact> {
    match answer.parse::<usize>() {
        Ok(index) if index >= 1 => artifacts.get(index - 1),
        _ => artifacts.iter().find(|a| a.name == answer),
    }
}

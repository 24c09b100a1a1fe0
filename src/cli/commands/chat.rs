use anyhow::{bail, Result};

use super::{connect_backend, Command, Prompt};
use crate::config::config;
use crate::shutdown::ShutdownCoordinator;
use crate::workflow::{PollerConfig, SessionError, StagePayload, WorkflowController, WorkflowStage};

pub struct ChatCommand;

impl Command for ChatCommand {
    async fn execute(&self) -> Result<()> {
        let backend = connect_backend()?;
        let controller = WorkflowController::new(backend, PollerConfig::from(&config()?.polling));
        let (mut updates, _subscription) = controller.updates();
        let signals = ShutdownCoordinator::new(controller.clone()).spawn();

        println!("🔍 Checking whether an indexed workspace is available...");
        controller.enter_session();

        let outcome = match updates.recv().await {
            Some(update) => match (update.stage, update.payload) {
                (WorkflowStage::SessionActive, _) => {
                    println!("✅ Session ready");
                    run_session(&controller, &mut Prompt::new()?).await
                }
                (_, StagePayload::SessionUnavailable) => {
                    println!("⏳ No workspace has finished indexing yet");
                    println!("   💡 Run 'repoflow run <REPO_URL>' first");
                    Ok(())
                }
                (WorkflowStage::Failed, StagePayload::Failure(failure)) => {
                    Err(anyhow::anyhow!("Could not reach the session: {failure}"))
                }
                (stage, _) => Err(anyhow::anyhow!("Unexpected workflow stage: {stage}")),
            },
            None => {
                println!("🛑 Interrupted");
                Ok(())
            }
        };

        signals.abort();
        controller.dispose();
        outcome
    }
}

/// Query loop for an active session. Ends on `exit`, end of input, or Ctrl-C.
pub async fn run_session(controller: &WorkflowController, prompt: &mut Prompt) -> Result<()> {
    println!("💬 Ask anything about the repository. Type 'exit' to leave.");

    loop {
        let Some(query) = prompt.ask("💬 > ").await? else {
            break;
        };
        if query.is_empty() {
            continue;
        }
        if query == "exit" || query == "quit" {
            break;
        }

        match controller.ask(&query).await {
            Ok(answer) => {
                println!("🤖 {answer}");
                println!();
            }
            Err(SessionError::NotActive(stage)) => {
                bail!("Session ended (workflow is {stage})");
            }
            Err(e) => println!("❌ {e}"),
        }
    }

    println!("👋 Bye");
    Ok(())
}

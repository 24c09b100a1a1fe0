use anyhow::Result;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::backend::{HttpBackend, RepoFlowBackend};
use crate::config::config;

pub mod chat;
pub mod run;
pub mod status;
pub mod workspaces;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}

/// Build the HTTP backend from the loaded configuration
pub fn connect_backend() -> Result<Arc<dyn RepoFlowBackend>> {
    let config = config()?;
    print!("🔄 Connecting to {}... ", config.backend.base_url);
    std::io::stdout().flush()?;

    match HttpBackend::from_config(config) {
        Ok(backend) => {
            println!("✅");
            Ok(Arc::new(backend))
        }
        Err(e) => {
            println!("❌ Failed to set up the backend client: {e:?}");
            Err(e)
        }
    }
}

/// Line-oriented reader over stdin shared by the interactive prompts.
///
/// Lines are read on a plain OS thread so a pending read never holds up runtime
/// shutdown; the thread is left behind when the process exits.
pub struct Prompt {
    lines: mpsc::UnboundedReceiver<std::io::Result<String>>,
}

impl Prompt {
    pub fn new() -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::Builder::new()
            .name("repoflow-stdin".to_string())
            .spawn(move || {
                for line in std::io::stdin().lock().lines() {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })?;
        Ok(Self { lines: rx })
    }

    /// Print `label` and read one trimmed line. `None` at end of input or on Ctrl-C.
    pub async fn ask(&mut self, label: &str) -> Result<Option<String>> {
        print!("{label}");
        std::io::stdout().flush()?;

        tokio::select! {
            line = self.lines.recv() => match line {
                Some(line) => Ok(Some(line?.trim().to_string())),
                None => Ok(None),
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                Ok(None)
            }
        }
    }
}

pub async fn show_how_to_get_started() -> Result<()> {
    println!("🌊 RepoFlow - chat with any GitHub repository");
    println!();
    println!("To get started:");
    println!("  🚀 repoflow run <REPO_URL>   # Ingest, pick a workspace, index, chat");
    println!("  💬 repoflow chat             # Reopen the session for an indexed workspace");
    println!("  📂 repoflow workspaces       # List ingested workspaces");
    println!("  📊 repoflow status           # Check backend readiness");
    println!();
    println!("💡 Backend address comes from repoflow.toml or REPOFLOW_BACKEND__BASE_URL");
    Ok(())
}

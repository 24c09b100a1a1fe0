use anyhow::Result;

use super::{connect_backend, Command};
use crate::workflow::ArtifactSelector;

pub struct WorkspacesCommand;

impl Command for WorkspacesCommand {
    async fn execute(&self) -> Result<()> {
        let selector = ArtifactSelector::new(connect_backend()?);

        let artifacts = selector.list().await?;
        if artifacts.is_empty() {
            println!("📂 No workspaces available");
            println!("   💡 Ingest a repository with: repoflow run <REPO_URL>");
            return Ok(());
        }

        println!("📂 WORKSPACES ({}):", artifacts.len());
        for artifact in &artifacts {
            println!("   • {} - {}", artifact.name, artifact.description);
        }
        Ok(())
    }
}

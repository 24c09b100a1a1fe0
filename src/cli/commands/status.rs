use anyhow::Result;

use super::{connect_backend, Command};
use crate::workflow::{ArtifactSelector, FetchError, SessionGate};

pub struct StatusCommand;

fn render(result: &Result<bool, FetchError>) -> String {
    match result {
        Ok(true) => "✅ ready".to_string(),
        Ok(false) => "⏳ not ready".to_string(),
        Err(e) => format!("❌ {e}"),
    }
}

impl Command for StatusCommand {
    async fn execute(&self) -> Result<()> {
        let backend = connect_backend()?;
        let selector = ArtifactSelector::new(backend.clone());
        let gate = SessionGate::new(backend);

        let (ingestion, indexing) = tokio::join!(selector.ingestion_ready(), gate.check_ready());

        println!("📊 REPOFLOW STATUS");
        println!("   📥 Ingestion: {}", render(&ingestion));
        println!("   🧠 Indexing:  {}", render(&indexing));
        Ok(())
    }
}

use anyhow::Result;
use clap::Parser;
use std::time::Duration;

use repoflow::cli::commands::{
    chat::ChatCommand, run::RunCommand, show_how_to_get_started, status::StatusCommand,
    workspaces::WorkspacesCommand, Command,
};
use repoflow::cli::{Cli, Commands};
use repoflow::{config, init_config, init_telemetry};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async {
        init_telemetry(&config()?.observability)?;
        init_config()?;

        match cli.command {
            // No subcommand: explain how to get started
            None => show_how_to_get_started().await,
            Some(Commands::Run {
                repo_url,
                workspace,
                no_chat,
            }) => {
                RunCommand::new(repo_url)
                    .with_workspace(workspace)
                    .with_no_chat(no_chat)
                    .execute()
                    .await
            }
            Some(Commands::Chat) => ChatCommand.execute().await,
            Some(Commands::Workspaces) => WorkspacesCommand.execute().await,
            Some(Commands::Status) => StatusCommand.execute().await,
        }
    });

    // Do not wait on background tasks still parked on a pending backend call
    runtime.shutdown_timeout(Duration::from_millis(500));
    result
}

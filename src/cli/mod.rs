use clap::{Parser, Subcommand};

pub mod commands;

#[derive(Parser)]
#[command(name = "repoflow")]
#[command(version)]
#[command(about = "Onboard a GitHub repository into a RepoFlow backend and query it")]
#[command(long_about = "RepoFlow submits a repository for ingestion, lets you pick a \
                       workspace to index, and opens a question-answering session over \
                       the indexed code. Get started with 'repoflow run <REPO_URL>'.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit a repository and walk it through ingestion, selection and indexing
    Run {
        /// Repository to ingest, e.g. https://github.com/owner/name
        #[arg(help = "GitHub repository URL to submit")]
        repo_url: String,
        /// Workspace to index once the listing is available
        #[arg(long, short = 'w', help = "Workspace name to select without prompting")]
        workspace: Option<String>,
        /// Stop once the session is ready instead of opening the chat prompt
        #[arg(long, help = "Exit when indexing completes without starting a chat")]
        no_chat: bool,
    },
    /// Open the chat session for an already indexed workspace
    Chat,
    /// List the workspaces produced by the last ingestion
    Workspaces,
    /// Show ingestion and indexing readiness
    Status,
}

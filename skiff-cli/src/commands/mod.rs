//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod app;
mod job;
mod node;

pub use app::AppCommands;
pub use job::JobCommands;
pub use node::NodeCommands;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Cluster membership
    Node {
        #[command(subcommand)]
        command: NodeCommands,
    },
    /// Apps on any node
    App {
        #[command(subcommand)]
        command: AppCommands,
    },
    /// Job status and history
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        Commands::Node { command } => node::handle_node_command(command, &client).await,
        Commands::App { command } => app::handle_app_command(command, &client).await,
        Commands::Job { command } => job::handle_job_command(command, &client).await,
    }
}

/// Timestamp as shown in every listing
fn timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

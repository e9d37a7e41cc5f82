//! Skiff CLI
//!
//! Command-line interface for operating a Skiff cluster through any of its
//! nodes.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "skiff")]
#[command(about = "Skiff cluster CLI", long_about = None)]
struct Cli {
    /// Node URL
    #[arg(long, env = "SKIFF_URL", default_value = "http://localhost:7300")]
    url: String,

    /// User token
    #[arg(long, env = "SKIFF_USER_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config {
        url: cli.url,
        token: cli.token,
    };

    handle_command(cli.command, &config).await
}

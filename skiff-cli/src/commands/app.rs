//! App command handlers
//!
//! Every app lives on one node, so targeted commands take `--node`.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use skiff_client::NodeClient;
use skiff_core::domain::app::{App, AppStatus};
use skiff_core::dto::app::{AppAction, CreateApp};

use super::job::{print_job_details, wait_for_job};
use super::timestamp;

/// App subcommands
#[derive(Subcommand)]
pub enum AppCommands {
    /// List apps across nodes
    List {
        /// `all` or a comma separated list of node ids
        #[arg(long, default_value = "all")]
        node: String,
    },
    /// Show one app
    Show {
        id: String,
        #[arg(long)]
        node: String,
    },
    /// Create an app on a node
    Create {
        name: String,
        #[arg(long)]
        node: String,
        /// App id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
        /// Compose file relative to the node's apps directory
        #[arg(long)]
        compose_file: Option<String>,
    },
    /// Delete an app record
    Delete {
        id: String,
        #[arg(long)]
        node: String,
    },
    /// Start the app's containers
    Deploy(ActionArgs),
    /// Stop the app's containers
    Stop(ActionArgs),
    /// Restart the app's containers
    Restart(ActionArgs),
    /// Rebuild images and start again
    Rebuild(ActionArgs),
}

#[derive(clap::Args)]
pub struct ActionArgs {
    id: String,
    #[arg(long)]
    node: String,
    /// Poll the job until it finishes
    #[arg(long)]
    wait: bool,
}

/// Handle app commands
pub async fn handle_app_command(command: AppCommands, client: &NodeClient) -> Result<()> {
    match command {
        AppCommands::List { node } => list_apps(client, &node).await,
        AppCommands::Show { id, node } => {
            let app = client.get_app(&id, &node).await?;
            print_app_details(&app);
            Ok(())
        }
        AppCommands::Create {
            name,
            node,
            id,
            compose_file,
        } => {
            let req = CreateApp {
                id,
                name,
                compose_file,
            };
            let app = client.create_app(&node, &req).await?;
            println!(
                "{} Created app {} on node {}",
                "✓".green(),
                app.id.bold(),
                app.node_id
            );
            Ok(())
        }
        AppCommands::Delete { id, node } => {
            client.delete_app(&id, &node).await?;
            println!("{} Deleted app {}", "✓".green(), id.bold());
            Ok(())
        }
        AppCommands::Deploy(args) => trigger(client, args, AppAction::Deploy).await,
        AppCommands::Stop(args) => trigger(client, args, AppAction::Stop).await,
        AppCommands::Restart(args) => trigger(client, args, AppAction::Restart).await,
        AppCommands::Rebuild(args) => trigger(client, args, AppAction::Rebuild).await,
    }
}

async fn list_apps(client: &NodeClient, node: &str) -> Result<()> {
    let node_ids: Option<Vec<String>> = if node.eq_ignore_ascii_case("all") {
        None
    } else {
        Some(node.split(',').map(|id| id.trim().to_string()).collect())
    };

    let list = client.list_apps(node_ids.as_deref()).await?;

    if list.items.is_empty() {
        println!("{}", "No apps found.".yellow());
    } else {
        println!("{}", format!("Found {} app(s):", list.items.len()).bold());
        println!();
        for app in &list.items {
            print_app_summary(app);
        }
    }

    if list.excluded_nodes > 0 {
        println!(
            "{}",
            format!("⚠ {} node(s) did not answer:", list.excluded_nodes).yellow()
        );
        for failure in &list.errors {
            println!("  {} {}", failure.node_id.bold(), failure.error.dimmed());
        }
    }

    Ok(())
}

async fn trigger(client: &NodeClient, args: ActionArgs, action: AppAction) -> Result<()> {
    let job = client
        .trigger_app_action(&args.id, &args.node, action)
        .await?;
    println!(
        "{} Queued {} of {} as job {}",
        "✓".green(),
        action,
        args.id.bold(),
        job.id.to_string().cyan()
    );

    if args.wait {
        let job = wait_for_job(client, job.id, &args.node).await?;
        println!();
        print_job_details(&job);
    }

    Ok(())
}

fn print_app_summary(app: &App) {
    println!("  {} {} ({})", "▸".cyan(), app.id.bold(), app.name);
    println!("    Node:    {}", app.node_id.dimmed());
    println!("    Status:  {}", colorize_status(app.status));
    println!();
}

fn print_app_details(app: &App) {
    println!("{}", "App Details:".bold());
    println!("  ID:      {}", app.id.cyan());
    println!("  Name:    {}", app.name);
    println!("  Node:    {}", app.node_id);
    println!("  Status:  {}", colorize_status(app.status));
    if let Some(file) = &app.compose_file {
        println!("  Compose: {}", file);
    }
    println!("  Created: {}", timestamp(&app.created_at));
    println!("  Updated: {}", timestamp(&app.updated_at));
}

/// Colorize app status for display
fn colorize_status(status: AppStatus) -> ColoredString {
    let status_str = status.to_string();
    match status {
        AppStatus::Running => status_str.green(),
        AppStatus::Deploying => status_str.cyan(),
        AppStatus::Created => status_str.yellow(),
        AppStatus::Stopped => status_str.dimmed(),
        AppStatus::Error => status_str.red(),
    }
}

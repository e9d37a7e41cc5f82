//! Node command handlers
//!
//! Membership management and on-demand health checks.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use skiff_client::NodeClient;
use skiff_core::domain::node::NodeStatus;
use skiff_core::dto::node::{CreateNode, NodeSummary, UpdateNode};

use super::timestamp;

/// Node subcommands
#[derive(Subcommand)]
pub enum NodeCommands {
    /// List all registered nodes
    List,
    /// Show one node
    Show { id: String },
    /// Add a node by hand
    Add {
        /// Unique node name
        name: String,
        /// Base URL of the node's API
        #[arg(long)]
        endpoint: String,
        /// Key the node expects from the primary
        #[arg(long)]
        api_key: String,
        /// Node id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
    },
    /// Remove a node from the registry
    Remove { id: String },
    /// Probe a node now
    Health { id: String },
    /// Take a node out of routing and liveness
    Disable { id: String },
    /// Put a disabled node back
    Enable { id: String },
}

/// Handle node commands
pub async fn handle_node_command(command: NodeCommands, client: &NodeClient) -> Result<()> {
    match command {
        NodeCommands::List => list_nodes(client).await,
        NodeCommands::Show { id } => {
            let node = client.get_node(&id).await?;
            print_node_details(&node);
            Ok(())
        }
        NodeCommands::Add {
            name,
            endpoint,
            api_key,
            id,
        } => {
            let req = CreateNode {
                id,
                name,
                api_endpoint: endpoint,
                api_key,
                is_primary: false,
            };
            let node = client.create_node(&req).await?;
            println!("{} Added node {}", "✓".green(), node.id.bold());
            Ok(())
        }
        NodeCommands::Remove { id } => {
            client.delete_node(&id).await?;
            println!("{} Removed node {}", "✓".green(), id.bold());
            Ok(())
        }
        NodeCommands::Health { id } => check_health(client, &id).await,
        NodeCommands::Disable { id } => set_status(client, &id, NodeStatus::Offline).await,
        NodeCommands::Enable { id } => set_status(client, &id, NodeStatus::Unknown).await,
    }
}

async fn list_nodes(client: &NodeClient) -> Result<()> {
    let nodes = client.list_nodes().await?;

    if nodes.is_empty() {
        println!("{}", "No nodes registered.".yellow());
        return Ok(());
    }

    println!("{}", format!("Found {} node(s):", nodes.len()).bold());
    println!();
    for node in nodes {
        print_node_summary(&node);
    }

    Ok(())
}

async fn check_health(client: &NodeClient, id: &str) -> Result<()> {
    let health = client.check_node_health(id).await?;

    println!("  Node:    {}", health.node_id.bold());
    println!("  Status:  {}", colorize_status(health.status));
    if let Some(latency) = health.latency_ms {
        println!("  Latency: {}ms", latency);
    }
    if let Some(error) = &health.error {
        println!("  Error:   {}", error.red());
    }

    Ok(())
}

async fn set_status(client: &NodeClient, id: &str, status: NodeStatus) -> Result<()> {
    let req = UpdateNode {
        status: Some(status),
        ..Default::default()
    };
    let node = client.update_node(id, &req).await?;
    println!(
        "{} Node {} is now {}",
        "✓".green(),
        node.id.bold(),
        colorize_status(node.status)
    );
    Ok(())
}

fn print_node_summary(node: &NodeSummary) {
    let role = if node.is_primary { " (primary)" } else { "" };

    println!("  {} {}{}", "▸".cyan(), node.id.bold(), role.dimmed());
    println!("    Status:    {}", colorize_status(node.status));
    println!("    Endpoint:  {}", node.api_endpoint.dimmed());
    if let Some(seen) = &node.last_seen {
        println!("    Last Seen: {}", timestamp(seen).dimmed());
    }
    println!();
}

fn print_node_details(node: &NodeSummary) {
    println!("{}", "Node Details:".bold());
    println!("  ID:        {}", node.id.cyan());
    println!("  Name:      {}", node.name);
    println!("  Primary:   {}", node.is_primary);
    println!("  Status:    {}", colorize_status(node.status));
    println!("  Endpoint:  {}", node.api_endpoint);
    println!("  Created:   {}", timestamp(&node.created_at));
    match &node.last_seen {
        Some(seen) => println!("  Last Seen: {}", timestamp(seen)),
        None => println!("  Last Seen: {}", "never".dimmed()),
    }
}

/// Colorize node status for display
fn colorize_status(status: NodeStatus) -> ColoredString {
    let status_str = status.as_str();
    match status {
        NodeStatus::Online => status_str.green(),
        NodeStatus::Unreachable => status_str.red(),
        NodeStatus::Offline => status_str.dimmed(),
        NodeStatus::Unknown => status_str.yellow(),
    }
}

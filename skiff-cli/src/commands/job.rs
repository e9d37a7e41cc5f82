//! Job command handlers
//!
//! Jobs are polled on the node that runs them.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use skiff_client::NodeClient;
use skiff_core::domain::job::{Job, JobStatus};
use std::time::Duration;
use uuid::Uuid;

use super::timestamp;

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// Show a job's status and progress
    Show {
        id: Uuid,
        #[arg(long)]
        node: String,
    },
    /// Recent jobs of an app, newest first
    History {
        app: String,
        #[arg(long)]
        node: String,
        #[arg(long)]
        limit: Option<u32>,
    },
}

/// Handle job commands
pub async fn handle_job_command(command: JobCommands, client: &NodeClient) -> Result<()> {
    match command {
        JobCommands::Show { id, node } => {
            let job = client.get_job(id, &node).await?;
            print_job_details(&job);
            Ok(())
        }
        JobCommands::History { app, node, limit } => {
            let jobs = client.list_app_jobs(&app, &node, limit).await?;

            if jobs.is_empty() {
                println!("{}", format!("No jobs found for app {}.", app).yellow());
            } else {
                println!(
                    "{}",
                    format!("Found {} job(s) for app {}:", jobs.len(), app).bold()
                );
                println!();
                for job in jobs {
                    print_job_summary(&job);
                }
            }
            Ok(())
        }
    }
}

/// Poll until the job is terminal, echoing progress changes
pub(super) async fn wait_for_job(client: &NodeClient, id: Uuid, node: &str) -> Result<Job> {
    let mut last_progress = None;
    loop {
        let job = client.get_job(id, node).await?;
        if last_progress != Some(job.progress) {
            println!(
                "  {:>3}% {}",
                job.progress,
                job.progress_message.as_deref().unwrap_or_default().dimmed()
            );
            last_progress = Some(job.progress);
        }
        if job.status.is_terminal() {
            return Ok(job);
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

fn print_job_summary(job: &Job) {
    println!("  {} Job {}", "▸".cyan(), job.id.to_string().dimmed());
    println!("    Kind:     {}", job.kind);
    println!("    Status:   {}", colorize_status(job.status));
    println!("    Created:  {}", timestamp(&job.created_at).dimmed());
    println!();
}

/// Print detailed job information
pub(super) fn print_job_details(job: &Job) {
    println!("{}", "Job Details:".bold());
    println!("  ID:        {}", job.id.to_string().cyan());
    println!("  App:       {}", job.app_id);
    println!("  Node:      {}", job.node_id);
    println!("  Kind:      {}", job.kind);
    println!("  Status:    {}", colorize_status(job.status));
    println!("  Progress:  {}%", job.progress);
    if let Some(message) = &job.progress_message {
        println!("  Step:      {}", message.dimmed());
    }
    println!("  Created:   {}", timestamp(&job.created_at));

    if let Some(started) = &job.started_at {
        println!("  Started:   {}", timestamp(started));
    }

    if let Some(completed) = &job.completed_at {
        println!("  Completed: {}", timestamp(completed));

        if let Some(started) = &job.started_at {
            let seconds = completed.signed_duration_since(*started).num_seconds();
            println!("  Duration:  {}s", seconds);
        }
    }

    if let Some(error) = &job.error_message {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }
}

/// Colorize job status for display
fn colorize_status(status: JobStatus) -> ColoredString {
    let status_str = status.to_string();
    match status {
        JobStatus::Pending => status_str.yellow(),
        JobStatus::Running => status_str.cyan(),
        JobStatus::Completed => status_str.green(),
        JobStatus::Failed => status_str.red(),
    }
}

//! Docker Compose runtime
//!
//! Shells out to `docker compose` for every operation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::{AppRuntime, ComposeProject};

/// Checks that `docker compose` is installed and answers
pub async fn check_compose_available() -> Result<()> {
    let output = Command::new("docker")
        .args(["compose", "version"])
        .output()
        .await
        .context("Failed to execute 'docker compose version'. Is docker installed?")?;

    if !output.status.success() {
        anyhow::bail!("docker compose is not working correctly");
    }

    let version = String::from_utf8_lossy(&output.stdout);
    info!("docker compose is available: {}", version.trim());

    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct DockerComposeRuntime;

impl DockerComposeRuntime {
    pub fn new() -> Self {
        Self
    }

    async fn compose(&self, project: &ComposeProject, args: &[&str]) -> Result<()> {
        if !project.file.exists() {
            anyhow::bail!("compose file {} does not exist", project.file.display());
        }

        debug!(
            "docker compose -p {} -f {} {}",
            project.name,
            project.file.display(),
            args.join(" ")
        );

        let output = Command::new("docker")
            .arg("compose")
            .arg("-p")
            .arg(&project.name)
            .arg("-f")
            .arg(&project.file)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .context("Failed to execute docker compose")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "docker compose {} exited with {}: {}",
                args.first().copied().unwrap_or_default(),
                output.status,
                tail(&stderr, 20)
            );
        }

        Ok(())
    }
}

#[async_trait]
impl AppRuntime for DockerComposeRuntime {
    async fn up(&self, project: &ComposeProject) -> Result<()> {
        self.compose(project, &["up", "-d", "--remove-orphans"]).await
    }

    async fn down(&self, project: &ComposeProject) -> Result<()> {
        self.compose(project, &["down"]).await
    }

    async fn restart(&self, project: &ComposeProject) -> Result<()> {
        self.compose(project, &["restart"]).await
    }

    async fn build(&self, project: &ComposeProject) -> Result<()> {
        self.compose(project, &["build", "--no-cache"]).await
    }
}

/// Last `lines` lines of command output
fn tail(output: &str, lines: usize) -> String {
    let all: Vec<&str> = output.trim_end().lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

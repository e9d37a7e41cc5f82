//! App action executor
//!
//! Drives the app runtime for deploy, stop, restart and rebuild jobs and
//! keeps the app's status in step with what happened.

use anyhow::Context;
use async_trait::async_trait;
use skiff_core::domain::app::AppStatus;
use skiff_core::domain::job::{Job, JobKind};
use std::path::PathBuf;
use std::sync::Arc;

use super::executor::{ExecutorRegistry, JobExecutor, ProgressReporter};
use crate::runtime::{AppRuntime, ComposeProject};
use crate::service::AppService;

pub struct AppActionExecutor {
    apps: AppService,
    runtime: Arc<dyn AppRuntime>,
    apps_dir: PathBuf,
}

impl AppActionExecutor {
    pub fn new(apps: AppService, runtime: Arc<dyn AppRuntime>, apps_dir: PathBuf) -> Self {
        Self {
            apps,
            runtime,
            apps_dir,
        }
    }

    /// Register one shared executor for every app job kind
    pub fn register_all(self, registry: &mut ExecutorRegistry) {
        let executor: Arc<dyn JobExecutor> = Arc::new(self);
        for kind in [
            JobKind::Deploy,
            JobKind::Stop,
            JobKind::Restart,
            JobKind::Rebuild,
        ] {
            registry.register(kind, executor.clone());
        }
    }

    async fn run(
        &self,
        kind: JobKind,
        project: &ComposeProject,
        progress: &ProgressReporter,
    ) -> anyhow::Result<AppStatus> {
        match kind {
            JobKind::Deploy => {
                progress.report(20, "starting containers").await?;
                self.runtime.up(project).await?;
                Ok(AppStatus::Running)
            }
            JobKind::Stop => {
                progress.report(20, "stopping containers").await?;
                self.runtime.down(project).await?;
                Ok(AppStatus::Stopped)
            }
            JobKind::Restart => {
                progress.report(20, "restarting containers").await?;
                self.runtime.restart(project).await?;
                Ok(AppStatus::Running)
            }
            JobKind::Rebuild => {
                progress.report(10, "building images").await?;
                self.runtime.build(project).await?;
                progress.report(60, "starting containers").await?;
                self.runtime.up(project).await?;
                Ok(AppStatus::Running)
            }
        }
    }
}

#[async_trait]
impl JobExecutor for AppActionExecutor {
    async fn execute(&self, job: &Job, progress: &ProgressReporter) -> anyhow::Result<()> {
        let app = self
            .apps
            .get(&job.app_id)
            .await
            .with_context(|| format!("cannot {} app {}", job.kind, job.app_id))?;
        let project = ComposeProject::for_app(&app, &self.apps_dir);

        progress.report(5, "preparing").await?;
        if job.kind != JobKind::Stop {
            self.apps.set_status(&app.id, AppStatus::Deploying).await?;
        }

        match self.run(job.kind, &project, progress).await {
            Ok(status) => {
                self.apps.set_status(&app.id, status).await?;
                progress.report(100, "done").await?;
                Ok(())
            }
            Err(e) => {
                if let Err(status_err) = self.apps.set_status(&app.id, AppStatus::Error).await {
                    tracing::error!("Failed to mark app {} as errored: {}", app.id, status_err);
                }
                Err(e)
            }
        }
    }
}

//! App Service
//!
//! Apps owned by this node. Actions on an app never run inline: they are
//! turned into jobs for the worker.

use chrono::Utc;
use skiff_core::domain::app::{App, AppStatus};
use skiff_core::domain::job::Job;
use skiff_core::dto::app::{AppAction, CreateApp};
use sqlx::SqlitePool;
use std::path::{Component, Path};
use thiserror::Error;

use crate::repository::app_repository;
use crate::service::job_queue::{JobQueue, JobQueueError};
use crate::service::{is_unique_violation, validate_identifier};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("app {0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error(transparent)]
    Job(#[from] JobQueueError),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if is_unique_violation(&err) {
            AppError::Validation("an app with this id or name already exists".to_string())
        } else {
            AppError::Database(err)
        }
    }
}

type Result<T> = std::result::Result<T, AppError>;

#[derive(Clone)]
pub struct AppService {
    pool: SqlitePool,
    node_id: String,
    jobs: JobQueue,
}

impl AppService {
    pub fn new(pool: SqlitePool, node_id: impl Into<String>, jobs: JobQueue) -> Self {
        Self {
            pool,
            node_id: node_id.into(),
            jobs,
        }
    }

    pub async fn list(&self) -> Result<Vec<App>> {
        Ok(app_repository::list_all(&self.pool).await?)
    }

    pub async fn get(&self, id: &str) -> Result<App> {
        app_repository::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(id.to_string()))
    }

    pub async fn create(&self, req: CreateApp) -> Result<App> {
        let id = req
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        validate_identifier("app id", &id).map_err(AppError::Validation)?;

        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("app name cannot be empty".to_string()));
        }

        if let Some(compose_file) = &req.compose_file {
            validate_compose_path(compose_file)?;
        }

        let now = Utc::now();
        let app = App {
            id,
            name,
            node_id: self.node_id.clone(),
            status: AppStatus::Created,
            compose_file: req.compose_file,
            created_at: now,
            updated_at: now,
        };
        app_repository::insert(&self.pool, &app).await?;

        tracing::info!("App created: {} ({})", app.id, app.name);
        Ok(app)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if !app_repository::delete(&self.pool, id).await? {
            return Err(AppError::NotFound(id.to_string()));
        }
        tracing::info!("App deleted: {}", id);
        Ok(())
    }

    /// Queue `action` for the app and return the pending job
    pub async fn trigger(&self, id: &str, action: AppAction) -> Result<Job> {
        let app = self.get(id).await?;
        Ok(self.jobs.enqueue(&app.id, &self.node_id, action.into()).await?)
    }

    /// Job history of an app, newest first
    ///
    /// History outlives the app, so the app does not have to exist anymore.
    pub async fn jobs(&self, id: &str, limit: Option<u32>) -> Result<Vec<Job>> {
        Ok(self.jobs.history(id, limit).await?)
    }

    pub async fn set_status(&self, id: &str, status: AppStatus) -> Result<()> {
        if !app_repository::update_status(&self.pool, id, status).await? {
            return Err(AppError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

/// Compose files live below the node's apps directory
fn validate_compose_path(path: &str) -> Result<()> {
    let path = Path::new(path);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

    if path.as_os_str().is_empty() || escapes {
        return Err(AppError::Validation(
            "compose_file must be a relative path inside the apps directory".to_string(),
        ));
    }
    Ok(())
}

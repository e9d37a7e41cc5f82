//! Job Queue
//!
//! Durable queue of long-running work. Handlers enqueue and return the job
//! right away; the single worker claims, advances and finishes jobs through
//! the same handle.

use skiff_core::domain::job::{Job, JobKind};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::repository::job_repository;

/// Upper bound for a single history query
pub const MAX_HISTORY_LIMIT: u32 = 200;

#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

type Result<T> = std::result::Result<T, JobQueueError>;

#[derive(Clone)]
pub struct JobQueue {
    pool: SqlitePool,
    default_history_limit: u32,
}

impl JobQueue {
    pub fn new(pool: SqlitePool, default_history_limit: u32) -> Self {
        Self {
            pool,
            default_history_limit,
        }
    }

    /// Create a pending job; the worker picks it up on its next poll
    pub async fn enqueue(&self, app_id: &str, node_id: &str, kind: JobKind) -> Result<Job> {
        let job = job_repository::create(&self.pool, app_id, node_id, kind).await?;
        tracing::info!("Job queued: {} ({} of app {})", job.id, kind, app_id);
        Ok(job)
    }

    pub async fn get(&self, id: Uuid) -> Result<Job> {
        job_repository::find_by_id(&self.pool, id)
            .await?
            .ok_or(JobQueueError::NotFound(id))
    }

    /// Newest jobs of an app; `limit` falls back to the configured default
    /// and is capped at [`MAX_HISTORY_LIMIT`]
    pub async fn history(&self, app_id: &str, limit: Option<u32>) -> Result<Vec<Job>> {
        let limit = limit
            .unwrap_or(self.default_history_limit)
            .clamp(1, MAX_HISTORY_LIMIT);
        Ok(job_repository::list_by_app(&self.pool, app_id, limit).await?)
    }

    /// Atomically move the oldest pending job to running
    pub async fn claim_next(&self) -> Result<Option<Job>> {
        Ok(job_repository::claim_next(&self.pool).await?)
    }

    /// Returns false when the job is no longer running
    pub async fn report_progress(
        &self,
        id: Uuid,
        progress: u8,
        message: Option<&str>,
    ) -> Result<bool> {
        Ok(job_repository::update_progress(&self.pool, id, progress, message).await?)
    }

    pub async fn complete(&self, id: Uuid) -> Result<bool> {
        Ok(job_repository::complete(&self.pool, id).await?)
    }

    pub async fn fail(&self, id: Uuid, error_message: &str) -> Result<bool> {
        Ok(job_repository::fail(&self.pool, id, error_message).await?)
    }

    /// Fail jobs a previous process left running
    pub async fn recover_interrupted(&self) -> Result<u64> {
        let count = job_repository::fail_all_running(&self.pool, "interrupted by restart").await?;
        if count > 0 {
            tracing::warn!("Marked {} interrupted job(s) as failed", count);
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_history_limit_defaults_and_caps() {
        let queue = JobQueue::new(test_pool().await, 2);
        for _ in 0..3 {
            queue.enqueue("app", "node-1", JobKind::Deploy).await.unwrap();
        }

        assert_eq!(queue.history("app", None).await.unwrap().len(), 2);
        assert_eq!(queue.history("app", Some(10)).await.unwrap().len(), 3);
        assert_eq!(queue.history("app", Some(0)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let queue = JobQueue::new(test_pool().await, 50);
        let id = Uuid::new_v4();
        assert!(matches!(
            queue.get(id).await.unwrap_err(),
            JobQueueError::NotFound(missing) if missing == id
        ));
    }

    #[tokio::test]
    async fn test_recover_interrupted_fails_running_jobs() {
        let queue = JobQueue::new(test_pool().await, 50);
        let job = queue.enqueue("app", "node-1", JobKind::Rebuild).await.unwrap();
        queue.claim_next().await.unwrap();

        assert_eq!(queue.recover_interrupted().await.unwrap(), 1);
        let stored = queue.get(job.id).await.unwrap();
        assert_eq!(stored.error_message.as_deref(), Some("interrupted by restart"));
    }
}

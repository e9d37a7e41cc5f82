//! Job Repository
//!
//! Handles all database operations related to jobs. Every status change is a
//! guarded update on the expected current status, so a job can only move
//! forward through `pending -> running -> {completed | failed}`.

use chrono::{DateTime, Utc};
use skiff_core::domain::job::{Job, JobKind, JobStatus};
use sqlx::SqliteExecutor;
use uuid::Uuid;

/// Create a new pending job
pub async fn create<'e, E: SqliteExecutor<'e>>(
    exec: E,
    app_id: &str,
    node_id: &str,
    kind: JobKind,
) -> Result<Job, sqlx::Error> {
    let job = Job {
        id: Uuid::new_v4(),
        app_id: app_id.to_string(),
        node_id: node_id.to_string(),
        kind,
        status: JobStatus::Pending,
        progress: 0,
        progress_message: None,
        error_message: None,
        created_at: Utc::now(),
        started_at: None,
        completed_at: None,
    };

    sqlx::query(
        r#"
        INSERT INTO jobs (id, app_id, node_id, kind, status, progress, created_at)
        VALUES (?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(job.id.to_string())
    .bind(&job.app_id)
    .bind(&job.node_id)
    .bind(kind.as_str())
    .bind(JobStatus::Pending.as_str())
    .bind(job.created_at)
    .execute(exec)
    .await?;

    Ok(job)
}

/// Find a job by ID
pub async fn find_by_id<'e, E: SqliteExecutor<'e>>(
    exec: E,
    id: Uuid,
) -> Result<Option<Job>, sqlx::Error> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, app_id, node_id, kind, status, progress, progress_message,
               error_message, created_at, started_at, completed_at
        FROM jobs
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(exec)
    .await?;

    row.map(Job::try_from).transpose()
}

/// Most recent jobs of an app, newest first
pub async fn list_by_app<'e, E: SqliteExecutor<'e>>(
    exec: E,
    app_id: &str,
    limit: u32,
) -> Result<Vec<Job>, sqlx::Error> {
    let rows = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, app_id, node_id, kind, status, progress, progress_message,
               error_message, created_at, started_at, completed_at
        FROM jobs
        WHERE app_id = ?
        ORDER BY created_at DESC, rowid DESC
        LIMIT ?
        "#,
    )
    .bind(app_id)
    .bind(i64::from(limit))
    .fetch_all(exec)
    .await?;

    rows.into_iter().map(Job::try_from).collect()
}

/// Atomically claim the oldest pending job
///
/// Selection and the `pending -> running` transition happen in one
/// statement, so two workers can never claim the same job.
pub async fn claim_next<'e, E: SqliteExecutor<'e>>(exec: E) -> Result<Option<Job>, sqlx::Error> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        UPDATE jobs
        SET status = 'running', started_at = ?
        WHERE id = (
            SELECT id FROM jobs
            WHERE status = 'pending'
            ORDER BY created_at ASC, rowid ASC
            LIMIT 1
        )
        AND status = 'pending'
        RETURNING id, app_id, node_id, kind, status, progress, progress_message,
                  error_message, created_at, started_at, completed_at
        "#,
    )
    .bind(Utc::now())
    .fetch_optional(exec)
    .await?;

    row.map(Job::try_from).transpose()
}

/// Record progress of a running job
///
/// Progress never decreases; values above 100 are clamped. Returns false if
/// the job is no longer running.
pub async fn update_progress<'e, E: SqliteExecutor<'e>>(
    exec: E,
    id: Uuid,
    progress: u8,
    message: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let progress = i64::from(progress.min(100));

    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET progress = MAX(progress, ?),
            progress_message = COALESCE(?, progress_message)
        WHERE id = ? AND status = 'running'
        "#,
    )
    .bind(progress)
    .bind(message)
    .bind(id.to_string())
    .execute(exec)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Mark a running job as completed
pub async fn complete<'e, E: SqliteExecutor<'e>>(exec: E, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET status = 'completed', progress = 100, completed_at = ?
        WHERE id = ? AND status = 'running'
        "#,
    )
    .bind(Utc::now())
    .bind(id.to_string())
    .execute(exec)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Mark a running job as failed with the given error
pub async fn fail<'e, E: SqliteExecutor<'e>>(
    exec: E,
    id: Uuid,
    error_message: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET status = 'failed', error_message = ?, completed_at = ?
        WHERE id = ? AND status = 'running'
        "#,
    )
    .bind(error_message)
    .bind(Utc::now())
    .bind(id.to_string())
    .execute(exec)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Fail every job still marked running
///
/// Used at startup: whatever was running belonged to a previous process.
pub async fn fail_all_running<'e, E: SqliteExecutor<'e>>(
    exec: E,
    error_message: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET status = 'failed', error_message = ?, completed_at = ?
        WHERE status = 'running'
        "#,
    )
    .bind(error_message)
    .bind(Utc::now())
    .execute(exec)
    .await?;

    Ok(result.rows_affected())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    app_id: String,
    node_id: String,
    kind: String,
    status: String,
    progress: i64,
    progress_message: Option<String>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = sqlx::Error;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let kind: JobKind = row.kind.parse().map_err(decode_error)?;
        let status: JobStatus = row.status.parse().map_err(decode_error)?;

        Ok(Job {
            id,
            app_id: row.app_id,
            node_id: row.node_id,
            kind,
            status,
            progress: row.progress.clamp(0, 100) as u8,
            progress_message: row.progress_message,
            error_message: row.error_message,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_claim_takes_oldest_pending_once() {
        let pool = test_pool().await;
        let first = create(&pool, "app-a", "node-1", JobKind::Deploy).await.unwrap();
        let second = create(&pool, "app-b", "node-1", JobKind::Stop).await.unwrap();

        let claimed = claim_next(&pool).await.unwrap().unwrap();
        assert_eq!(claimed.id, first.id);
        assert_eq!(claimed.status, JobStatus::Running);
        assert!(claimed.started_at.is_some());

        let claimed = claim_next(&pool).await.unwrap().unwrap();
        assert_eq!(claimed.id, second.id);

        assert!(claim_next(&pool).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_progress_is_non_decreasing_and_clamped() {
        let pool = test_pool().await;
        let job = create(&pool, "app", "node-1", JobKind::Rebuild).await.unwrap();

        // not running yet
        assert!(!update_progress(&pool, job.id, 10, None).await.unwrap());

        claim_next(&pool).await.unwrap();
        assert!(update_progress(&pool, job.id, 40, Some("pulling")).await.unwrap());
        assert!(update_progress(&pool, job.id, 20, None).await.unwrap());

        let stored = find_by_id(&pool, job.id).await.unwrap().unwrap();
        assert_eq!(stored.progress, 40);
        assert_eq!(stored.progress_message.as_deref(), Some("pulling"));

        update_progress(&pool, job.id, 250, None).await.unwrap();
        let stored = find_by_id(&pool, job.id).await.unwrap().unwrap();
        assert_eq!(stored.progress, 100);
    }

    #[tokio::test]
    async fn test_terminal_status_is_final() {
        let pool = test_pool().await;
        let job = create(&pool, "app", "node-1", JobKind::Deploy).await.unwrap();

        // pending jobs cannot skip running
        assert!(!complete(&pool, job.id).await.unwrap());
        assert!(!fail(&pool, job.id, "nope").await.unwrap());

        claim_next(&pool).await.unwrap();
        assert!(fail(&pool, job.id, "compose exited with 1").await.unwrap());
        assert!(!complete(&pool, job.id).await.unwrap());

        let stored = find_by_id(&pool, job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("compose exited with 1"));
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_history_is_newest_first_and_bounded() {
        let pool = test_pool().await;
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(create(&pool, "app", "node-1", JobKind::Restart).await.unwrap().id);
        }
        create(&pool, "other", "node-1", JobKind::Restart).await.unwrap();

        let history = list_by_app(&pool, "app", 3).await.unwrap();
        let got: Vec<Uuid> = history.iter().map(|j| j.id).collect();
        assert_eq!(got, vec![ids[4], ids[3], ids[2]]);
    }

    #[tokio::test]
    async fn test_fail_all_running() {
        let pool = test_pool().await;
        let job = create(&pool, "app", "node-1", JobKind::Deploy).await.unwrap();
        let waiting = create(&pool, "app", "node-1", JobKind::Stop).await.unwrap();
        claim_next(&pool).await.unwrap();

        assert_eq!(fail_all_running(&pool, "interrupted by restart").await.unwrap(), 1);

        let stored = find_by_id(&pool, job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        let untouched = find_by_id(&pool, waiting.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, JobStatus::Pending);
    }
}

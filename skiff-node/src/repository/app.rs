//! App Repository
//!
//! Handles all database operations related to apps owned by this node.

use chrono::{DateTime, Utc};
use skiff_core::domain::app::{App, AppStatus};
use sqlx::SqliteExecutor;

/// Insert a new app
pub async fn insert<'e, E: SqliteExecutor<'e>>(exec: E, app: &App) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO apps (id, name, node_id, status, compose_file, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&app.id)
    .bind(&app.name)
    .bind(&app.node_id)
    .bind(app.status.as_str())
    .bind(&app.compose_file)
    .bind(app.created_at)
    .bind(app.updated_at)
    .execute(exec)
    .await?;

    Ok(())
}

/// Find an app by ID
pub async fn find_by_id<'e, E: SqliteExecutor<'e>>(
    exec: E,
    id: &str,
) -> Result<Option<App>, sqlx::Error> {
    let row = sqlx::query_as::<_, AppRow>(
        r#"
        SELECT id, name, node_id, status, compose_file, created_at, updated_at
        FROM apps
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(exec)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// List all apps, oldest first
pub async fn list_all<'e, E: SqliteExecutor<'e>>(exec: E) -> Result<Vec<App>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AppRow>(
        r#"
        SELECT id, name, node_id, status, compose_file, created_at, updated_at
        FROM apps
        ORDER BY created_at ASC, rowid ASC
        "#,
    )
    .fetch_all(exec)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Update the status of an app
pub async fn update_status<'e, E: SqliteExecutor<'e>>(
    exec: E,
    id: &str,
    status: AppStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE apps SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(exec)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete an app by ID
pub async fn delete<'e, E: SqliteExecutor<'e>>(exec: E, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM apps WHERE id = ?")
        .bind(id)
        .execute(exec)
        .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct AppRow {
    id: String,
    name: String,
    node_id: String,
    status: String,
    compose_file: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AppRow> for App {
    fn from(row: AppRow) -> Self {
        let status = row.status.parse().unwrap_or(AppStatus::Error);

        App {
            id: row.id,
            name: row.name,
            node_id: row.node_id,
            status,
            compose_file: row.compose_file,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

//! Node Repository
//!
//! Handles all database operations related to cluster nodes.

use chrono::{DateTime, Utc};
use skiff_core::domain::node::{Node, NodeStatus};
use sqlx::SqliteExecutor;

/// Insert a new node
pub async fn insert<'e, E: SqliteExecutor<'e>>(exec: E, node: &Node) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO nodes (id, name, api_endpoint, api_key, is_primary, status, last_seen, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&node.id)
    .bind(&node.name)
    .bind(&node.api_endpoint)
    .bind(&node.api_key)
    .bind(node.is_primary)
    .bind(node.status.as_str())
    .bind(node.last_seen)
    .bind(node.created_at)
    .bind(node.updated_at)
    .execute(exec)
    .await?;

    Ok(())
}

/// Overwrite every mutable column of an existing node
pub async fn update<'e, E: SqliteExecutor<'e>>(exec: E, node: &Node) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE nodes
        SET name = ?, api_endpoint = ?, api_key = ?, is_primary = ?, status = ?, last_seen = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&node.name)
    .bind(&node.api_endpoint)
    .bind(&node.api_key)
    .bind(node.is_primary)
    .bind(node.status.as_str())
    .bind(node.last_seen)
    .bind(node.updated_at)
    .bind(&node.id)
    .execute(exec)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Find a node by ID
pub async fn find_by_id<'e, E: SqliteExecutor<'e>>(
    exec: E,
    id: &str,
) -> Result<Option<Node>, sqlx::Error> {
    let row = sqlx::query_as::<_, NodeRow>(
        r#"
        SELECT id, name, api_endpoint, api_key, is_primary, status, last_seen, created_at, updated_at
        FROM nodes
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(exec)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// Find a node by its unique name
pub async fn find_by_name<'e, E: SqliteExecutor<'e>>(
    exec: E,
    name: &str,
) -> Result<Option<Node>, sqlx::Error> {
    let row = sqlx::query_as::<_, NodeRow>(
        r#"
        SELECT id, name, api_endpoint, api_key, is_primary, status, last_seen, created_at, updated_at
        FROM nodes
        WHERE name = ?
        "#,
    )
    .bind(name)
    .fetch_optional(exec)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// Find the primary node, if one is registered
pub async fn find_primary<'e, E: SqliteExecutor<'e>>(exec: E) -> Result<Option<Node>, sqlx::Error> {
    let row = sqlx::query_as::<_, NodeRow>(
        r#"
        SELECT id, name, api_endpoint, api_key, is_primary, status, last_seen, created_at, updated_at
        FROM nodes
        WHERE is_primary = 1
        "#,
    )
    .fetch_optional(exec)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// List all nodes, primary first, then in registration order
pub async fn list_all<'e, E: SqliteExecutor<'e>>(exec: E) -> Result<Vec<Node>, sqlx::Error> {
    let rows = sqlx::query_as::<_, NodeRow>(
        r#"
        SELECT id, name, api_endpoint, api_key, is_primary, status, last_seen, created_at, updated_at
        FROM nodes
        ORDER BY is_primary DESC, created_at ASC, rowid ASC
        "#,
    )
    .fetch_all(exec)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Delete a node by ID
pub async fn delete<'e, E: SqliteExecutor<'e>>(exec: E, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM nodes WHERE id = ?")
        .bind(id)
        .execute(exec)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Mark a node online after a successful heartbeat or health check
///
/// Administratively offline nodes keep their status. Returns whether a row
/// was updated.
pub async fn record_seen<'e, E: SqliteExecutor<'e>>(
    exec: E,
    id: &str,
    seen_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE nodes
        SET status = 'online', last_seen = ?
        WHERE id = ? AND status != 'offline'
        "#,
    )
    .bind(seen_at)
    .bind(id)
    .execute(exec)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Mark a node unreachable after a failed health check
///
/// `last_seen` is left untouched; offline nodes keep their status.
pub async fn mark_unreachable<'e, E: SqliteExecutor<'e>>(
    exec: E,
    id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE nodes
        SET status = 'unreachable'
        WHERE id = ? AND status != 'offline'
        "#,
    )
    .bind(id)
    .execute(exec)
    .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct NodeRow {
    id: String,
    name: String,
    api_endpoint: String,
    api_key: String,
    is_primary: bool,
    status: String,
    last_seen: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<NodeRow> for Node {
    fn from(row: NodeRow) -> Self {
        let status = row.status.parse().unwrap_or(NodeStatus::Unknown);

        Node {
            id: row.id,
            name: row.name,
            api_endpoint: row.api_endpoint,
            api_key: row.api_key,
            is_primary: row.is_primary,
            status,
            last_seen: row.last_seen,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

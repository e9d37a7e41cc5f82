//! Node Registry
//!
//! The authoritative list of cluster members. Every write runs in its own
//! transaction that re-checks the membership invariants (one primary, unique
//! names) before touching the table; the schema's unique indexes back the
//! checks up.

use chrono::Utc;
use skiff_core::domain::node::{Node, NodeStatus};
use skiff_core::dto::node::{CreateNode, RegisterNode, UpdateNode};
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;

use crate::repository::node_repository;
use crate::service::{is_unique_violation, validate_identifier};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("node {0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RegistryError {
    fn from(err: sqlx::Error) -> Self {
        if is_unique_violation(&err) {
            RegistryError::Validation(
                "node name is already taken or a primary is already registered".to_string(),
            )
        } else {
            RegistryError::Database(err)
        }
    }
}

type Result<T> = std::result::Result<T, RegistryError>;

/// Handle to the node registry
#[derive(Clone)]
pub struct NodeRegistry {
    pool: SqlitePool,
}

impl NodeRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =============================================================================
    // Reads
    // =============================================================================

    pub async fn get(&self, id: &str) -> Result<Node> {
        node_repository::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    pub async fn find(&self, id: &str) -> Result<Option<Node>> {
        Ok(node_repository::find_by_id(&self.pool, id).await?)
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Node>> {
        Ok(node_repository::find_by_name(&self.pool, name).await?)
    }

    /// All nodes, primary first
    pub async fn list(&self) -> Result<Vec<Node>> {
        Ok(node_repository::list_all(&self.pool).await?)
    }

    // =============================================================================
    // Writes
    // =============================================================================

    /// Insert a new node
    pub async fn create(&self, node: Node) -> Result<Node> {
        validate_node(&node)?;

        let mut tx = self.pool.begin().await?;
        if node_repository::find_by_id(&mut *tx, &node.id).await?.is_some() {
            return Err(RegistryError::Validation(format!(
                "node {} already exists",
                node.id
            )));
        }
        check_invariants(&mut tx, &node).await?;
        node_repository::insert(&mut *tx, &node).await?;
        tx.commit().await?;

        tracing::info!("Node created: {} ({})", node.id, node.name);
        Ok(node)
    }

    /// Replace an existing node's configuration
    ///
    /// `last_seen` and any status short of an enable/disable come from the
    /// row read in the same transaction, never from the caller's copy.
    pub async fn update(&self, node: Node) -> Result<Node> {
        let mut tx = self.pool.begin().await?;
        let current = node_repository::find_by_id(&mut *tx, &node.id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(node.id.clone()))?;
        let node = save_update(&mut tx, &current, node).await?;
        tx.commit().await?;

        Ok(node)
    }

    /// Remove a node
    ///
    /// Jobs and apps referring to it are left alone; later lookups of the
    /// node simply fail with not found.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let node = node_repository::find_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        if node.is_primary {
            return Err(RegistryError::Validation(
                "the primary node cannot be removed".to_string(),
            ));
        }

        node_repository::delete(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!("Node removed: {} ({})", node.id, node.name);
        Ok(())
    }

    /// Manual membership: build a node from a user request and insert it
    pub async fn add(&self, req: CreateNode) -> Result<Node> {
        let id = req
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let node = Node::new(
            id,
            req.name.trim(),
            req.api_endpoint.trim_end_matches('/'),
            req.api_key,
            req.is_primary,
        );
        self.create(node).await
    }

    /// Partial update requested by a user
    pub async fn apply_update(&self, id: &str, req: UpdateNode) -> Result<Node> {
        let mut tx = self.pool.begin().await?;
        let current = node_repository::find_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        let mut node = current.clone();
        if let Some(name) = req.name {
            node.name = name.trim().to_string();
        }
        if let Some(api_endpoint) = req.api_endpoint {
            node.api_endpoint = api_endpoint.trim_end_matches('/').to_string();
        }
        if let Some(api_key) = req.api_key {
            node.api_key = api_key;
        }
        if let Some(status) = req.status {
            node.status = status;
        }

        let node = save_update(&mut tx, &current, node).await?;
        tx.commit().await?;

        Ok(node)
    }

    /// Registration handshake from a secondary
    ///
    /// Idempotent on the node id: a known node is updated in place and marked
    /// online. A new id under a name another node already uses is rejected.
    pub async fn register(&self, req: RegisterNode) -> Result<Node> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let node = match node_repository::find_by_id(&mut *tx, &req.id).await? {
            Some(mut existing) => {
                if existing.is_primary {
                    return Err(RegistryError::Validation(
                        "cannot register over the primary node".to_string(),
                    ));
                }
                existing.name = req.name.trim().to_string();
                existing.api_endpoint = req.api_endpoint.trim_end_matches('/').to_string();
                existing.api_key = req.api_key;
                if existing.status != NodeStatus::Offline {
                    existing.status = NodeStatus::Online;
                }
                existing.last_seen = Some(now);
                existing.updated_at = now;

                validate_node(&existing)?;
                check_invariants(&mut tx, &existing).await?;
                node_repository::update(&mut *tx, &existing).await?;
                existing
            }
            None => {
                let mut node = Node::new(
                    req.id,
                    req.name.trim(),
                    req.api_endpoint.trim_end_matches('/'),
                    req.api_key,
                    false,
                );
                node.status = NodeStatus::Online;
                node.last_seen = Some(now);

                validate_node(&node)?;
                check_invariants(&mut tx, &node).await?;
                node_repository::insert(&mut *tx, &node).await?;
                node
            }
        };
        tx.commit().await?;

        tracing::info!("Node registered: {} ({}) at {}", node.id, node.name, node.api_endpoint);
        Ok(node)
    }

    /// Insert or refresh this process's own entry at startup
    ///
    /// The entry is marked online: a running process is its own proof of life.
    pub async fn ensure_self(&self, mut node: Node) -> Result<Node> {
        validate_node(&node)?;
        let now = Utc::now();
        node.status = NodeStatus::Online;
        node.last_seen = Some(now);
        node.updated_at = now;

        let mut tx = self.pool.begin().await?;
        let existing = node_repository::find_by_id(&mut *tx, &node.id).await?;
        if let Some(existing) = &existing {
            node.created_at = existing.created_at;
        }
        check_invariants(&mut tx, &node).await?;
        match existing {
            Some(_) => {
                node_repository::update(&mut *tx, &node).await?;
            }
            None => node_repository::insert(&mut *tx, &node).await?,
        }
        tx.commit().await?;

        Ok(node)
    }

    // =============================================================================
    // Liveness
    // =============================================================================

    /// Accept a heartbeat from a registered node
    pub async fn record_heartbeat(&self, id: &str) -> Result<()> {
        if !node_repository::record_seen(&self.pool, id, Utc::now()).await? {
            // Either unknown, or administratively offline
            self.get(id).await?;
        }
        Ok(())
    }

    /// Successful probe: `online`, `last_seen = now` (offline nodes untouched)
    pub async fn record_seen(&self, id: &str) -> Result<bool> {
        Ok(node_repository::record_seen(&self.pool, id, Utc::now()).await?)
    }

    /// Failed probe: `unreachable` (offline nodes untouched)
    pub async fn mark_unreachable(&self, id: &str) -> Result<bool> {
        Ok(node_repository::mark_unreachable(&self.pool, id).await?)
    }
}

fn validate_node(node: &Node) -> Result<()> {
    validate_identifier("node id", &node.id).map_err(RegistryError::Validation)?;

    if node.name.trim().is_empty() {
        return Err(RegistryError::Validation("node name cannot be empty".to_string()));
    }

    if !(node.api_endpoint.starts_with("http://") || node.api_endpoint.starts_with("https://")) {
        return Err(RegistryError::Validation(
            "api_endpoint must start with http:// or https://".to_string(),
        ));
    }

    if node.api_key.is_empty() {
        return Err(RegistryError::Validation("api_key cannot be empty".to_string()));
    }

    Ok(())
}

/// Write a user-side change over `current`, keeping its liveness fields
async fn save_update(conn: &mut SqliteConnection, current: &Node, mut node: Node) -> Result<Node> {
    validate_node(&node)?;
    node.status = admin_status(current.status, node.status);
    node.last_seen = current.last_seen;
    node.created_at = current.created_at;
    node.updated_at = Utc::now();

    check_invariants(&mut *conn, &node).await?;
    node_repository::update(&mut *conn, &node).await?;
    Ok(node)
}

/// Users only switch a node offline or back on; everything else belongs to
/// heartbeats and health checks. Re-enabled nodes start out `unknown`.
fn admin_status(current: NodeStatus, requested: NodeStatus) -> NodeStatus {
    match (current, requested) {
        (_, NodeStatus::Offline) => NodeStatus::Offline,
        (NodeStatus::Offline, _) => NodeStatus::Unknown,
        (current, _) => current,
    }
}

/// Reject a write that would introduce a second primary or a name collision
async fn check_invariants(conn: &mut SqliteConnection, node: &Node) -> Result<()> {
    if let Some(existing) = node_repository::find_by_name(&mut *conn, &node.name).await? {
        if existing.id != node.id {
            return Err(RegistryError::Validation(format!(
                "node name '{}' is already used by node {}",
                node.name, existing.id
            )));
        }
    }

    if node.is_primary {
        if let Some(primary) = node_repository::find_primary(&mut *conn).await? {
            if primary.id != node.id {
                return Err(RegistryError::Validation(format!(
                    "node {} is already the primary",
                    primary.id
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn node(id: &str, name: &str, is_primary: bool) -> Node {
        Node::new(id, name, format!("http://{}:7300", name), "key", is_primary)
    }

    fn registration(id: &str, name: &str) -> RegisterNode {
        RegisterNode {
            id: id.to_string(),
            name: name.to_string(),
            api_endpoint: format!("http://{}:7300", name),
            api_key: format!("{}-key", id),
        }
    }

    #[tokio::test]
    async fn test_lookup_by_name() {
        let registry = NodeRegistry::new(test_pool().await);
        registry.create(node("n1", "alpha", false)).await.unwrap();

        let found = registry.get_by_name("alpha").await.unwrap().unwrap();
        assert_eq!(found.id, "n1");
        assert!(registry.get_by_name("beta").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_primary_is_rejected() {
        let registry = NodeRegistry::new(test_pool().await);
        registry.create(node("p1", "alpha", true)).await.unwrap();

        let err = registry.create(node("p2", "beta", true)).await.unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));

        // promoting an existing secondary is rejected too
        let secondary = registry.create(node("s1", "gamma", false)).await.unwrap();
        let promoted = Node {
            is_primary: true,
            ..secondary
        };
        let err = registry.update(promoted).await.unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));

        let primaries = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.is_primary)
            .count();
        assert_eq!(primaries, 1);
    }

    #[tokio::test]
    async fn test_name_collision_with_other_id_is_rejected() {
        let registry = NodeRegistry::new(test_pool().await);
        registry.create(node("a", "worker", false)).await.unwrap();

        let err = registry.create(node("b", "worker", false)).await.unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));

        let err = registry.register(registration("c", "worker")).await.unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));
    }

    #[tokio::test]
    async fn test_register_is_idempotent_on_id() {
        let registry = NodeRegistry::new(test_pool().await);

        let first = registry.register(registration("s1", "worker-1")).await.unwrap();
        assert_eq!(first.status, NodeStatus::Online);
        assert!(!first.is_primary);

        let mut again = registration("s1", "worker-1");
        again.api_endpoint = "http://10.0.0.9:7300/".to_string();
        let second = registry.register(again).await.unwrap();

        assert_eq!(second.api_endpoint, "http://10.0.0.9:7300");
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_liveness_never_overrides_offline() {
        let registry = NodeRegistry::new(test_pool().await);
        registry.register(registration("s1", "worker-1")).await.unwrap();

        let disabled = registry
            .apply_update(
                "s1",
                UpdateNode {
                    status: Some(NodeStatus::Offline),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(disabled.status, NodeStatus::Offline);

        registry.record_heartbeat("s1").await.unwrap();
        assert!(!registry.record_seen("s1").await.unwrap());
        assert!(!registry.mark_unreachable("s1").await.unwrap());
        assert_eq!(registry.get("s1").await.unwrap().status, NodeStatus::Offline);

        let enabled = registry
            .apply_update(
                "s1",
                UpdateNode {
                    status: Some(NodeStatus::Online),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(enabled.status, NodeStatus::Unknown);
    }

    #[tokio::test]
    async fn test_health_outcomes_update_status() {
        let registry = NodeRegistry::new(test_pool().await);
        registry.create(node("s1", "worker-1", false)).await.unwrap();

        assert!(registry.record_seen("s1").await.unwrap());
        let seen = registry.get("s1").await.unwrap();
        assert_eq!(seen.status, NodeStatus::Online);
        assert!(seen.last_seen.is_some());

        assert!(registry.mark_unreachable("s1").await.unwrap());
        let lost = registry.get("s1").await.unwrap();
        assert_eq!(lost.status, NodeStatus::Unreachable);
        assert_eq!(lost.last_seen, seen.last_seen);
    }

    #[tokio::test]
    async fn test_update_from_stale_copy_keeps_health_outcome() {
        let registry = NodeRegistry::new(test_pool().await);
        registry.create(node("w", "worker", false)).await.unwrap();
        registry.record_seen("w").await.unwrap();

        let stale = registry.get("w").await.unwrap();
        assert!(registry.mark_unreachable("w").await.unwrap());

        let renamed = registry
            .update(Node {
                name: "worker-renamed".to_string(),
                ..stale.clone()
            })
            .await
            .unwrap();
        assert_eq!(renamed.status, NodeStatus::Unreachable);

        let stored = registry.get("w").await.unwrap();
        assert_eq!(stored.name, "worker-renamed");
        assert_eq!(stored.status, NodeStatus::Unreachable);
        assert_eq!(stored.last_seen, stale.last_seen);
    }

    #[tokio::test]
    async fn test_partial_update_leaves_liveness_alone() {
        let registry = NodeRegistry::new(test_pool().await);
        registry.create(node("w", "worker", false)).await.unwrap();
        registry.record_seen("w").await.unwrap();
        let seen = registry.get("w").await.unwrap().last_seen;
        registry.mark_unreachable("w").await.unwrap();

        let updated = registry
            .apply_update(
                "w",
                UpdateNode {
                    api_key: Some("rotated".to_string()),
                    status: Some(NodeStatus::Online),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.api_key, "rotated");
        assert_eq!(updated.status, NodeStatus::Unreachable);
        assert_eq!(registry.get("w").await.unwrap().last_seen, seen);
    }

    #[tokio::test]
    async fn test_heartbeat_from_unknown_node_is_not_found() {
        let registry = NodeRegistry::new(test_pool().await);
        let err = registry.record_heartbeat("ghost").await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_primary_cannot_be_deleted() {
        let registry = NodeRegistry::new(test_pool().await);
        registry.ensure_self(node("p1", "alpha", true)).await.unwrap();
        registry.create(node("s1", "beta", false)).await.unwrap();

        assert!(matches!(
            registry.delete("p1").await.unwrap_err(),
            RegistryError::Validation(_)
        ));
        registry.delete("s1").await.unwrap();
        assert!(matches!(
            registry.delete("s1").await.unwrap_err(),
            RegistryError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_ensure_self_is_repeatable() {
        let registry = NodeRegistry::new(test_pool().await);
        let first = registry.ensure_self(node("p1", "alpha", true)).await.unwrap();
        let second = registry.ensure_self(node("p1", "alpha", true)).await.unwrap();

        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.status, NodeStatus::Online);
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }
}

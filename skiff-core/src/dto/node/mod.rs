//! Node DTOs
//!
//! Data transfer objects for membership, registration and liveness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::node::{Node, NodeStatus};

/// Registration handshake sent by a secondary to the primary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterNode {
    pub id: String,
    pub name: String,
    pub api_endpoint: String,
    pub api_key: String,
}

/// Manual membership request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNode {
    /// Generated when absent
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub api_endpoint: String,
    pub api_key: String,
    #[serde(default)]
    pub is_primary: bool,
}

/// Partial update of a node
///
/// `status` only accepts administrative changes: `offline` disables the
/// node, anything else re-enables it into `unknown`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateNode {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub api_endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub status: Option<NodeStatus>,
}

/// Node as shown to users (credentials stripped)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSummary {
    pub id: String,
    pub name: String,
    pub api_endpoint: String,
    pub is_primary: bool,
    pub status: NodeStatus,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Node> for NodeSummary {
    fn from(node: Node) -> Self {
        NodeSummary {
            id: node.id,
            name: node.name,
            api_endpoint: node.api_endpoint,
            is_primary: node.is_primary,
            status: node.status,
            last_seen: node.last_seen,
            created_at: node.created_at,
        }
    }
}

/// Outcome of an on-demand health probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeHealth {
    pub node_id: String,
    pub status: NodeStatus,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// Phase of a secondary's heartbeat loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeartbeatPhase {
    /// Not started (not registered yet, or this node is the primary)
    Idle,
    /// Heartbeats are succeeding at the steady interval
    Steady,
    /// Recent heartbeats failed; waiting with exponential backoff
    Backoff,
}

/// Read-only view of a heartbeat loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatSnapshot {
    pub phase: HeartbeatPhase,
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
    /// Number of times a success followed one or more failures
    pub reconnects: u64,
}

impl Default for HeartbeatSnapshot {
    fn default() -> Self {
        Self {
            phase: HeartbeatPhase::Idle,
            consecutive_failures: 0,
            last_success: None,
            reconnects: 0,
        }
    }
}

/// Where a secondary's auto-registration stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum RegistrationState {
    /// No registration token configured (or this node is the primary)
    Disabled,
    Pending,
    Registered,
    GaveUp { attempts: u32 },
}

/// What a node reports about itself on `GET /status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatusReport {
    pub node_id: String,
    pub name: String,
    pub is_primary: bool,
    pub version: String,
    pub registration: RegistrationState,
    pub heartbeat: HeartbeatSnapshot,
}

//! Node domain model
//!
//! Represents a cluster member: the single primary or one of its secondaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A cluster member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Stable identifier, caller supplied or generated
    pub id: String,

    /// Unique human-facing name
    pub name: String,

    /// Base URL of the node's API (e.g. "http://10.0.0.12:7300")
    pub api_endpoint: String,

    /// Shared secret other nodes present when calling this node
    pub api_key: String,

    /// Whether this is the node every other node registers with
    pub is_primary: bool,

    /// Last known liveness state
    pub status: NodeStatus,

    /// Last successful heartbeat or health check
    pub last_seen: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// A freshly registered node that has not been observed yet
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        api_endpoint: impl Into<String>,
        api_key: impl Into<String>,
        is_primary: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            api_endpoint: api_endpoint.into(),
            api_key: api_key.into(),
            is_primary,
            status: NodeStatus::Unknown,
            last_seen: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether requests may be forwarded to this node.
    ///
    /// Nodes an operator disabled and nodes the liveness subsystem last saw
    /// as unreachable are skipped; nodes never probed yet are attempted.
    pub fn is_routable(&self) -> bool {
        matches!(self.status, NodeStatus::Online | NodeStatus::Unknown)
    }
}

/// Liveness status of a node
///
/// `Unknown -> Online <-> Unreachable` is driven by heartbeats and health
/// checks. `Offline` is administrative and never set or cleared by liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Registered but not yet observed
    Unknown,

    /// Last heartbeat or health check succeeded
    Online,

    /// Last health check failed
    Unreachable,

    /// Disabled by an operator
    Offline,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Unknown => "unknown",
            NodeStatus::Online => "online",
            NodeStatus::Unreachable => "unreachable",
            NodeStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(NodeStatus::Unknown),
            "online" => Ok(NodeStatus::Online),
            "unreachable" => Ok(NodeStatus::Unreachable),
            "offline" => Ok(NodeStatus::Offline),
            other => Err(format!("unknown node status '{}'", other)),
        }
    }
}

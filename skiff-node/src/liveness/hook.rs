//! Reconnect hook
//!
//! Called by the heartbeat loop when the primary answers again after one or
//! more failed heartbeats. State reconciliation after a partition plugs in
//! here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct ReconnectEvent {
    pub node_id: String,
    /// Consecutive failures before this success
    pub failed_heartbeats: u32,
    /// Reconnects so far, this one included
    pub reconnects: u64,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait ReconnectHook: Send + Sync {
    async fn on_reconnect(&self, event: &ReconnectEvent);
}

/// Default policy: record the event and change nothing
///
/// The primary's registry already turns the node back online on the
/// heartbeat that triggered the hook.
pub struct LogReconnectHook;

#[async_trait]
impl ReconnectHook for LogReconnectHook {
    async fn on_reconnect(&self, event: &ReconnectEvent) {
        tracing::info!(
            "Node {} reconnected to primary after {} failed heartbeat(s) (reconnect #{})",
            event.node_id,
            event.failed_heartbeats,
            event.reconnects
        );
    }
}

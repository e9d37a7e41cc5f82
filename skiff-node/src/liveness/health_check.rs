//! Health checks (primary -> every node)
//!
//! On each tick every node that is not administratively offline is probed
//! concurrently on `GET /health`. Success marks it online, failure marks it
//! unreachable; nodes are never removed here.

use chrono::Utc;
use futures_util::future::join_all;
use reqwest::Client;
use skiff_client::NodeClient;
use skiff_core::domain::node::{Node, NodeStatus};
use skiff_core::dto::node::NodeHealth;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::service::{NodeRegistry, RegistryError};

/// Probes nodes and records the outcome in the registry
#[derive(Clone)]
pub struct HealthProber {
    node_id: String,
    registry: NodeRegistry,
    http: Client,
}

impl HealthProber {
    /// Every probe is bounded by `probe_timeout`
    pub fn new(
        node_id: impl Into<String>,
        registry: NodeRegistry,
        probe_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(probe_timeout).build()?;
        Ok(Self {
            node_id: node_id.into(),
            registry,
            http,
        })
    }

    /// Probe `node` without recording anything
    ///
    /// This node is answered for without a network hop.
    pub async fn probe(&self, node: &Node) -> NodeHealth {
        if node.id == self.node_id {
            return NodeHealth {
                node_id: node.id.clone(),
                status: NodeStatus::Online,
                latency_ms: Some(0),
                error: None,
                checked_at: Utc::now(),
            };
        }

        let started = Instant::now();
        let client = NodeClient::with_client(&node.api_endpoint, self.http.clone());
        let outcome = client.health().await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => NodeHealth {
                node_id: node.id.clone(),
                status: NodeStatus::Online,
                latency_ms: Some(latency_ms),
                error: None,
                checked_at: Utc::now(),
            },
            Err(e) => NodeHealth {
                node_id: node.id.clone(),
                status: NodeStatus::Unreachable,
                latency_ms: None,
                error: Some(e.to_string()),
                checked_at: Utc::now(),
            },
        }
    }

    /// Probe `node` and record the outcome
    ///
    /// Offline nodes are probed but keep their status.
    pub async fn check(&self, node: &Node) -> Result<NodeHealth, RegistryError> {
        let mut health = self.probe(node).await;

        match health.status {
            NodeStatus::Online => {
                self.registry.record_seen(&node.id).await?;
            }
            _ => {
                warn!(
                    "Node {} failed health check: {}",
                    node.id,
                    health.error.as_deref().unwrap_or("unknown error")
                );
                self.registry.mark_unreachable(&node.id).await?;
            }
        }

        if node.status == NodeStatus::Offline {
            health.status = NodeStatus::Offline;
        }
        Ok(health)
    }

    /// Check every node that is not offline; returns how many were online
    pub async fn check_all(&self) -> Result<usize, RegistryError> {
        let nodes: Vec<Node> = self
            .registry
            .list()
            .await?
            .into_iter()
            .filter(|node| node.status != NodeStatus::Offline)
            .collect();

        let results = join_all(nodes.iter().map(|node| self.check(node))).await;

        let mut online = 0;
        for (node, result) in nodes.iter().zip(results) {
            match result {
                Ok(health) if health.status == NodeStatus::Online => online += 1,
                Ok(_) => {}
                Err(e) => error!("Failed to record health of node {}: {}", node.id, e),
            }
        }

        debug!("Health check: {}/{} node(s) online", online, nodes.len());
        Ok(online)
    }
}

/// Periodic health check loop run by the primary
pub struct HealthChecker {
    prober: HealthProber,
    interval: Duration,
}

impl HealthChecker {
    pub fn new(prober: HealthProber, interval: Duration) -> Self {
        Self { prober, interval }
    }

    /// Check once immediately, then on every tick until `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Starting health checks (interval: {:?})", self.interval);

        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = shutdown.cancelled() => break,
            }

            tokio::select! {
                result = self.prober.check_all() => {
                    if let Err(e) = result {
                        error!("Health check cycle failed: {}", e);
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }

        info!("Health check loop stopped");
    }
}

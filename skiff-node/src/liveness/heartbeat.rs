//! Heartbeat loop (secondary -> primary)
//!
//! Steady interval while heartbeats succeed; after `k` consecutive failures
//! the next attempt waits `min(backoff_max, backoff_initial * 2^k)`. The first
//! success after failures resets the interval and fires the reconnect hook
//! exactly once.

use chrono::{DateTime, Utc};
use skiff_client::NodeClient;
use skiff_core::backoff::heartbeat_backoff;
use skiff_core::dto::node::{HeartbeatPhase, HeartbeatSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::hook::{ReconnectEvent, ReconnectHook};
use crate::config::Config;

#[derive(Debug, Clone, Copy)]
pub struct HeartbeatSettings {
    pub interval: Duration,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

impl HeartbeatSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.heartbeat_interval,
            backoff_initial: config.heartbeat_backoff_initial,
            backoff_max: config.heartbeat_backoff_max,
        }
    }
}

/// State machine of the loop: idle until the first attempt, then steady or
/// backing off
#[derive(Debug, Clone, Default)]
pub struct HeartbeatState {
    started: bool,
    consecutive_failures: u32,
    last_success: Option<DateTime<Utc>>,
    reconnects: u64,
}

impl HeartbeatState {
    /// Returns the number of failures this success ends, if it ends any
    pub fn record_success(&mut self, at: DateTime<Utc>) -> Option<u32> {
        self.started = true;
        self.last_success = Some(at);

        let failures = std::mem::take(&mut self.consecutive_failures);
        if failures == 0 {
            return None;
        }
        self.reconnects += 1;
        Some(failures)
    }

    pub fn record_failure(&mut self) {
        self.started = true;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }

    /// Wait before the next attempt
    pub fn next_wait(&self, settings: &HeartbeatSettings) -> Duration {
        if self.consecutive_failures == 0 {
            settings.interval
        } else {
            heartbeat_backoff(
                settings.backoff_initial,
                settings.backoff_max,
                self.consecutive_failures,
            )
        }
    }

    pub fn snapshot(&self) -> HeartbeatSnapshot {
        let phase = if !self.started {
            HeartbeatPhase::Idle
        } else if self.consecutive_failures > 0 {
            HeartbeatPhase::Backoff
        } else {
            HeartbeatPhase::Steady
        };

        HeartbeatSnapshot {
            phase,
            consecutive_failures: self.consecutive_failures,
            last_success: self.last_success,
            reconnects: self.reconnects,
        }
    }
}

pub struct HeartbeatLoop {
    node_id: String,
    /// Client for the primary, carrying this node's peer credentials
    primary: NodeClient,
    settings: HeartbeatSettings,
    hook: Arc<dyn ReconnectHook>,
    snapshot: watch::Sender<HeartbeatSnapshot>,
}

impl HeartbeatLoop {
    pub fn new(
        node_id: impl Into<String>,
        primary: NodeClient,
        settings: HeartbeatSettings,
        hook: Arc<dyn ReconnectHook>,
        snapshot: watch::Sender<HeartbeatSnapshot>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            primary,
            settings,
            hook,
            snapshot,
        }
    }

    /// Beat until `shutdown` fires; the first heartbeat goes out immediately
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            "Starting heartbeat to {} (interval: {:?})",
            self.primary.base_url(),
            self.settings.interval
        );

        let mut state = HeartbeatState::default();

        loop {
            let wait = tokio::select! {
                wait = self.beat(&mut state) => wait,
                _ = shutdown.cancelled() => break,
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        info!("Heartbeat loop stopped");
    }

    /// One attempt; returns the wait before the next one
    async fn beat(&self, state: &mut HeartbeatState) -> Duration {
        match self.primary.send_heartbeat(&self.node_id).await {
            Ok(()) => {
                debug!("Heartbeat accepted");
                if let Some(failed_heartbeats) = state.record_success(Utc::now()) {
                    let event = ReconnectEvent {
                        node_id: self.node_id.clone(),
                        failed_heartbeats,
                        reconnects: state.reconnects(),
                        at: Utc::now(),
                    };
                    self.snapshot.send_replace(state.snapshot());
                    self.hook.on_reconnect(&event).await;
                }
            }
            Err(e) => {
                state.record_failure();
                warn!(
                    "Heartbeat failed ({} in a row): {}",
                    state.consecutive_failures(),
                    e
                );
            }
        }

        self.snapshot.send_replace(state.snapshot());
        let wait = state.next_wait(&self.settings);
        debug!("Next heartbeat in {:?}", wait);
        wait
    }
}

//! End-to-end liveness: heartbeats and health checks together detect a
//! partition and its recovery.

mod common;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use common::*;
use skiff_core::domain::node::NodeStatus;
use skiff_node::liveness::{ReconnectEvent, ReconnectHook};
use skiff_node::service::NodeRegistry;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
struct CountingHook {
    reconnects: AtomicUsize,
}

#[async_trait]
impl ReconnectHook for CountingHook {
    async fn on_reconnect(&self, _event: &ReconnectEvent) {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Answers 503 to everything while the flag is set
async fn partition_all(
    State(partitioned): State<Arc<AtomicBool>>,
    request: Request,
    next: Next,
) -> Response {
    if partitioned.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    next.run(request).await
}

/// Answers 503 to heartbeats while the flag is set
async fn partition_heartbeats(
    State(partitioned): State<Arc<AtomicBool>>,
    request: Request,
    next: Next,
) -> Response {
    if partitioned.load(Ordering::SeqCst) && request.uri().path().ends_with("/heartbeat") {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    next.run(request).await
}

async fn wait_for_status(registry: &NodeRegistry, id: &str, status: NodeStatus) -> bool {
    wait_until(Duration::from_secs(5), || async move {
        matches!(registry.find(id).await, Ok(Some(node)) if node.status == status)
    })
    .await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_partition_is_detected_and_heals_with_one_reconnect() {
    let partitioned = Arc::new(AtomicBool::new(false));

    let flag = partitioned.clone();
    let primary = spawn_node_with(
        primary_config("primary"),
        Spawn {
            background: true,
            wrap: Box::new(move |router| {
                router.layer(middleware::from_fn_with_state(flag, partition_heartbeats))
            }),
            ..Default::default()
        },
    )
    .await;

    let hook = Arc::new(CountingHook::default());
    let reconnect_hook = hook.clone();
    let flag = partitioned.clone();
    let mut config = secondary_config("worker-1", &primary.url);
    config.registration_token = Some(REGISTRATION_TOKEN.to_string());
    let worker = spawn_node_with(
        config,
        Spawn {
            background: true,
            bootstrap: Box::new(move |bootstrap| bootstrap.with_reconnect_hook(reconnect_hook)),
            wrap: Box::new(move |router| {
                router.layer(middleware::from_fn_with_state(flag, partition_all))
            }),
        },
    )
    .await;

    let registry = &primary.state.registry;

    // Registered, and the heartbeat marks it online
    assert!(wait_for_status(registry, "worker-1", NodeStatus::Online).await);
    assert_eq!(hook.reconnects.load(Ordering::SeqCst), 0);

    // Cut both directions: the next health check marks it unreachable
    partitioned.store(true, Ordering::SeqCst);
    assert!(wait_for_status(registry, "worker-1", NodeStatus::Unreachable).await);

    let heartbeat = worker.state.heartbeat.clone();
    let failing = wait_until(Duration::from_secs(5), || {
        let heartbeat = heartbeat.clone();
        async move {
            let failures = heartbeat.borrow().consecutive_failures;
            failures > 0
        }
    })
    .await;
    assert!(failing, "heartbeats kept succeeding through the partition");

    // Heal: back online, and exactly one reconnect is flagged
    partitioned.store(false, Ordering::SeqCst);
    assert!(wait_for_status(registry, "worker-1", NodeStatus::Online).await);

    let counter = &hook.reconnects;
    let reconnected = wait_until(Duration::from_secs(5), || async move {
        counter.load(Ordering::SeqCst) == 1
    })
    .await;
    assert!(reconnected, "reconnect hook never fired");

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(hook.reconnects.load(Ordering::SeqCst), 1);

    let snapshot = worker.state.heartbeat.borrow().clone();
    assert_eq!(snapshot.reconnects, 1);
    assert_eq!(snapshot.consecutive_failures, 0);
    assert_eq!(
        primary.state.registry.get("worker-1").await.unwrap().status,
        NodeStatus::Online
    );
}

//! Shared helpers for the node integration tests
//!
//! Every test node runs the real router on `127.0.0.1:0` with its own
//! in-memory database and a runtime that never touches docker.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use skiff_client::{Credentials, NodeClient};
use skiff_node::runtime::{AppRuntime, ComposeProject};
use skiff_node::state::AppState;
use skiff_node::{Bootstrap, Config, Role};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub const USER_TOKEN: &str = "user-token";
pub const GATEWAY_KEY: &str = "gateway-key";
pub const REGISTRATION_TOKEN: &str = "registration-token";

/// Succeeds at every operation without doing anything
pub struct NoopRuntime;

#[async_trait]
impl AppRuntime for NoopRuntime {
    async fn up(&self, _project: &ComposeProject) -> anyhow::Result<()> {
        Ok(())
    }

    async fn down(&self, _project: &ComposeProject) -> anyhow::Result<()> {
        Ok(())
    }

    async fn restart(&self, _project: &ComposeProject) -> anyhow::Result<()> {
        Ok(())
    }

    async fn build(&self, _project: &ComposeProject) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Fast intervals, in-memory storage, known secrets
pub fn config(node_id: &str, role: Role) -> Config {
    let mut config = Config::new(node_id.to_string(), role);
    config.api_key = format!("{}-key", node_id);
    config.database_url = "sqlite::memory:".to_string();
    config.user_token = Some(USER_TOKEN.to_string());
    config.gateway_api_key = Some(GATEWAY_KEY.to_string());
    config.health_check_interval = Duration::from_millis(100);
    config.heartbeat_interval = Duration::from_millis(100);
    config.heartbeat_backoff_initial = Duration::from_millis(50);
    config.heartbeat_backoff_max = Duration::from_millis(200);
    config.registration_backoff = Duration::from_millis(10);
    config.job_poll_interval = Duration::from_millis(20);
    config.forward_timeout = Duration::from_secs(2);
    config.probe_timeout = Duration::from_secs(1);
    config
}

pub fn primary_config(node_id: &str) -> Config {
    let mut config = config(node_id, Role::Primary);
    config.registration_token = Some(REGISTRATION_TOKEN.to_string());
    config
}

pub fn secondary_config(node_id: &str, primary_url: &str) -> Config {
    let mut config = config(node_id, Role::Secondary);
    config.primary_url = Some(primary_url.to_string());
    config
}

/// A node serving HTTP until dropped
pub struct TestNode {
    pub url: String,
    pub state: AppState,
    shutdown: CancellationToken,
}

impl TestNode {
    pub fn id(&self) -> &str {
        &self.state.config.node_id
    }

    pub fn api_key(&self) -> &str {
        &self.state.config.api_key
    }

    /// Client authenticated as a user
    pub fn user(&self) -> NodeClient {
        NodeClient::new(&self.url).with_credentials(Credentials::user(USER_TOKEN))
    }

    pub fn http(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }
}

impl Drop for TestNode {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Options for [`spawn_node_with`]
pub struct Spawn {
    pub background: bool,
    pub bootstrap: Box<dyn FnOnce(Bootstrap) -> Bootstrap + Send>,
    pub wrap: Box<dyn FnOnce(Router) -> Router + Send>,
}

impl Default for Spawn {
    fn default() -> Self {
        Self {
            background: false,
            bootstrap: Box::new(|bootstrap| bootstrap),
            wrap: Box::new(|router| router),
        }
    }
}

/// Serve a node without background loops
pub async fn spawn_node(config: Config) -> TestNode {
    spawn_node_with(config, Spawn::default()).await
}

pub async fn spawn_node_with(mut config: Config, spawn: Spawn) -> TestNode {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    config.api_endpoint = url.clone();

    let bootstrap = Bootstrap::new(config).with_app_runtime(Arc::new(NoopRuntime));
    let node = (spawn.bootstrap)(bootstrap).build().await.unwrap();

    let shutdown = CancellationToken::new();
    if spawn.background {
        node.spawn_background(shutdown.clone()).unwrap();
    }

    let router = (spawn.wrap)(node.router());
    let token = shutdown.clone();
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await
            .unwrap();
    });

    TestNode {
        url,
        state: node.state().clone(),
        shutdown,
    }
}

/// Serve a bare router (a stand-in for another node)
pub async fn spawn_stub(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    url
}

/// A local address nothing listens on
pub async fn dead_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    url
}

/// Poll `condition` every 20ms until it holds or `timeout` passes
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

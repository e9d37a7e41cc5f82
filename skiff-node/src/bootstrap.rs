//! Node wiring
//!
//! Builds every component once from a [`Config`] and hands out the HTTP
//! router and the background loops. The same wiring serves the binary and
//! the integration tests.

use anyhow::Context;
use axum::Router;
use skiff_client::{Credentials, NodeClient};
use skiff_core::domain::node::Node;
use skiff_core::dto::node::{HeartbeatSnapshot, RegisterNode, RegistrationState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api;
use crate::auth::Authenticator;
use crate::config::Config;
use crate::db;
use crate::liveness::{
    HealthChecker, HealthProber, HeartbeatLoop, HeartbeatSettings, LogReconnectHook, Registrar,
    ReconnectHook,
};
use crate::routing::NodeRouter;
use crate::runtime::{AppRuntime, DockerComposeRuntime};
use crate::scheduler::{AppActionExecutor, ExecutorRegistry, JobWorker};
use crate::service::{AppService, JobQueue, NodeRegistry};
use crate::state::AppState;

pub struct Bootstrap {
    config: Config,
    reconnect_hook: Arc<dyn ReconnectHook>,
    runtime: Arc<dyn AppRuntime>,
}

impl Bootstrap {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            reconnect_hook: Arc::new(LogReconnectHook),
            runtime: Arc::new(DockerComposeRuntime::new()),
        }
    }

    /// Called after heartbeats recover from a run of failures
    pub fn with_reconnect_hook(mut self, hook: Arc<dyn ReconnectHook>) -> Self {
        self.reconnect_hook = hook;
        self
    }

    /// Runtime used by app jobs
    pub fn with_app_runtime(mut self, runtime: Arc<dyn AppRuntime>) -> Self {
        self.runtime = runtime;
        self
    }

    /// Open the database, make sure this node is in its own registry and
    /// wire every component
    pub async fn build(self) -> anyhow::Result<SkiffNode> {
        let config = self.config;
        config.validate().context("Invalid configuration")?;

        info!("Connecting to database...");
        let pool = db::create_pool(&config.database_url)
            .await
            .context("Failed to create database pool")?;
        db::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;

        let registry = NodeRegistry::new(pool.clone());
        registry
            .ensure_self(Node::new(
                config.node_id.clone(),
                config.node_name.clone(),
                config.api_endpoint.clone(),
                config.api_key.clone(),
                config.is_primary(),
            ))
            .await
            .context("Failed to record this node in the registry")?;

        let jobs = JobQueue::new(pool.clone(), config.job_history_limit);
        let interrupted = jobs
            .recover_interrupted()
            .await
            .context("Failed to recover interrupted jobs")?;
        if interrupted > 0 {
            tracing::warn!("Marked {} interrupted job(s) as failed", interrupted);
        }

        let apps = AppService::new(pool, config.node_id.clone(), jobs.clone());

        let mut executors = ExecutorRegistry::new();
        AppActionExecutor::new(apps.clone(), self.runtime, config.apps_dir.clone())
            .register_all(&mut executors);

        let router = NodeRouter::new(
            config.node_id.clone(),
            registry.clone(),
            config.forward_timeout,
        )
        .context("Failed to build forwarding client")?;
        let prober = HealthProber::new(
            config.node_id.clone(),
            registry.clone(),
            config.probe_timeout,
        )
        .context("Failed to build health check client")?;

        let authenticator = Arc::new(Authenticator::new(&config, registry.clone()));
        if config.user_token.is_none() {
            tracing::warn!("SKIFF_USER_TOKEN is not set, user requests are not authenticated");
        }

        let initial = if config.is_primary() || config.registration_token.is_none() {
            RegistrationState::Disabled
        } else {
            RegistrationState::Pending
        };
        let (registration_tx, registration) = watch::channel(initial);
        let (heartbeat_tx, heartbeat) = watch::channel(HeartbeatSnapshot::default());

        let state = AppState {
            config: Arc::new(config),
            registry,
            jobs,
            apps,
            router,
            authenticator,
            prober,
            registration,
            heartbeat,
        };

        Ok(SkiffNode {
            state,
            executors: Arc::new(executors),
            reconnect_hook: self.reconnect_hook,
            registration_tx,
            heartbeat_tx,
        })
    }
}

/// A fully wired node, ready to serve
pub struct SkiffNode {
    state: AppState,
    executors: Arc<ExecutorRegistry>,
    reconnect_hook: Arc<dyn ReconnectHook>,
    registration_tx: watch::Sender<RegistrationState>,
    heartbeat_tx: watch::Sender<HeartbeatSnapshot>,
}

impl SkiffNode {
    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(&self) -> Router {
        api::create_router(self.state.clone())
    }

    /// Start the background loops for this node's role
    ///
    /// Every node runs the job worker. The primary runs health checks; a
    /// secondary registers (when it has a token) and then heartbeats.
    pub fn spawn_background(&self, shutdown: CancellationToken) -> anyhow::Result<Vec<JoinHandle<()>>> {
        let config = &self.state.config;
        let mut handles = Vec::new();

        let worker = JobWorker::new(
            self.state.jobs.clone(),
            self.executors.clone(),
            config.job_poll_interval,
            config.job_timeout,
        );
        handles.push(tokio::spawn(worker.run(shutdown.clone())));

        if config.is_primary() {
            let checker = HealthChecker::new(self.state.prober.clone(), config.health_check_interval);
            handles.push(tokio::spawn(checker.run(shutdown)));
            return Ok(handles);
        }

        let primary_url = config
            .primary_url
            .clone()
            .context("primary_url is required for secondary nodes")?;
        let http = reqwest::Client::builder()
            .timeout(config.probe_timeout)
            .build()
            .context("Failed to build primary client")?;

        let registrar = config.registration_token.as_ref().map(|token| {
            Registrar::new(
                NodeClient::with_client(&primary_url, http.clone())
                    .with_credentials(Credentials::registration(token)),
                RegisterNode {
                    id: config.node_id.clone(),
                    name: config.node_name.clone(),
                    api_endpoint: config.api_endpoint.clone(),
                    api_key: config.api_key.clone(),
                },
                config.registration_attempts,
                config.registration_backoff,
                self.registration_tx.clone(),
            )
        });

        let heartbeat = HeartbeatLoop::new(
            config.node_id.clone(),
            NodeClient::with_client(&primary_url, http)
                .with_credentials(Credentials::node(&config.node_id, &config.api_key)),
            HeartbeatSettings::from_config(config),
            self.reconnect_hook.clone(),
            self.heartbeat_tx.clone(),
        );

        handles.push(tokio::spawn(async move {
            if let Some(registrar) = registrar {
                match registrar.run(&shutdown).await {
                    RegistrationState::Registered => {}
                    // Gave up or shutting down; manual registration is still possible
                    _ => return,
                }
            }
            heartbeat.run(shutdown).await;
        }));

        Ok(handles)
    }

    /// Serve the API until `shutdown` fires
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        info!("Listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .context("HTTP server failed")
    }
}

//! Shared handler state
//!
//! Handles to every component, wired once at startup and cloned into each
//! request.

use skiff_core::dto::node::{HeartbeatSnapshot, RegistrationState};
use std::sync::Arc;
use tokio::sync::watch;

use crate::auth::Authenticator;
use crate::config::Config;
use crate::liveness::HealthProber;
use crate::routing::NodeRouter;
use crate::service::{AppService, JobQueue, NodeRegistry};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: NodeRegistry,
    pub jobs: JobQueue,
    pub apps: AppService,
    pub router: NodeRouter,
    pub authenticator: Arc<Authenticator>,
    pub prober: HealthProber,
    /// Published by the registration attempt (secondaries)
    pub registration: watch::Receiver<RegistrationState>,
    /// Published by the heartbeat loop (secondaries)
    pub heartbeat: watch::Receiver<HeartbeatSnapshot>,
}

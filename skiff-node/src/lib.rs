//! Skiff Node
//!
//! The node daemon of a Skiff cluster. The same binary runs as the primary
//! (membership, health checks) or as a secondary (registration, heartbeats);
//! every node serves the HTTP API, routes calls for resources on other nodes
//! and runs its own job queue.

pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod liveness;
pub mod repository;
pub mod routing;
pub mod runtime;
pub mod scheduler;
pub mod service;
pub mod shutdown;
pub mod state;

pub use bootstrap::{Bootstrap, SkiffNode};
pub use config::{Config, Role};

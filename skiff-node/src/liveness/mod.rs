//! Liveness subsystem
//!
//! Three loops keep the registry's view of the cluster current:
//!
//! - registration: a secondary announces itself to the primary at startup
//! - heartbeat: a secondary keeps pushing proof of life to the primary
//! - health check: the primary keeps polling every registered node
//!
//! Heartbeats and health checks run in opposite directions, so a partition
//! either way is noticed by one of them. Each loop owns its state and only
//! publishes snapshots.

pub mod health_check;
pub mod heartbeat;
pub mod hook;
pub mod registration;

pub use health_check::{HealthChecker, HealthProber};
pub use heartbeat::{HeartbeatLoop, HeartbeatSettings, HeartbeatState};
pub use hook::{LogReconnectHook, ReconnectEvent, ReconnectHook};
pub use registration::Registrar;

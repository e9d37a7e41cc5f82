//! Repository Module
//!
//! Data access layer for the node.
//! Each repository handles database operations for a specific domain entity.
//! Functions take any SQLite executor so services can compose them inside a
//! single transaction.

pub mod app;
pub mod job;
pub mod node;

// Re-export for convenience
pub use app as app_repository;
pub use job as job_repository;
pub use node as node_repository;

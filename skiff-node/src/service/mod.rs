//! Service Module
//!
//! Business logic layer for the node.
//! Services orchestrate between repositories and contain domain logic. Each
//! service is a cheap handle over the connection pool, wired once at startup.

pub mod app;
pub mod job_queue;
pub mod registry;

pub use app::{AppError, AppService};
pub use job_queue::{JobQueue, JobQueueError};
pub use registry::{NodeRegistry, RegistryError};

/// Identifiers end up in URL paths when calls are forwarded, so they are
/// restricted to a path-safe alphabet.
pub(crate) fn validate_identifier(kind: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{} cannot be empty", kind));
    }
    if value.len() > 128 {
        return Err(format!("{} must be at most 128 characters", kind));
    }
    if value == "." || value == ".." {
        return Err(format!("{} cannot be '{}'", kind, value));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(format!(
            "{} may only contain letters, digits, '-', '_' and '.'",
            kind
        ));
    }
    Ok(())
}

/// Whether a database error is a UNIQUE constraint violation
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

//! Job scheduling
//!
//! A single worker claims pending jobs one at a time and hands each to the
//! executor registered for its kind.

pub mod app_executor;
pub mod executor;
pub mod worker;

pub use app_executor::AppActionExecutor;
pub use executor::{ExecutorRegistry, JobExecutor, ProgressReporter};
pub use worker::JobWorker;

//! Job executors
//!
//! An executor performs the actual work behind one or more job kinds and
//! reports progress as it goes.

use async_trait::async_trait;
use skiff_core::domain::job::{Job, JobKind};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::service::{JobQueue, JobQueueError};

#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Run `job` to completion; an error fails the job with its message
    async fn execute(&self, job: &Job, progress: &ProgressReporter) -> anyhow::Result<()>;
}

/// Writes progress of a running job straight to the store
#[derive(Clone)]
pub struct ProgressReporter {
    queue: JobQueue,
    job_id: Uuid,
}

impl ProgressReporter {
    pub fn new(queue: JobQueue, job_id: Uuid) -> Self {
        Self { queue, job_id }
    }

    /// Record `progress` (0..=100) with an optional message
    ///
    /// Lower values than already recorded are ignored.
    pub async fn report(&self, progress: u8, message: &str) -> Result<(), JobQueueError> {
        self.queue
            .report_progress(self.job_id, progress.min(100), Some(message))
            .await?;
        Ok(())
    }
}

/// Job kind -> executor
#[derive(Default, Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<JobKind, Arc<dyn JobExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: JobKind, executor: Arc<dyn JobExecutor>) -> &mut Self {
        self.executors.insert(kind, executor);
        self
    }

    pub fn get(&self, kind: JobKind) -> Option<Arc<dyn JobExecutor>> {
        self.executors.get(&kind).cloned()
    }
}

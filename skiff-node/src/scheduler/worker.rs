//! Job worker
//!
//! Polls the queue on a fixed interval and drains it one job at a time: a
//! second job is never claimed before the first one is terminal. Each job
//! runs in its own task so a panicking executor fails the job, not the
//! worker.

use skiff_core::domain::job::Job;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::executor::{ExecutorRegistry, ProgressReporter};
use crate::service::{JobQueue, JobQueueError};

/// Pause before retrying a terminal status write
const TERMINAL_WRITE_RETRY: Duration = Duration::from_millis(100);

/// How a job run ended
#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Completed,
    Failed(String),
}

pub struct JobWorker {
    queue: JobQueue,
    executors: Arc<ExecutorRegistry>,
    poll_interval: Duration,
    job_timeout: Duration,
}

impl JobWorker {
    pub fn new(
        queue: JobQueue,
        executors: Arc<ExecutorRegistry>,
        poll_interval: Duration,
        job_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            executors,
            poll_interval,
            job_timeout,
        }
    }

    /// Starts the polling loop
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            "Starting job worker (poll interval: {:?}, job timeout: {:?})",
            self.poll_interval, self.job_timeout
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.cancelled() => break,
            }

            match self.drain(&shutdown).await {
                Ok(0) => debug!("No pending jobs"),
                Ok(executed) => info!("Executed {} job(s) this cycle", executed),
                Err(e) => error!("Error during poll cycle: {}", e),
            }
        }

        info!("Job worker stopped");
    }

    /// Run pending jobs until the queue is empty or shutdown fires
    pub async fn drain(&self, shutdown: &CancellationToken) -> Result<usize, JobQueueError> {
        let mut executed = 0;
        while !shutdown.is_cancelled() {
            let Some(job) = self.queue.claim_next().await? else {
                break;
            };
            self.process(job, shutdown).await;
            executed += 1;
        }
        Ok(executed)
    }

    /// Execute a claimed job and record its terminal status
    async fn process(&self, job: Job, shutdown: &CancellationToken) {
        info!("Starting job {} ({} of app {})", job.id, job.kind, job.app_id);

        let outcome = match self.executors.get(job.kind) {
            None => Outcome::Failed(format!(
                "no executor registered for job kind '{}'",
                job.kind
            )),
            Some(executor) => {
                let reporter = ProgressReporter::new(self.queue.clone(), job.id);
                let timeout = self.job_timeout;
                let task_job = job.clone();

                let mut handle = tokio::spawn(async move {
                    tokio::time::timeout(timeout, executor.execute(&task_job, &reporter)).await
                });

                tokio::select! {
                    result = &mut handle => match result {
                        Ok(Ok(Ok(()))) => Outcome::Completed,
                        Ok(Ok(Err(e))) => Outcome::Failed(format!("{:#}", e)),
                        Ok(Err(_elapsed)) => {
                            Outcome::Failed(format!("job timed out after {:?}", timeout))
                        }
                        Err(e) => Outcome::Failed(join_error_message(e)),
                    },
                    _ = shutdown.cancelled() => {
                        handle.abort();
                        Outcome::Failed("interrupted by shutdown".to_string())
                    }
                }
            }
        };

        self.finish(job.id, outcome).await;
    }

    /// Record the terminal status, retrying once
    ///
    /// A completion that cannot be stored is downgraded to a failure so the
    /// job does not stay `running`; if even that write fails, the job is left
    /// for startup recovery.
    async fn finish(&self, id: Uuid, outcome: Outcome) {
        let message = match outcome {
            Outcome::Completed => match self.retry_once(|| self.queue.complete(id)).await {
                Ok(_) => {
                    info!("Job {} completed", id);
                    return;
                }
                Err(e) => {
                    error!("Failed to record completion of job {}: {}", id, e);
                    format!("job finished but its completion could not be recorded: {}", e)
                }
            },
            Outcome::Failed(message) => message,
        };

        match self.retry_once(|| self.queue.fail(id, &message)).await {
            Ok(_) => warn!("Job {} failed: {}", id, message),
            Err(e) => error!("Failed to record failure of job {} ({}): {}", id, message, e),
        }
    }

    async fn retry_once<F, Fut>(&self, mut write: F) -> Result<bool, JobQueueError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, JobQueueError>>,
    {
        match write().await {
            Ok(updated) => Ok(updated),
            Err(e) => {
                warn!("Job status write failed, retrying: {}", e);
                tokio::time::sleep(TERMINAL_WRITE_RETRY).await;
                write().await
            }
        }
    }
}

fn join_error_message(err: JoinError) -> String {
    if err.is_panic() {
        format!("job panicked: {}", panic_message(err.into_panic()))
    } else {
        "job was cancelled".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::scheduler::executor::JobExecutor;
    use async_trait::async_trait;
    use skiff_core::domain::job::{JobKind, JobStatus};
    use std::sync::Mutex;

    /// Reports a few progress steps and records what it ran
    struct Recording {
        ran: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl JobExecutor for Recording {
        async fn execute(&self, job: &Job, progress: &ProgressReporter) -> anyhow::Result<()> {
            progress.report(30, "halfway there").await?;
            progress.report(60, "almost").await?;
            self.ran.lock().unwrap().push(job.app_id.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl JobExecutor for Failing {
        async fn execute(&self, _job: &Job, progress: &ProgressReporter) -> anyhow::Result<()> {
            progress.report(10, "starting").await?;
            anyhow::bail!("compose exited with 1")
        }
    }

    struct Panicking;

    #[async_trait]
    impl JobExecutor for Panicking {
        async fn execute(&self, _job: &Job, _progress: &ProgressReporter) -> anyhow::Result<()> {
            panic!("boom");
        }
    }

    struct Sleeping;

    #[async_trait]
    impl JobExecutor for Sleeping {
        async fn execute(&self, _job: &Job, _progress: &ProgressReporter) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    async fn worker(registry: ExecutorRegistry, job_timeout: Duration) -> (JobWorker, JobQueue) {
        let queue = JobQueue::new(test_pool().await, 50);
        let worker = JobWorker::new(
            queue.clone(),
            Arc::new(registry),
            Duration::from_millis(10),
            job_timeout,
        );
        (worker, queue)
    }

    #[tokio::test]
    async fn test_jobs_run_in_order_and_complete() {
        let recording = Arc::new(Recording {
            ran: Mutex::new(Vec::new()),
        });
        let mut registry = ExecutorRegistry::new();
        registry.register(JobKind::Deploy, recording.clone());
        let (worker, queue) = worker(registry, Duration::from_secs(5)).await;

        let first = queue.enqueue("app-1", "node-1", JobKind::Deploy).await.unwrap();
        let second = queue.enqueue("app-2", "node-1", JobKind::Deploy).await.unwrap();

        let executed = worker.drain(&CancellationToken::new()).await.unwrap();
        assert_eq!(executed, 2);
        assert_eq!(*recording.ran.lock().unwrap(), vec!["app-1", "app-2"]);

        for id in [first.id, second.id] {
            let job = queue.get(id).await.unwrap();
            assert_eq!(job.status, JobStatus::Completed);
            assert_eq!(job.progress, 100);
            assert_eq!(job.progress_message.as_deref(), Some("almost"));
            assert!(job.completed_at.is_some());
        }
    }

    #[tokio::test]
    async fn test_executor_error_fails_job_and_worker_continues() {
        let mut registry = ExecutorRegistry::new();
        registry.register(JobKind::Deploy, Arc::new(Failing));
        registry.register(
            JobKind::Stop,
            Arc::new(Recording {
                ran: Mutex::new(Vec::new()),
            }),
        );
        let (worker, queue) = worker(registry, Duration::from_secs(5)).await;

        let failing = queue.enqueue("app", "node-1", JobKind::Deploy).await.unwrap();
        let next = queue.enqueue("app", "node-1", JobKind::Stop).await.unwrap();

        assert_eq!(worker.drain(&CancellationToken::new()).await.unwrap(), 2);

        let failed = queue.get(failing.id).await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("compose exited with 1"));
        assert_eq!(failed.progress, 10);

        assert_eq!(queue.get(next.id).await.unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_panic_is_caught_at_worker_boundary() {
        let mut registry = ExecutorRegistry::new();
        registry.register(JobKind::Rebuild, Arc::new(Panicking));
        let (worker, queue) = worker(registry, Duration::from_secs(5)).await;

        let job = queue.enqueue("app", "node-1", JobKind::Rebuild).await.unwrap();
        worker.drain(&CancellationToken::new()).await.unwrap();

        let job = queue.get(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("job panicked: boom"));
    }

    #[tokio::test]
    async fn test_missing_executor_fails_job() {
        let (worker, queue) = worker(ExecutorRegistry::new(), Duration::from_secs(5)).await;

        let job = queue.enqueue("app", "node-1", JobKind::Restart).await.unwrap();
        worker.drain(&CancellationToken::new()).await.unwrap();

        let job = queue.get(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.unwrap().contains("restart"));
    }

    #[tokio::test]
    async fn test_timeout_fails_job() {
        let mut registry = ExecutorRegistry::new();
        registry.register(JobKind::Deploy, Arc::new(Sleeping));
        let (worker, queue) = worker(registry, Duration::from_millis(50)).await;

        let job = queue.enqueue("app", "node-1", JobKind::Deploy).await.unwrap();
        worker.drain(&CancellationToken::new()).await.unwrap();

        let job = queue.get(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("job timed out after 50ms"));
    }

    #[tokio::test]
    async fn test_unrecordable_completion_still_ends_the_job() {
        let pool = test_pool().await;
        sqlx::query(
            r#"
            CREATE TRIGGER reject_completion BEFORE UPDATE OF status ON jobs
            WHEN NEW.status = 'completed'
            BEGIN
                SELECT RAISE(ABORT, 'disk full');
            END
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        let queue = JobQueue::new(pool, 50);
        let mut registry = ExecutorRegistry::new();
        registry.register(
            JobKind::Deploy,
            Arc::new(Recording {
                ran: Mutex::new(Vec::new()),
            }),
        );
        let worker = JobWorker::new(
            queue.clone(),
            Arc::new(registry),
            Duration::from_millis(10),
            Duration::from_secs(5),
        );

        let first = queue.enqueue("app-1", "node-1", JobKind::Deploy).await.unwrap();
        let second = queue.enqueue("app-2", "node-1", JobKind::Deploy).await.unwrap();

        // The worker keeps draining after a failed status write
        assert_eq!(worker.drain(&CancellationToken::new()).await.unwrap(), 2);

        for id in [first.id, second.id] {
            let job = queue.get(id).await.unwrap();
            assert_eq!(job.status, JobStatus::Failed);
            assert!(job.error_message.unwrap().contains("disk full"));
        }
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (worker, _queue) = worker(ExecutorRegistry::new(), Duration::from_secs(5)).await;
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker.run(shutdown.clone()));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }
}

//! Worker pool: claims eligible jobs and drives them through the
//! lifecycle.

use crate::dlq::DeadLetterManager;
use crate::error::{JobError, JobResult};
use crate::executor::{CommandExecutor, ExecutionOutcome};
use crate::job::{FailureOutcome, JobRecord};
use crate::metrics::names;
use crate::retry::RetryPolicy;
use crate::store::JobStore;
use ::metrics::counter;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of concurrent workers.
    pub worker_count: usize,

    /// How long an idle worker sleeps before the next claim attempt.
    pub poll_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            poll_interval: Duration::from_millis(2000),
        }
    }
}

/// State shared by every worker task.
struct WorkerContext {
    store: Arc<dyn JobStore>,
    dlq: DeadLetterManager,
    executor: CommandExecutor,
    retry_policy: RetryPolicy,
    poll_interval: Duration,
    jobs_processed: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_dead_lettered: AtomicU64,
}

/// Pool of independent polling workers.
///
/// Each worker loops: claim one eligible job through the store's atomic
/// claim, execute its command as a subprocess, apply the completion or
/// retry/dead-letter transition, repeat. An idle worker sleeps for the
/// poll interval. Workers never block each other outside the store's
/// claim serialization — a hanging command occupies only its own slot.
///
/// Shutdown is cooperative: [`WorkerPool::stop`] signals every worker to
/// stop claiming new work, then waits for in-flight executions to
/// finish. A clean shutdown never leaves a job in `Processing`.
pub struct WorkerPool {
    ctx: Arc<WorkerContext>,
    worker_count: usize,
    shutdown_tx: broadcast::Sender<()>,
    running: AtomicBool,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Creates a pool over the given store.
    pub fn new(
        store: Arc<dyn JobStore>,
        retry_policy: RetryPolicy,
        config: WorkerPoolConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let ctx = Arc::new(WorkerContext {
            dlq: DeadLetterManager::new(store.clone()),
            store,
            executor: CommandExecutor::new(),
            retry_policy,
            poll_interval: config.poll_interval,
            jobs_processed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            jobs_dead_lettered: AtomicU64::new(0),
        });

        Self {
            ctx,
            worker_count: config.worker_count.max(1),
            shutdown_tx,
            running: AtomicBool::new(false),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawns the worker tasks.
    pub fn start(&self) -> JobResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(JobError::Worker("worker pool already running".to_string()));
        }

        info!(
            worker_count = self.worker_count,
            poll_interval_ms = self.ctx.poll_interval.as_millis() as u64,
            "Starting worker pool"
        );

        let mut handles = self.handles.lock();
        for index in 0..self.worker_count {
            let worker_id = format!("worker-{}", index + 1);
            let ctx = self.ctx.clone();
            let shutdown_rx = self.shutdown_tx.subscribe();
            handles.push(tokio::spawn(worker_loop(worker_id, ctx, shutdown_rx)));
        }

        Ok(())
    }

    /// Stops the pool: no new claims, in-flight jobs run to completion.
    pub async fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }

        info!("Stopping worker pool");
        let _ = self.shutdown_tx.send(());

        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.handles.lock();
            guard.drain(..).collect()
        };
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task panicked");
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!(
            processed = self.jobs_processed(),
            failed = self.jobs_failed(),
            dead_lettered = self.jobs_dead_lettered(),
            "Worker pool stopped"
        );
    }

    /// Whether the pool is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of successfully completed jobs.
    pub fn jobs_processed(&self) -> u64 {
        self.ctx.jobs_processed.load(Ordering::Relaxed)
    }

    /// Number of failed executions (including ones later retried).
    pub fn jobs_failed(&self) -> u64 {
        self.ctx.jobs_failed.load(Ordering::Relaxed)
    }

    /// Number of jobs moved to the dead-letter collection.
    pub fn jobs_dead_lettered(&self) -> u64 {
        self.ctx.jobs_dead_lettered.load(Ordering::Relaxed)
    }
}

async fn worker_loop(
    worker_id: String,
    ctx: Arc<WorkerContext>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    info!(worker_id = %worker_id, "Worker started");

    loop {
        let now = Utc::now();
        let claimed = ctx
            .store
            .claim_next(&|job: &JobRecord| job.is_eligible(now))
            .await;

        match claimed {
            Ok(Some(job)) => {
                process_job(&worker_id, &ctx, job).await;

                // Stop claiming once shutdown has been signalled; the job
                // above already ran to completion.
                match shutdown_rx.try_recv() {
                    Err(broadcast::error::TryRecvError::Empty) => {}
                    _ => break,
                }
            }
            Ok(None) => {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    () = tokio::time::sleep(ctx.poll_interval) => {}
                }
            }
            Err(e) => {
                error!(worker_id = %worker_id, error = %e, "Failed to claim job");
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    () = tokio::time::sleep(ctx.poll_interval) => {}
                }
            }
        }
    }

    info!(worker_id = %worker_id, "Worker stopped");
}

async fn process_job(worker_id: &str, ctx: &WorkerContext, mut job: JobRecord) {
    debug!(
        worker_id = %worker_id,
        job_id = %job.id,
        command = %job.command,
        attempt = job.attempts + 1,
        "Executing job"
    );

    let started = Instant::now();
    let outcome = ctx.executor.run(&job.command).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    match outcome {
        ExecutionOutcome::Success { stdout } => {
            if let Err(e) = persist_completion(ctx, &mut job, stdout).await {
                error!(
                    worker_id = %worker_id,
                    job_id = %job.id,
                    error = %e,
                    "Failed to persist completion"
                );
                return;
            }
            ctx.jobs_processed.fetch_add(1, Ordering::Relaxed);
            counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
            info!(worker_id = %worker_id, job_id = %job.id, duration_ms, "Job completed");
        }
        ExecutionOutcome::Failure { message } => {
            ctx.jobs_failed.fetch_add(1, Ordering::Relaxed);
            counter!(names::JOBS_FAILED_TOTAL).increment(1);
            release_failed(worker_id, ctx, job, message, duration_ms).await;
        }
    }
}

async fn persist_completion(
    ctx: &WorkerContext,
    job: &mut JobRecord,
    stdout: String,
) -> JobResult<()> {
    job.complete(stdout)?;
    ctx.store.upsert(job.clone()).await
}

async fn release_failed(
    worker_id: &str,
    ctx: &WorkerContext,
    mut job: JobRecord,
    message: String,
    duration_ms: u64,
) {
    let outcome = match job.fail(message.clone(), &ctx.retry_policy) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(
                worker_id = %worker_id,
                job_id = %job.id,
                error = %e,
                "Failed to transition failed job"
            );
            return;
        }
    };

    match outcome {
        FailureOutcome::Retry { scheduled_at } => {
            if let Err(e) = ctx.store.upsert(job.clone()).await {
                error!(
                    worker_id = %worker_id,
                    job_id = %job.id,
                    error = %e,
                    "Failed to persist retry"
                );
                return;
            }
            counter!(names::JOBS_RETRIED_TOTAL).increment(1);
            warn!(
                worker_id = %worker_id,
                job_id = %job.id,
                attempt = job.attempts,
                max_retries = job.max_retries,
                retry_at = %scheduled_at,
                error = %message,
                duration_ms,
                "Job failed, retry scheduled"
            );
        }
        FailureOutcome::DeadLetter => {
            if let Err(e) = ctx.dlq.dead_letter(job.clone(), message.clone()).await {
                error!(
                    worker_id = %worker_id,
                    job_id = %job.id,
                    error = %e,
                    "Failed to dead-letter job"
                );
                return;
            }
            ctx.jobs_dead_lettered.fetch_add(1, Ordering::Relaxed);
            error!(
                worker_id = %worker_id,
                job_id = %job.id,
                attempts = job.attempts,
                error = %message,
                duration_ms,
                "Job failed permanently"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobId, JobState};
    use crate::queue::JobQueue;
    use crate::store::MemoryStore;

    fn pool_over(store: Arc<MemoryStore>, workers: usize, base: u32) -> WorkerPool {
        WorkerPool::new(
            store,
            RetryPolicy::new(base),
            WorkerPoolConfig {
                worker_count: workers,
                poll_interval: Duration::from_millis(25),
            },
        )
    }

    async fn wait_for_state(
        queue: &JobQueue,
        id: &JobId,
        state: JobState,
        timeout: Duration,
    ) -> JobRecord {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(job) = queue.get(id).await.unwrap() {
                if job.state == state {
                    return job;
                }
            }
            assert!(
                Instant::now() < deadline,
                "timed out waiting for job {id} to reach {state}"
            );
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    #[tokio::test]
    async fn test_successful_job_completes_with_one_attempt() {
        let store = Arc::new(MemoryStore::new());
        let queue = JobQueue::new(store.clone());
        let id = queue.submit("exit 0", None, None).await.unwrap();

        let pool = pool_over(store, 2, 2);
        pool.start().unwrap();

        let job = wait_for_state(&queue, &id, JobState::Completed, Duration::from_secs(5)).await;
        pool.stop().await;

        assert_eq!(job.attempts, 1);
        assert_eq!(pool.jobs_processed(), 1);
    }

    #[tokio::test]
    async fn test_job_output_is_captured() {
        let store = Arc::new(MemoryStore::new());
        let queue = JobQueue::new(store.clone());
        let id = queue.submit("echo hello", None, None).await.unwrap();

        let pool = pool_over(store, 1, 2);
        pool.start().unwrap();

        let job = wait_for_state(&queue, &id, JobState::Completed, Duration::from_secs(5)).await;
        pool.stop().await;

        assert_eq!(job.output.as_deref().map(str::trim), Some("hello"));
        assert!(job.last_error.is_none());
    }

    #[tokio::test]
    async fn test_exhausted_job_is_dead_lettered() {
        let store = Arc::new(MemoryStore::new());
        let queue = JobQueue::new(store.clone());
        let id = queue.submit("exit 1", Some(0), None).await.unwrap();

        let pool = pool_over(store.clone(), 1, 2);
        pool.start().unwrap();

        let job = wait_for_state(&queue, &id, JobState::Dead, Duration::from_secs(5)).await;
        pool.stop().await;

        assert_eq!(job.attempts, 1);
        assert!(store.get(&id).await.unwrap().is_none());
        assert!(store.get_dead(&id).await.unwrap().is_some());
        assert_eq!(pool.jobs_dead_lettered(), 1);
    }

    #[tokio::test]
    async fn test_failing_job_retries_then_dies() {
        let store = Arc::new(MemoryStore::new());
        let queue = JobQueue::new(store.clone());
        // base 1 keeps the backoff at one second per retry.
        let id = queue.submit("exit 1", Some(2), None).await.unwrap();

        let pool = pool_over(store.clone(), 1, 1);
        pool.start().unwrap();

        let job = wait_for_state(&queue, &id, JobState::Dead, Duration::from_secs(20)).await;
        pool.stop().await;

        // Three failed cycles: two retries, then dead-letter.
        assert_eq!(job.attempts, 3);
        assert!(job.last_error.is_some());
        assert!(store.get(&id).await.unwrap().is_none());
        let dead = store.get_dead(&id).await.unwrap().unwrap();
        assert_eq!(dead.job.attempts, dead.job.max_retries + 1);
    }

    #[tokio::test]
    async fn test_racing_workers_execute_job_once() {
        let store = Arc::new(MemoryStore::new());
        let queue = JobQueue::new(store.clone());
        let id = queue.submit("exit 0", None, None).await.unwrap();

        let pool = pool_over(store, 4, 2);
        pool.start().unwrap();

        let job = wait_for_state(&queue, &id, JobState::Completed, Duration::from_secs(5)).await;
        // Give the other workers a few ticks to (incorrectly) re-run it.
        tokio::time::sleep(Duration::from_millis(200)).await;
        pool.stop().await;

        assert_eq!(job.attempts, 1);
        assert_eq!(pool.jobs_processed(), 1);
    }

    #[tokio::test]
    async fn test_stop_waits_for_in_flight_job() {
        let store = Arc::new(MemoryStore::new());
        let queue = JobQueue::new(store.clone());
        let id = queue.submit("sleep 1", None, None).await.unwrap();

        let pool = pool_over(store, 1, 2);
        pool.start().unwrap();

        // Let the worker claim the job, then stop mid-execution.
        wait_for_state(&queue, &id, JobState::Processing, Duration::from_secs(5)).await;
        pool.stop().await;

        // The in-flight job finished before the pool reported stopped.
        let job = queue.get(&id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert!(!pool.is_running());
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let pool = pool_over(store, 1, 2);
        pool.start().unwrap();

        assert!(matches!(pool.start(), Err(JobError::Worker(_))));
        pool.stop().await;
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let store = Arc::new(MemoryStore::new());
        let pool = pool_over(store, 1, 2);
        pool.stop().await;
        assert!(!pool.is_running());
    }
}

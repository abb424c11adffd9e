//! Submitter/operator facade over the record store.

use crate::dlq::DeadLetterManager;
use crate::error::{JobError, JobResult};
use crate::job::{JobId, JobRecord, JobState};
use crate::metrics::names;
use crate::status::{QueueSnapshot, QueueStatus};
use crate::store::JobStore;
use ::metrics::counter;
use std::sync::Arc;
use tracing::info;

/// The caller-facing queue surface: submit, list, status, requeue.
///
/// All mutation flows through the store's atomic operations; this type
/// holds no state of its own and is cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    dlq: DeadLetterManager,
}

impl JobQueue {
    /// Creates a queue over the given store.
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        let dlq = DeadLetterManager::new(store.clone());
        Self { store, dlq }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn JobStore> {
        self.store.clone()
    }

    /// Returns the dead-letter manager.
    #[must_use]
    pub fn dead_letters(&self) -> &DeadLetterManager {
        &self.dlq
    }

    /// Submits a new job, returning its id.
    ///
    /// Fails with `InvalidInput` on an empty command or an id already
    /// present in either collection.
    pub async fn submit(
        &self,
        command: impl Into<String>,
        max_retries: Option<u32>,
        id: Option<JobId>,
    ) -> JobResult<JobId> {
        let job = JobRecord::new(command, max_retries, id)?;

        if self.store.get(&job.id).await?.is_some()
            || self.store.get_dead(&job.id).await?.is_some()
        {
            return Err(JobError::InvalidInput(format!(
                "job id already exists: {}",
                job.id
            )));
        }

        let id = job.id.clone();
        self.store.upsert(job).await?;

        counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
        info!(job_id = %id, "Job submitted");
        Ok(id)
    }

    /// Lists job records, optionally filtered by state.
    ///
    /// Filtering on `Dead` lists the dead-letter snapshots; no filter
    /// lists the active collection.
    pub async fn list(&self, state: Option<JobState>) -> JobResult<Vec<JobRecord>> {
        match state {
            Some(JobState::Dead) => Ok(self
                .dlq
                .list()
                .await?
                .into_iter()
                .map(|entry| entry.job)
                .collect()),
            Some(state) => Ok(self
                .store
                .get_all()
                .await?
                .into_iter()
                .filter(|job| job.state == state)
                .collect()),
            None => self.store.get_all().await,
        }
    }

    /// Returns one job record by id, searching both collections.
    pub async fn get(&self, id: &JobId) -> JobResult<Option<JobRecord>> {
        if let Some(job) = self.store.get(id).await? {
            return Ok(Some(job));
        }
        Ok(self.store.get_dead(id).await?.map(|entry| entry.job))
    }

    /// Returns the aggregate queue status.
    pub async fn status(&self) -> JobResult<QueueStatus> {
        let jobs = self.store.get_all().await?;
        let dead = self.store.list_dead().await?;
        Ok(QueueStatus::tally(&jobs, dead.len()))
    }

    /// Resurrects a dead-lettered job.
    pub async fn requeue(&self, id: &JobId) -> JobResult<JobRecord> {
        self.dlq.requeue(id).await
    }

    /// Builds the read-only monitoring snapshot.
    pub async fn snapshot(&self) -> JobResult<QueueSnapshot> {
        let jobs = self.store.get_all().await?;
        let dead_letter = self.store.list_dead().await?;
        let status = QueueStatus::tally(&jobs, dead_letter.len());
        Ok(QueueSnapshot {
            status,
            jobs,
            dead_letter,
        })
    }
}

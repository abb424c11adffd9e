//! Dead-letter manager: permanent failure and manual requeue.

use crate::error::{JobError, JobResult};
use crate::job::{DeadLetteredJob, JobId, JobRecord, JobState};
use crate::metrics::names;
use crate::store::JobStore;
use ::metrics::counter;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Moves exhausted jobs out of the active collection and resurrects them
/// on operator request.
///
/// Both moves insert into the destination collection before removing
/// from the source: a crash between the two steps duplicates the job
/// (reconciled by the store on the next open) instead of losing it.
#[derive(Clone)]
pub struct DeadLetterManager {
    store: Arc<dyn JobStore>,
}

impl DeadLetterManager {
    /// Creates a manager over the given store.
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Moves a job into the dead-letter collection with its final error.
    pub async fn dead_letter(
        &self,
        mut job: JobRecord,
        message: impl Into<String>,
    ) -> JobResult<()> {
        let message = message.into();
        job.state = JobState::Dead;
        job.last_error = Some(message.clone());
        job.updated_at = Utc::now();

        let id = job.id.clone();
        let attempts = job.attempts;

        self.store.insert_dead(DeadLetteredJob::new(job)).await?;
        self.store.remove(&id).await?;

        counter!(names::JOBS_DEAD_LETTERED_TOTAL).increment(1);
        warn!(
            job_id = %id,
            attempts,
            error = %message,
            "Moved job to dead-letter collection"
        );
        Ok(())
    }

    /// Resurrects a dead-lettered job as a fresh pending record.
    ///
    /// Fails with `NotFound` if the id is not in the dead-letter
    /// collection. The resurrected record keeps the snapshot's command,
    /// retry ceiling, and creation time; attempts reset to 0 and the
    /// last error is cleared.
    pub async fn requeue(&self, id: &JobId) -> JobResult<JobRecord> {
        let entry = self
            .store
            .get_dead(id)
            .await?
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;

        let now = Utc::now();
        let mut job = entry.job;
        job.state = JobState::Pending;
        job.attempts = 0;
        job.last_error = None;
        job.output = None;
        job.scheduled_at = now;
        job.updated_at = now;

        self.store.upsert(job.clone()).await?;
        self.store.remove_dead(id).await?;

        counter!(names::JOBS_REQUEUED_TOTAL).increment(1);
        info!(job_id = %id, "Requeued job from dead-letter collection");
        Ok(job)
    }

    /// Lists the dead-letter collection.
    pub async fn list(&self) -> JobResult<Vec<DeadLetteredJob>> {
        self.store.list_dead().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::store::MemoryStore;

    fn manager() -> (Arc<MemoryStore>, DeadLetterManager) {
        let store = Arc::new(MemoryStore::new());
        let dlq = DeadLetterManager::new(store.clone());
        (store, dlq)
    }

    async fn exhausted_job(store: &MemoryStore) -> JobRecord {
        let policy = RetryPolicy::default();
        let mut job = JobRecord::new("false", Some(0), None).unwrap();
        store.upsert(job.clone()).await.unwrap();

        job.start_processing().unwrap();
        job.fail("boom", &policy).unwrap();
        job
    }

    #[tokio::test]
    async fn test_dead_letter_moves_job() {
        let (store, dlq) = manager();
        let job = exhausted_job(&store).await;
        let id = job.id.clone();

        dlq.dead_letter(job, "boom").await.unwrap();

        // Moved, not copied: gone from active, present in dead.
        assert!(store.get(&id).await.unwrap().is_none());
        let entry = store.get_dead(&id).await.unwrap().unwrap();
        assert_eq!(entry.job.state, JobState::Dead);
        assert_eq!(entry.job.last_error.as_deref(), Some("boom"));
        assert_eq!(entry.job.attempts, 1);
    }

    #[tokio::test]
    async fn test_requeue_resets_job() {
        let (store, dlq) = manager();
        let job = exhausted_job(&store).await;
        let id = job.id.clone();
        dlq.dead_letter(job, "boom").await.unwrap();

        let requeued = dlq.requeue(&id).await.unwrap();

        assert_eq!(requeued.state, JobState::Pending);
        assert_eq!(requeued.attempts, 0);
        assert!(requeued.last_error.is_none());
        assert!(requeued.scheduled_at <= Utc::now());

        // Back in exactly one collection.
        assert!(store.get(&id).await.unwrap().is_some());
        assert!(store.get_dead(&id).await.unwrap().is_none());
        assert!(dlq.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_requeue_unknown_id_is_not_found() {
        let (_store, dlq) = manager();
        let err = dlq.requeue(&JobId::from("missing")).await.unwrap_err();
        assert!(matches!(err, JobError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_never_in_both_collections() {
        let (store, dlq) = manager();
        let job = exhausted_job(&store).await;
        let id = job.id.clone();

        dlq.dead_letter(job, "boom").await.unwrap();
        let in_active = store.get(&id).await.unwrap().is_some();
        let in_dead = store.get_dead(&id).await.unwrap().is_some();
        assert!(in_dead && !in_active);

        dlq.requeue(&id).await.unwrap();
        let in_active = store.get(&id).await.unwrap().is_some();
        let in_dead = store.get_dead(&id).await.unwrap().is_some();
        assert!(in_active && !in_dead);
    }
}

//! Record store abstraction.
//!
//! The store owns the two shared collections (active jobs and dead
//! letters) and is the single ownership boundary for their mutation.
//! Workers interact with it only through the atomic operations below —
//! in particular [`JobStore::claim_next`], which makes scan-and-mark a
//! single operation so two workers can never claim the same job.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::JobResult;
use crate::job::{DeadLetteredJob, JobId, JobRecord};
use async_trait::async_trait;

/// Durable keyed storage for job records and the dead-letter collection.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Returns every active job record.
    async fn get_all(&self) -> JobResult<Vec<JobRecord>>;

    /// Returns one active job record by id.
    async fn get(&self, id: &JobId) -> JobResult<Option<JobRecord>>;

    /// Atomically finds one record satisfying `eligible`, transitions it
    /// to `Processing`, persists it, and returns it.
    ///
    /// This is the claim primitive: selection and marking happen under
    /// the store's write serialization, so concurrent callers racing on
    /// the same record see exactly one winner. The read-all/pick/update
    /// sequence this replaces is not an acceptable implementation.
    async fn claim_next(
        &self,
        eligible: &(dyn for<'a> Fn(&'a JobRecord) -> bool + Send + Sync),
    ) -> JobResult<Option<JobRecord>>;

    /// Full replace of one job by id; inserts if absent.
    async fn upsert(&self, job: JobRecord) -> JobResult<()>;

    /// Removes one active job record.
    async fn remove(&self, id: &JobId) -> JobResult<()>;

    /// Appends a record to the dead-letter collection.
    async fn insert_dead(&self, dead: DeadLetteredJob) -> JobResult<()>;

    /// Returns every dead-letter record.
    async fn list_dead(&self) -> JobResult<Vec<DeadLetteredJob>>;

    /// Returns one dead-letter record by job id.
    async fn get_dead(&self, id: &JobId) -> JobResult<Option<DeadLetteredJob>>;

    /// Removes one dead-letter record by job id.
    async fn remove_dead(&self, id: &JobId) -> JobResult<()>;
}

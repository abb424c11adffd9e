//! In-memory record store.

use crate::error::JobResult;
use crate::job::{DeadLetteredJob, JobId, JobRecord};
use crate::store::JobStore;
use async_trait::async_trait;
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Collections {
    jobs: Vec<JobRecord>,
    dead: Vec<DeadLetteredJob>,
}

/// Record store backed by plain memory.
///
/// Same contract as [`crate::store::FileStore`] without persistence; the
/// claim primitive is the same mutex-serialized read-modify-write. Used
/// throughout the test suite.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn get_all(&self) -> JobResult<Vec<JobRecord>> {
        Ok(self.inner.lock().jobs.clone())
    }

    async fn get(&self, id: &JobId) -> JobResult<Option<JobRecord>> {
        Ok(self.inner.lock().jobs.iter().find(|j| &j.id == id).cloned())
    }

    async fn claim_next(
        &self,
        eligible: &(dyn for<'a> Fn(&'a JobRecord) -> bool + Send + Sync),
    ) -> JobResult<Option<JobRecord>> {
        let mut inner = self.inner.lock();
        match inner.jobs.iter().position(|j| eligible(j)) {
            Some(index) => {
                let job = &mut inner.jobs[index];
                job.start_processing()?;
                Ok(Some(job.clone()))
            }
            None => Ok(None),
        }
    }

    async fn upsert(&self, job: JobRecord) -> JobResult<()> {
        let mut inner = self.inner.lock();
        match inner.jobs.iter_mut().find(|j| j.id == job.id) {
            Some(existing) => *existing = job,
            None => inner.jobs.push(job),
        }
        Ok(())
    }

    async fn remove(&self, id: &JobId) -> JobResult<()> {
        self.inner.lock().jobs.retain(|j| &j.id != id);
        Ok(())
    }

    async fn insert_dead(&self, dead: DeadLetteredJob) -> JobResult<()> {
        self.inner.lock().dead.push(dead);
        Ok(())
    }

    async fn list_dead(&self) -> JobResult<Vec<DeadLetteredJob>> {
        Ok(self.inner.lock().dead.clone())
    }

    async fn get_dead(&self, id: &JobId) -> JobResult<Option<DeadLetteredJob>> {
        Ok(self.inner.lock().dead.iter().find(|d| d.id() == id).cloned())
    }

    async fn remove_dead(&self, id: &JobId) -> JobResult<()> {
        self.inner.lock().dead.retain(|d| d.id() != id);
        Ok(())
    }
}

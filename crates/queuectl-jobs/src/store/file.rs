//! JSON-file record store.

use crate::error::JobResult;
use crate::job::{DeadLetteredJob, JobId, JobRecord};
use crate::store::JobStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const JOBS_FILE: &str = "jobs.json";
const DEAD_LETTER_FILE: &str = "dead_letter.json";

/// Record store backed by two JSON files under a data directory:
/// `jobs.json` (active collection) and `dead_letter.json` (dead-letter
/// collection).
///
/// Every operation is a load, mutate, persist cycle under one mutex —
/// that mutex is the claim-serialization primitive. Reloading per
/// operation means records written by another process (e.g. `submit`
/// while a worker pool runs) become visible on the next poll. Persisting
/// writes a temp file and renames it over the target, so a crash never
/// leaves a torn file.
pub struct FileStore {
    jobs_path: PathBuf,
    dead_path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Opens (and creates if needed) the store under `data_dir`.
    ///
    /// The cross-collection move operations insert into the destination
    /// before removing from the source, so a crash between the two steps
    /// leaves a job id present in both files. Opening reconciles such
    /// duplicates by keeping the more recently written side.
    pub fn open(data_dir: impl AsRef<Path>) -> JobResult<Self> {
        let dir = data_dir.as_ref();
        fs::create_dir_all(dir)?;

        let store = Self {
            jobs_path: dir.join(JOBS_FILE),
            dead_path: dir.join(DEAD_LETTER_FILE),
            lock: Mutex::new(()),
        };

        {
            let _guard = store.lock.lock();
            let mut jobs = store.load_jobs()?;
            let mut dead = store.load_dead()?;
            if reconcile(&mut jobs, &mut dead) {
                store.save_jobs(&jobs)?;
                store.save_dead(&dead)?;
            }
        }

        debug!(dir = %dir.display(), "Opened file store");
        Ok(store)
    }

    fn load_jobs(&self) -> JobResult<Vec<JobRecord>> {
        load_collection(&self.jobs_path)
    }

    fn save_jobs(&self, jobs: &[JobRecord]) -> JobResult<()> {
        save_collection(&self.jobs_path, jobs)
    }

    fn load_dead(&self) -> JobResult<Vec<DeadLetteredJob>> {
        load_collection(&self.dead_path)
    }

    fn save_dead(&self, dead: &[DeadLetteredJob]) -> JobResult<()> {
        save_collection(&self.dead_path, dead)
    }
}

fn load_collection<T: serde::de::DeserializeOwned>(path: &Path) -> JobResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&raw)?)
}

fn save_collection<T: serde::Serialize>(path: &Path, records: &[T]) -> JobResult<()> {
    let rendered = serde_json::to_string_pretty(records)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, rendered)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Resolves duplicates left by a crash mid-move. Returns true if
/// anything changed.
fn reconcile(jobs: &mut Vec<JobRecord>, dead: &mut Vec<DeadLetteredJob>) -> bool {
    let mut changed = false;

    // Duplicate ids within the dead-letter file: keep the latest failure.
    let mut deduped: Vec<DeadLetteredJob> = Vec::with_capacity(dead.len());
    for entry in dead.drain(..) {
        match deduped.iter_mut().find(|d| d.id() == entry.id()) {
            Some(existing) => {
                warn!(job_id = %entry.id(), "Deduplicating dead-letter entries");
                if entry.failed_at > existing.failed_at {
                    *existing = entry;
                }
                changed = true;
            }
            None => deduped.push(entry),
        }
    }
    *dead = deduped;

    // Ids present in both collections: keep whichever side was written
    // last (dead-lettering inserts into dead first; requeue inserts into
    // active first).
    jobs.retain(|job| {
        match dead.iter().find(|d| d.id() == &job.id) {
            Some(entry) if entry.failed_at >= job.updated_at => {
                warn!(job_id = %job.id, "Dropping active duplicate of dead-lettered job");
                changed = true;
                false
            }
            _ => true,
        }
    });
    let before = dead.len();
    dead.retain(|entry| {
        !jobs
            .iter()
            .any(|job| &job.id == entry.id() && job.updated_at > entry.failed_at)
    });
    if dead.len() != before {
        changed = true;
    }

    changed
}

#[async_trait]
impl JobStore for FileStore {
    async fn get_all(&self) -> JobResult<Vec<JobRecord>> {
        let _guard = self.lock.lock();
        self.load_jobs()
    }

    async fn get(&self, id: &JobId) -> JobResult<Option<JobRecord>> {
        let _guard = self.lock.lock();
        Ok(self.load_jobs()?.into_iter().find(|j| &j.id == id))
    }

    async fn claim_next(
        &self,
        eligible: &(dyn for<'a> Fn(&'a JobRecord) -> bool + Send + Sync),
    ) -> JobResult<Option<JobRecord>> {
        let _guard = self.lock.lock();
        let mut jobs = self.load_jobs()?;

        match jobs.iter().position(|j| eligible(j)) {
            Some(index) => {
                jobs[index].start_processing()?;
                let claimed = jobs[index].clone();
                self.save_jobs(&jobs)?;
                Ok(Some(claimed))
            }
            None => Ok(None),
        }
    }

    async fn upsert(&self, job: JobRecord) -> JobResult<()> {
        let _guard = self.lock.lock();
        let mut jobs = self.load_jobs()?;
        match jobs.iter_mut().find(|j| j.id == job.id) {
            Some(existing) => *existing = job,
            None => jobs.push(job),
        }
        self.save_jobs(&jobs)
    }

    async fn remove(&self, id: &JobId) -> JobResult<()> {
        let _guard = self.lock.lock();
        let mut jobs = self.load_jobs()?;
        jobs.retain(|j| &j.id != id);
        self.save_jobs(&jobs)
    }

    async fn insert_dead(&self, dead: DeadLetteredJob) -> JobResult<()> {
        let _guard = self.lock.lock();
        let mut entries = self.load_dead()?;
        entries.push(dead);
        self.save_dead(&entries)
    }

    async fn list_dead(&self) -> JobResult<Vec<DeadLetteredJob>> {
        let _guard = self.lock.lock();
        self.load_dead()
    }

    async fn get_dead(&self, id: &JobId) -> JobResult<Option<DeadLetteredJob>> {
        let _guard = self.lock.lock();
        Ok(self.load_dead()?.into_iter().find(|d| d.id() == id))
    }

    async fn remove_dead(&self, id: &JobId) -> JobResult<()> {
        let _guard = self.lock.lock();
        let mut entries = self.load_dead()?;
        entries.retain(|d| d.id() != id);
        self.save_dead(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobState;
    use chrono::Utc;

    fn pending(command: &str) -> JobRecord {
        JobRecord::new(command, None, None).unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let job = pending("echo a");
        let id = job.id.clone();

        {
            let store = FileStore::open(dir.path()).unwrap();
            store.upsert(job).await.unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        let loaded = store.get(&id).await.unwrap().unwrap();
        assert_eq!(loaded.command, "echo a");
        assert_eq!(loaded.state, JobState::Pending);
    }

    #[tokio::test]
    async fn test_claim_persists_processing_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let job = pending("echo a");
        let id = job.id.clone();
        store.upsert(job).await.unwrap();

        let now = Utc::now();
        store
            .claim_next(&|j: &JobRecord| j.is_eligible(now))
            .await
            .unwrap()
            .unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        let loaded = reopened.get(&id).await.unwrap().unwrap();
        assert_eq!(loaded.state, JobState::Processing);
    }

    #[tokio::test]
    async fn test_missing_files_mean_empty_collections() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.get_all().await.unwrap().is_empty());
        assert!(store.list_dead().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dead_letter_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let job = pending("false");
        let id = job.id.clone();

        store.insert_dead(DeadLetteredJob::new(job)).await.unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        assert!(reopened.get_dead(&id).await.unwrap().is_some());

        reopened.remove_dead(&id).await.unwrap();
        assert!(reopened.get_dead(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reconcile_drops_active_copy_after_crashed_dead_letter() {
        let dir = tempfile::tempdir().unwrap();
        let job = pending("false");
        let id = job.id.clone();

        // Simulate a crash between "insert into dead" and "remove from
        // active": the id exists in both files, dead written later.
        {
            let store = FileStore::open(dir.path()).unwrap();
            store.upsert(job.clone()).await.unwrap();
            let mut snapshot = job.clone();
            snapshot.state = JobState::Dead;
            store
                .insert_dead(DeadLetteredJob::new(snapshot))
                .await
                .unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.get(&id).await.unwrap().is_none());
        assert!(store.get_dead(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_reconcile_drops_dead_copy_after_crashed_requeue() {
        let dir = tempfile::tempdir().unwrap();
        let job = pending("false");
        let id = job.id.clone();

        // Simulate a crash between "insert into active" and "remove from
        // dead": the requeued record is the newer write.
        {
            let store = FileStore::open(dir.path()).unwrap();
            let mut snapshot = job.clone();
            snapshot.state = JobState::Dead;
            store
                .insert_dead(DeadLetteredJob::new(snapshot))
                .await
                .unwrap();

            let mut requeued = job.clone();
            requeued.updated_at = Utc::now() + chrono::Duration::seconds(1);
            store.upsert(requeued).await.unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.get(&id).await.unwrap().is_some());
        assert!(store.get_dead(&id).await.unwrap().is_none());
    }
}

//! Queue status counts and the read-only monitoring snapshot.

use crate::job::{DeadLetteredJob, JobRecord, JobState};
use serde::{Deserialize, Serialize};

/// Per-state counts plus the dead-letter count and grand total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Jobs awaiting a claim.
    pub pending: u64,

    /// Jobs currently claimed by a worker.
    pub processing: u64,

    /// Jobs that finished successfully.
    pub completed: u64,

    /// Dead-letter collection size.
    pub dead: u64,

    /// Active jobs plus dead letters.
    pub total: u64,
}

impl QueueStatus {
    /// Tallies counts from the two collections.
    #[must_use]
    pub fn tally(jobs: &[JobRecord], dead_count: usize) -> Self {
        let count = |state: JobState| jobs.iter().filter(|j| j.state == state).count() as u64;

        Self {
            pending: count(JobState::Pending),
            processing: count(JobState::Processing),
            completed: count(JobState::Completed),
            dead: dead_count as u64,
            total: jobs.len() as u64 + dead_count as u64,
        }
    }
}

/// Read-only snapshot for monitoring surfaces (dashboard, status CLI).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Aggregate counts.
    pub status: QueueStatus,

    /// Every active job record.
    pub jobs: Vec<JobRecord>,

    /// Every dead-letter record.
    pub dead_letter: Vec<DeadLetteredJob>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_counts_states() {
        let mut jobs = vec![
            JobRecord::new("a", None, None).unwrap(),
            JobRecord::new("b", None, None).unwrap(),
            JobRecord::new("c", None, None).unwrap(),
        ];
        jobs[1].state = JobState::Processing;
        jobs[2].state = JobState::Completed;

        let status = QueueStatus::tally(&jobs, 2);
        assert_eq!(status.pending, 1);
        assert_eq!(status.processing, 1);
        assert_eq!(status.completed, 1);
        assert_eq!(status.dead, 2);
        assert_eq!(status.total, 5);
    }

    #[test]
    fn test_total_is_sum_of_parts() {
        let jobs = vec![JobRecord::new("a", None, None).unwrap()];
        let status = QueueStatus::tally(&jobs, 3);
        assert_eq!(
            status.total,
            status.pending + status.processing + status.completed + status.dead
        );
    }
}

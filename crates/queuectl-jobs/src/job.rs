//! Job records and the lifecycle state machine.

use crate::error::{JobError, JobResult};
use crate::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Default per-job retry ceiling.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Unique job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Creates a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Creates a job ID from a string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the job ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Job lifecycle states.
///
/// `failed` is transient and never stored: a failing job either returns to
/// `Pending` (retry) or is moved to the dead-letter collection as `Dead`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Eligible for claiming once `scheduled_at` has passed.
    Pending,
    /// Exclusively claimed by one worker, execution in flight.
    Processing,
    /// Finished successfully. Terminal; kept for inspection.
    Completed,
    /// Permanently failed, lives in the dead-letter collection. Terminal
    /// except for manual requeue.
    Dead,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Processing => write!(f, "processing"),
            JobState::Completed => write!(f, "completed"),
            JobState::Dead => write!(f, "dead"),
        }
    }
}

impl FromStr for JobState {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobState::Pending),
            "processing" => Ok(JobState::Processing),
            "completed" => Ok(JobState::Completed),
            "dead" => Ok(JobState::Dead),
            other => Err(JobError::InvalidInput(format!("unknown state: {other}"))),
        }
    }
}

/// Outcome of a failed execution, decided by the lifecycle + retry policy.
/// Applying it (persisting the retry, or moving the record to the
/// dead-letter collection) is the scheduler's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Retry later: the record went back to `Pending` with this
    /// eligibility time.
    Retry { scheduled_at: DateTime<Utc> },
    /// Attempts exhausted: the record is `Dead` and must be moved to the
    /// dead-letter collection.
    DeadLetter,
}

/// A single unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobRecord {
    /// Unique identifier.
    pub id: JobId,

    /// The executable instruction. Opaque to the core.
    pub command: String,

    /// Current lifecycle state.
    pub state: JobState,

    /// Execution attempts made so far. Monotonically increasing; reset
    /// only by manual requeue from the dead-letter collection.
    pub attempts: u32,

    /// Per-job ceiling on attempts before dead-lettering.
    pub max_retries: u32,

    /// Creation time.
    pub created_at: DateTime<Utc>,

    /// Refreshed on every state transition.
    pub updated_at: DateTime<Utc>,

    /// Earliest time the job becomes eligible for claiming.
    pub scheduled_at: DateTime<Utc>,

    /// Most recent failure message.
    #[serde(default)]
    pub last_error: Option<String>,

    /// Captured stdout of the most recent successful execution.
    #[serde(default)]
    pub output: Option<String>,
}

impl JobRecord {
    /// Builds a new pending record.
    ///
    /// Fails with `InvalidInput` if `command` is empty or whitespace-only.
    pub fn new(
        command: impl Into<String>,
        max_retries: Option<u32>,
        id: Option<JobId>,
    ) -> JobResult<Self> {
        let command = command.into();
        if command.trim().is_empty() {
            return Err(JobError::InvalidInput(
                "command must not be empty".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id: id.unwrap_or_default(),
            command,
            state: JobState::Pending,
            attempts: 0,
            max_retries: max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            created_at: now,
            updated_at: now,
            scheduled_at: now,
            last_error: None,
            output: None,
        })
    }

    /// Returns true if the job can be claimed at `now`.
    #[must_use]
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Pending && self.scheduled_at <= now
    }

    /// Claims the job: `Pending -> Processing`.
    ///
    /// Claim exclusivity means the scheduler never calls this on a
    /// non-pending record; the contract still rejects it.
    pub fn start_processing(&mut self) -> JobResult<()> {
        if self.state != JobState::Pending {
            return Err(JobError::InvalidTransition {
                from: self.state,
                to: JobState::Processing,
            });
        }
        self.state = JobState::Processing;
        self.touch();
        Ok(())
    }

    /// Finishes the job successfully: `Processing -> Completed`.
    ///
    /// Increments attempts, captures output, clears the last error.
    pub fn complete(&mut self, output: impl Into<String>) -> JobResult<()> {
        if self.state != JobState::Processing {
            return Err(JobError::InvalidTransition {
                from: self.state,
                to: JobState::Completed,
            });
        }
        self.attempts += 1;
        self.output = Some(output.into());
        self.last_error = None;
        self.state = JobState::Completed;
        self.touch();
        Ok(())
    }

    /// Records a failed execution and decides between retry and
    /// dead-letter: `Processing -> Pending | Dead`.
    ///
    /// Increments attempts and stores the failure message. If the policy
    /// still allows a retry the record returns to `Pending` with
    /// `scheduled_at` advanced by the backoff delay; otherwise it is
    /// marked `Dead` for the caller to move into the dead-letter
    /// collection.
    pub fn fail(
        &mut self,
        message: impl Into<String>,
        policy: &RetryPolicy,
    ) -> JobResult<FailureOutcome> {
        if self.state != JobState::Processing {
            return Err(JobError::InvalidTransition {
                from: self.state,
                to: JobState::Pending,
            });
        }

        self.attempts += 1;
        self.last_error = Some(message.into());

        if policy.should_retry(self.attempts, self.max_retries) {
            // Saturate instead of panicking when base^attempts overflows
            // what chrono can represent.
            let delay = chrono::Duration::from_std(policy.next_delay(self.attempts))
                .unwrap_or(chrono::Duration::MAX);
            let scheduled_at = Utc::now()
                .checked_add_signed(delay)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            self.state = JobState::Pending;
            self.scheduled_at = scheduled_at;
            self.touch();
            Ok(FailureOutcome::Retry { scheduled_at })
        } else {
            self.state = JobState::Dead;
            self.touch();
            Ok(FailureOutcome::DeadLetter)
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A permanently failed job, moved out of the active collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeadLetteredJob {
    /// Snapshot of the job record at the moment of dead-lettering.
    pub job: JobRecord,

    /// When the job was dead-lettered.
    pub failed_at: DateTime<Utc>,
}

impl DeadLetteredJob {
    /// Snapshots a dead job record.
    pub fn new(job: JobRecord) -> Self {
        Self {
            job,
            failed_at: Utc::now(),
        }
    }

    /// The dead-lettered job's id.
    #[must_use]
    pub fn id(&self) -> &JobId {
        &self.job.id
    }
}

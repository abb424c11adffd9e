//! # Queuectl Jobs
//!
//! The durable job queue core:
//! - Job lifecycle state machine (`pending -> processing -> completed`,
//!   with failures retried back to `pending` or moved to the dead-letter
//!   collection once attempts are exhausted)
//! - Exponential retry policy (`base^attempts` seconds, uncapped)
//! - Record store abstraction with an atomic claim primitive, backed by
//!   JSON files on disk or plain memory
//! - Worker pool polling for eligible jobs and executing their commands
//!   as subprocesses
//! - Dead-letter manager handling permanent failure and manual requeue
//!
//! Execution is at-least-once: a worker claims a job exclusively, runs
//! its command, and applies the outcome. Idempotency is the job author's
//! responsibility.

pub mod dlq;
pub mod error;
pub mod executor;
pub mod job;
pub mod metrics;
pub mod queue;
pub mod retry;
pub mod status;
pub mod store;
pub mod worker;

pub use self::dlq::DeadLetterManager;
pub use self::error::{JobError, JobResult};
pub use self::executor::{CommandExecutor, ExecutionOutcome};
pub use self::job::{
    DeadLetteredJob, FailureOutcome, JobId, JobRecord, JobState, DEFAULT_MAX_RETRIES,
};
pub use self::metrics::register_metrics;
pub use self::queue::JobQueue;
pub use self::retry::RetryPolicy;
pub use self::status::{QueueSnapshot, QueueStatus};
pub use self::store::{FileStore, JobStore, MemoryStore};
pub use self::worker::{WorkerPool, WorkerPoolConfig};

/// Re-export of the commonly used types.
pub mod prelude {
    pub use crate::job::{JobId, JobRecord, JobState};
    pub use crate::queue::JobQueue;
    pub use crate::retry::RetryPolicy;
    pub use crate::store::JobStore;
    pub use crate::worker::WorkerPool;
    pub use crate::{JobError, JobResult};
}

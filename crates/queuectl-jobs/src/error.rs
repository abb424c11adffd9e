//! Job error types.

use crate::job::JobState;
use thiserror::Error;

/// Result type for job operations.
pub type JobResult<T> = Result<T, JobError>;

/// Job-related errors.
#[derive(Debug, Error)]
pub enum JobError {
    /// Malformed submission (empty command, duplicate id, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Defensive state-machine violation.
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: JobState, to: JobState },

    /// Unknown job or dead-letter id.
    #[error("Job not found: {0}")]
    NotFound(String),

    /// Store I/O failure. Fatal for the operation in progress; the prior
    /// state is left intact.
    #[error("Store error: {0}")]
    Store(#[from] std::io::Error),

    /// Record (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Worker pool error.
    #[error("Worker error: {0}")]
    Worker(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<JobError> for queuectl_core::QueueError {
    fn from(err: JobError) -> Self {
        use queuectl_core::QueueError;
        match err {
            JobError::InvalidInput(msg) => QueueError::Validation(msg),
            JobError::NotFound(id) => QueueError::not_found("job", id),
            JobError::InvalidTransition { from, to } => {
                QueueError::Conflict(format!("Invalid transition: {from} -> {to}"))
            }
            JobError::Store(e) => QueueError::Store(e.to_string()),
            JobError::Serialization(e) => QueueError::Store(e.to_string()),
            JobError::Worker(msg) | JobError::Internal(msg) => QueueError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queuectl_core::QueueError;

    #[test]
    fn test_invalid_transition_display() {
        let err = JobError::InvalidTransition {
            from: JobState::Completed,
            to: JobState::Processing,
        };
        let msg = err.to_string();
        assert!(msg.contains("completed") && msg.contains("processing"));
    }

    #[test]
    fn test_not_found_maps_to_queue_error() {
        let err: QueueError = JobError::NotFound("job-1".into()).into();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_invalid_input_maps_to_validation() {
        let err: QueueError = JobError::InvalidInput("command must not be empty".into()).into();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }
}

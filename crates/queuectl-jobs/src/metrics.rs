//! Metrics for job queue monitoring.

use ::metrics::describe_counter;

/// Metric names emitted by the queue.
pub mod names {
    /// Total jobs submitted.
    pub const JOBS_SUBMITTED_TOTAL: &str = "queuectl_jobs_submitted_total";
    /// Total jobs completed successfully.
    pub const JOBS_COMPLETED_TOTAL: &str = "queuectl_jobs_completed_total";
    /// Total failed executions.
    pub const JOBS_FAILED_TOTAL: &str = "queuectl_jobs_failed_total";
    /// Total retries scheduled.
    pub const JOBS_RETRIED_TOTAL: &str = "queuectl_jobs_retried_total";
    /// Total jobs moved to the dead-letter collection.
    pub const JOBS_DEAD_LETTERED_TOTAL: &str = "queuectl_jobs_dead_lettered_total";
    /// Total jobs manually requeued from the dead-letter collection.
    pub const JOBS_REQUEUED_TOTAL: &str = "queuectl_jobs_requeued_total";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(names::JOBS_SUBMITTED_TOTAL, "Total number of jobs submitted");
    describe_counter!(
        names::JOBS_COMPLETED_TOTAL,
        "Total number of jobs completed successfully"
    );
    describe_counter!(names::JOBS_FAILED_TOTAL, "Total number of failed executions");
    describe_counter!(names::JOBS_RETRIED_TOTAL, "Total number of retries scheduled");
    describe_counter!(
        names::JOBS_DEAD_LETTERED_TOTAL,
        "Total number of jobs moved to the dead-letter collection"
    );
    describe_counter!(
        names::JOBS_REQUEUED_TOTAL,
        "Total number of jobs requeued from the dead-letter collection"
    );
}

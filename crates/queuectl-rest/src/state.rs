//! Application state for Axum handlers.

use queuectl_jobs::JobQueue;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Read-only queue handle.
    pub queue: JobQueue,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(queue: JobQueue) -> Self {
        Self { queue }
    }
}

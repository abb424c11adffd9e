//! Result type aliases for queuectl.

use crate::QueueError;

/// A specialized `Result` type for queuectl operations.
pub type QueueResult<T> = Result<T, QueueError>;

//! Queue status controller.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use queuectl_core::QueueError;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status.
    pub status: String,
    /// Application version.
    pub version: String,
}

/// Error response for status operations.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Read-only queue snapshot: counts, active jobs, dead letters.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    match state.queue.snapshot().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => {
            let err = QueueError::from(e);
            (
                StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                Json(ErrorResponse {
                    error: err.to_string(),
                    code: err.error_code().to_string(),
                }),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queuectl_jobs::{JobQueue, MemoryStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_status_returns_snapshot() {
        let queue = JobQueue::new(Arc::new(MemoryStore::new()));
        queue.submit("echo a", None, None).await.unwrap();

        let snapshot = queue.snapshot().await.unwrap();
        let body = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(body["status"]["pending"], 1);
        assert_eq!(body["status"]["total"], 1);
        assert_eq!(body["jobs"].as_array().unwrap().len(), 1);
        assert!(body["dead_letter"].as_array().unwrap().is_empty());
    }
}

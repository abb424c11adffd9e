//! Main application router.

use crate::controllers::{dashboard_controller, status_controller};
use crate::state::AppState;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Creates the dashboard router.
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/", get(dashboard_controller::index))
        .route("/health", get(status_controller::health_check))
        .route("/api/status", get(status_controller::status))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Dashboard router created");
    router
}

//! API Routes
//!
//! Configures the Axum router with the diagnostics endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    error_stats_handler, errors_handler, health_handler, maintenance_handler,
    notifications_handler, resolve_error_handler, unresolved_errors_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Storage and notification self-tests
/// - `GET /errors` - All error logs, newest first
/// - `GET /errors/unresolved` - Logs not yet resolved
/// - `GET /errors/stats` - Counts per severity
/// - `POST /errors/:id/resolve` - Mark one log resolved
/// - `GET /notifications` - Inbox, `?unread=true` for unread only
/// - `POST /maintenance` - Run a cache maintenance pass now
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/errors", get(errors_handler))
        .route("/errors/unresolved", get(unresolved_errors_handler))
        .route("/errors/stats", get(error_stats_handler))
        .route("/errors/:id/resolve", post(resolve_error_handler))
        .route("/notifications", get(notifications_handler))
        .route("/maintenance", post(maintenance_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

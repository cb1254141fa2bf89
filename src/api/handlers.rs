//! API Handlers
//!
//! HTTP request handlers for the diagnostics endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::alert::AlertSurface;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{HealthResponse, NotificationQuery, NotificationsResponse, ResolveResponse};
use crate::network::NetworkManager;
use crate::notifications::NotificationManager;
use crate::reporting::{ErrorHandler, ErrorLog, ErrorStats};
use crate::storage::{KeyValueStore, StorageManager};
use crate::tasks::{run_maintenance, MaintenanceReport};

/// Application state shared across all handlers.
///
/// Holds the one instance of each manager for the lifetime of the process.
#[derive(Clone)]
pub struct AppState {
    pub errors: Arc<ErrorHandler>,
    pub storage: Arc<StorageManager>,
    pub network: Arc<NetworkManager>,
    pub notifications: Arc<NotificationManager>,
}

impl AppState {
    /// Creates a new AppState from already constructed managers.
    pub fn new(
        errors: Arc<ErrorHandler>,
        storage: Arc<StorageManager>,
        network: Arc<NetworkManager>,
        notifications: Arc<NotificationManager>,
    ) -> Self {
        Self {
            errors,
            storage,
            network,
            notifications,
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Builds a fresh `ErrorHandler` over `store`; see [`AppState::with_error_handler`].
    pub async fn from_config(
        config: &Config,
        store: Arc<dyn KeyValueStore>,
        alerts: Arc<dyn AlertSurface>,
    ) -> Self {
        let errors = Arc::new(ErrorHandler::new(store.clone(), alerts.clone()));
        Self::with_error_handler(config, store, alerts, errors).await
    }

    /// Wires the managers around an existing `ErrorHandler`.
    ///
    /// The handler is initialized (persisted logs loaded, panic hook installed)
    /// and the notification inbox is loaded before this returns.
    pub async fn with_error_handler(
        config: &Config,
        store: Arc<dyn KeyValueStore>,
        alerts: Arc<dyn AlertSurface>,
        errors: Arc<ErrorHandler>,
    ) -> Self {
        errors.initialize().await;

        let storage = Arc::new(StorageManager::new(
            store,
            errors.clone(),
            config.storage.clone(),
        ));
        let network = Arc::new(NetworkManager::new(
            config.api_base_url.clone(),
            config.request.clone(),
            errors.clone(),
        ));
        let notifications =
            NotificationManager::create(storage.clone(), errors.clone(), alerts).await;

        Self::new(errors, storage, network, notifications)
    }
}

/// Handler for GET /health
///
/// Runs the storage and notification self-tests.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let storage = state.storage.get_storage_health().await;
    let notifications = state.notifications.get_health_status().await;
    let errors = state.errors.error_stats().await;

    Json(HealthResponse::new(storage, notifications, errors))
}

/// Handler for GET /errors
pub async fn errors_handler(State(state): State<AppState>) -> Json<Vec<ErrorLog>> {
    Json(state.errors.get_error_logs().await)
}

/// Handler for GET /errors/unresolved
pub async fn unresolved_errors_handler(State(state): State<AppState>) -> Json<Vec<ErrorLog>> {
    Json(state.errors.get_unresolved_errors().await)
}

/// Handler for GET /errors/stats
pub async fn error_stats_handler(State(state): State<AppState>) -> Json<ErrorStats> {
    Json(state.errors.error_stats().await)
}

/// Handler for POST /errors/:id/resolve
///
/// Unknown ids are rejected with 400.
pub async fn resolve_error_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ResolveResponse>> {
    if !state.errors.mark_error_resolved(&id).await {
        return Err(AppError::InvalidInput(format!("No error log with id '{}'", id)));
    }

    Ok(Json(ResolveResponse::new(id)))
}

/// Handler for GET /notifications
pub async fn notifications_handler(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
) -> Json<NotificationsResponse> {
    let notifications = if query.unread {
        state.notifications.get_unread_notifications().await
    } else {
        state.notifications.get_notifications().await
    };
    let unread_count = state.notifications.get_unread_count().await;

    Json(NotificationsResponse {
        notifications,
        unread_count,
    })
}

/// Handler for POST /maintenance
///
/// Runs one cache maintenance pass immediately.
pub async fn maintenance_handler(State(state): State<AppState>) -> Json<MaintenanceReport> {
    Json(run_maintenance(&state.storage).await)
}

//! Client Resilience - storage, error reporting, networking and notifications
//!
//! Provides an expiring typed cache over a pluggable key-value store, a
//! persisted error log with user prompts, a retrying HTTP client with
//! cancellation and upload progress, and a preference-gated notification inbox.

pub mod alert;
pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod notifications;
pub mod reporting;
pub mod storage;
pub mod tasks;

pub use alert::{Alert, AlertButton, AlertSurface, RecordingAlerts, TracingAlerts};
pub use api::{create_router, AppState};
pub use config::Config;
pub use error::{AppError, NetworkFailure, Outcome, Result};
pub use network::NetworkManager;
pub use notifications::NotificationManager;
pub use reporting::ErrorHandler;
pub use storage::StorageManager;
pub use tasks::spawn_maintenance_task;

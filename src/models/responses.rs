//! Response DTOs for the diagnostics API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::notifications::{Notification, NotificationHealth};
use crate::reporting::ErrorStats;
use crate::storage::StorageHealth;

/// Response body for GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" when every component passed its self-test, else "degraded"
    pub status: String,
    pub storage: StorageHealth,
    pub notifications: NotificationHealth,
    pub errors: ErrorStats,
}

impl HealthResponse {
    pub fn new(storage: StorageHealth, notifications: NotificationHealth, errors: ErrorStats) -> Self {
        let status = if storage.healthy && notifications.healthy {
            "healthy"
        } else {
            "degraded"
        };
        Self {
            status: status.to_string(),
            storage,
            notifications,
            errors,
        }
    }
}

/// Response body for POST /errors/:id/resolve
#[derive(Debug, Clone, Serialize)]
pub struct ResolveResponse {
    /// Success message
    pub message: String,
    /// The id that was resolved
    pub id: String,
}

impl ResolveResponse {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            message: format!("Error '{}' marked as resolved", id),
            id,
        }
    }
}

/// Response body for GET /notifications
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsResponse {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::NotificationPreferences;
    use chrono::Utc;

    fn storage_health(healthy: bool) -> StorageHealth {
        StorageHealth {
            healthy,
            can_write: healthy,
            can_read: healthy,
            can_delete: healthy,
            total_size_mb: 0.0,
            max_size_mb: 50.0,
            item_count: 0,
            error: None,
            checked_at: Utc::now(),
        }
    }

    fn notification_health() -> NotificationHealth {
        NotificationHealth {
            healthy: true,
            can_create: true,
            can_delete: true,
            total: 0,
            unread: 0,
            preferences: NotificationPreferences::default(),
            error: None,
        }
    }

    #[test]
    fn test_health_response_status() {
        let healthy = HealthResponse::new(
            storage_health(true),
            notification_health(),
            ErrorStats::default(),
        );
        assert_eq!(healthy.status, "healthy");

        let degraded = HealthResponse::new(
            storage_health(false),
            notification_health(),
            ErrorStats::default(),
        );
        assert_eq!(degraded.status, "degraded");
    }

    #[test]
    fn test_resolve_response_serialize() {
        let resp = ResolveResponse::new("abc");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("abc"));
        assert!(json.contains("resolved"));
    }
}

//! Notifications Module
//!
//! In-app inbox with per-type preferences, persisted through the `StorageManager`.

mod manager;
mod model;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use manager::{NotificationHealth, NotificationManager, NOTIFICATIONS_KEY, PREFERENCES_KEY};
pub use model::{
    Notification, NotificationDetails, NotificationPreferences, NotificationType,
    PreferencesUpdate, MAX_NOTIFICATIONS,
};

//! Notification Manager
//!
//! Persisted in-app inbox with per-type preferences. Creation propagates
//! persistence failures; read-state changes are best effort.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::alert::{Alert, AlertSurface};
use crate::error::{Outcome, Result};
use crate::notifications::{
    Notification, NotificationDetails, NotificationPreferences, NotificationType,
    PreferencesUpdate, MAX_NOTIFICATIONS,
};
use crate::reporting::ErrorHandler;
use crate::storage::StorageManager;

/// Both keys go through `StorageManager::set_item` and so carry its `max_age`.
/// Once that lapses the inbox reads back empty and the preferences reset to
/// all-enabled.
pub const NOTIFICATIONS_KEY: &str = "notifications";
pub const PREFERENCES_KEY: &str = "notification_preferences";

// == Health ==
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationHealth {
    pub healthy: bool,
    pub can_create: bool,
    pub can_delete: bool,
    pub total: usize,
    pub unread: usize,
    pub preferences: NotificationPreferences,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// == Notification Manager ==
pub struct NotificationManager {
    storage: Arc<StorageManager>,
    errors: Arc<ErrorHandler>,
    alerts: Arc<dyn AlertSurface>,
    /// Newest first, at most `MAX_NOTIFICATIONS`
    notifications: RwLock<Vec<Notification>>,
    preferences: RwLock<NotificationPreferences>,
}

impl NotificationManager {
    // == Constructors ==
    /// Builds an empty manager; call `initialize` to load persisted state.
    pub fn new(
        storage: Arc<StorageManager>,
        errors: Arc<ErrorHandler>,
        alerts: Arc<dyn AlertSurface>,
    ) -> Self {
        Self {
            storage,
            errors,
            alerts,
            notifications: RwLock::new(Vec::new()),
            preferences: RwLock::new(NotificationPreferences::default()),
        }
    }

    /// Builds the manager and loads its persisted state.
    pub async fn create(
        storage: Arc<StorageManager>,
        errors: Arc<ErrorHandler>,
        alerts: Arc<dyn AlertSurface>,
    ) -> Arc<Self> {
        let manager = Arc::new(Self::new(storage, errors, alerts));
        manager.initialize().await;
        manager
    }

    /// Loads notifications and preferences concurrently.
    ///
    /// Missing or unreadable state leaves the defaults in place.
    pub async fn initialize(&self) {
        let (notifications, preferences) = tokio::join!(
            self.storage.get_item::<Vec<Notification>>(NOTIFICATIONS_KEY),
            self.storage.get_item::<NotificationPreferences>(PREFERENCES_KEY),
        );

        if let Some(failure) = &notifications.failure {
            debug!(error = %failure, "starting with an empty inbox");
        }
        if let Some(mut loaded) = notifications.into_value() {
            loaded.truncate(MAX_NOTIFICATIONS);
            *self.notifications.write().await = loaded;
        }
        if let Some(loaded) = preferences.into_value() {
            *self.preferences.write().await = loaded;
        }

        info!(
            count = self.notifications.read().await.len(),
            "notification manager initialized"
        );
    }

    // == Create ==
    /// Adds a notification and presents it; returns its id.
    ///
    /// Returns an empty id without touching the inbox when the title or
    /// message is empty, or when `kind` is disabled in the preferences.
    pub async fn create_notification(
        &self,
        kind: NotificationType,
        title: &str,
        message: &str,
        details: NotificationDetails,
    ) -> Result<String> {
        if title.trim().is_empty() || message.trim().is_empty() {
            warn!(%kind, "notification needs a title and a message");
            return Ok(String::new());
        }
        if !self.preferences.read().await.is_enabled(kind) {
            debug!(%kind, "notification type disabled, skipping");
            return Ok(String::new());
        }

        let notification = Notification::new(kind, title, message, details);
        let id = notification.id.clone();
        self.insert(notification, MAX_NOTIFICATIONS).await?;

        self.alerts.present(Alert::new(title, message));
        debug!(id = %id, %kind, "notification created");
        Ok(id)
    }

    /// Prepends `notification`, keeping at most `limit` entries, and persists.
    /// Memory is only updated on success.
    async fn insert(&self, notification: Notification, limit: usize) -> Result<()> {
        let mut notifications = self.notifications.write().await;
        let mut next = Vec::with_capacity(limit);
        next.push(notification);
        next.extend(notifications.iter().take(limit - 1).cloned());

        self.storage.set_item(NOTIFICATIONS_KEY, &next).await?;
        *notifications = next;
        Ok(())
    }

    async fn persist(&self, notifications: &[Notification]) -> Outcome<()> {
        match self.storage.set_item(NOTIFICATIONS_KEY, notifications).await {
            Ok(()) => Outcome::ok(()),
            Err(err) => Outcome::degraded((), err),
        }
    }

    // == Best-effort Mutations ==
    /// Returns whether a notification with `id` exists.
    pub async fn mark_as_read(&self, id: &str) -> Outcome<bool> {
        let mut notifications = self.notifications.write().await;
        let Some(notification) = notifications.iter_mut().find(|n| n.id == id) else {
            return Outcome::ok(false);
        };
        notification.read = true;
        with_value(self.persist(&notifications).await, true)
    }

    /// Returns how many notifications changed state.
    pub async fn mark_all_as_read(&self) -> Outcome<usize> {
        let mut notifications = self.notifications.write().await;
        let mut changed = 0;
        for notification in notifications.iter_mut().filter(|n| !n.read) {
            notification.read = true;
            changed += 1;
        }
        with_value(self.persist(&notifications).await, changed)
    }

    pub async fn delete_notification(&self, id: &str) -> Outcome<bool> {
        let mut notifications = self.notifications.write().await;
        let before = notifications.len();
        notifications.retain(|n| n.id != id);
        if notifications.len() == before {
            return Outcome::ok(false);
        }
        with_value(self.persist(&notifications).await, true)
    }

    pub async fn clear_all_notifications(&self) -> Outcome<()> {
        let mut notifications = self.notifications.write().await;
        notifications.clear();
        match self.storage.remove_item(NOTIFICATIONS_KEY).await {
            Ok(()) => {
                info!("notifications cleared");
                Outcome::ok(())
            }
            Err(err) => Outcome::degraded((), err),
        }
    }

    // == Queries ==
    pub async fn get_notifications(&self) -> Vec<Notification> {
        self.notifications.read().await.clone()
    }

    pub async fn get_unread_notifications(&self) -> Vec<Notification> {
        self.notifications
            .read()
            .await
            .iter()
            .filter(|n| !n.read)
            .cloned()
            .collect()
    }

    pub async fn get_notification_count(&self) -> usize {
        self.notifications.read().await.len()
    }

    pub async fn get_unread_count(&self) -> usize {
        self.notifications
            .read()
            .await
            .iter()
            .filter(|n| !n.read)
            .count()
    }

    // == Preferences ==
    pub async fn get_preferences(&self) -> NotificationPreferences {
        *self.preferences.read().await
    }

    /// Merges `update` and persists the result.
    pub async fn update_preferences(&self, update: PreferencesUpdate) -> Outcome<NotificationPreferences> {
        let mut preferences = self.preferences.write().await;
        *preferences = preferences.merged(&update);
        let merged = *preferences;
        info!(?merged, "notification preferences updated");
        // Subject to the storage max age, see NOTIFICATIONS_KEY.
        match self.storage.set_item(PREFERENCES_KEY, &merged).await {
            Ok(()) => Outcome::ok(merged),
            Err(err) => Outcome::degraded(merged, err),
        }
    }

    // == Typed Constructors ==
    pub async fn create_like_notification(&self, post_id: &str, liker_name: &str) -> Result<String> {
        self.create_notification(
            NotificationType::Like,
            "New Like",
            &format!("{liker_name} liked your post"),
            NotificationDetails::for_post(post_id),
        )
        .await
    }

    pub async fn create_comment_notification(
        &self,
        post_id: &str,
        commenter_name: &str,
        comment: &str,
    ) -> Result<String> {
        let preview: String = comment.chars().take(50).collect();
        self.create_notification(
            NotificationType::Comment,
            "New Comment",
            &format!("{commenter_name} commented: {preview}"),
            NotificationDetails::for_post(post_id),
        )
        .await
    }

    pub async fn create_quest_notification(&self, quest_name: &str, reward: u64) -> Result<String> {
        self.create_notification(
            NotificationType::Quest,
            "Quest Completed!",
            &format!("You completed \"{quest_name}\" and earned {reward} tokens"),
            NotificationDetails::default().with_data(json!({ "quest": quest_name, "reward": reward })),
        )
        .await
    }

    pub async fn create_token_notification(&self, amount: u64, reason: &str) -> Result<String> {
        self.create_notification(
            NotificationType::Token,
            "Tokens Earned",
            &format!("You earned {amount} tokens for {reason}"),
            NotificationDetails::default().with_data(json!({ "amount": amount, "reason": reason })),
        )
        .await
    }

    pub async fn create_friend_notification(&self, user_id: &str, user_name: &str) -> Result<String> {
        self.create_notification(
            NotificationType::Friend,
            "New Friend Request",
            &format!("{user_name} wants to be your friend"),
            NotificationDetails::for_user(user_id),
        )
        .await
    }

    pub async fn create_system_notification(&self, title: &str, message: &str) -> Result<String> {
        self.create_notification(
            NotificationType::System,
            title,
            message,
            NotificationDetails::default(),
        )
        .await
    }

    // == Health ==
    /// Inserts and deletes a sentinel notification, then reports counts.
    ///
    /// The sentinel skips preference gating and is never presented.
    pub async fn get_health_status(&self) -> NotificationHealth {
        let sentinel = Notification::new(
            NotificationType::System,
            "Health Check",
            "Notification system self-test",
            NotificationDetails::default(),
        );
        let sentinel_id = sentinel.id.clone();
        let mut error = None;

        // One slot over the cap so a full inbox loses nothing to the sentinel.
        let can_create = match self.insert(sentinel, MAX_NOTIFICATIONS + 1).await {
            Ok(()) => true,
            Err(err) => {
                error = Some(err.to_string());
                false
            }
        };

        let can_delete = if can_create {
            let deleted = self.delete_notification(&sentinel_id).await;
            if let Some(failure) = &deleted.failure {
                error.get_or_insert(failure.to_string());
            }
            deleted.value && !deleted.is_degraded()
        } else {
            false
        };

        if !can_create || !can_delete {
            self.errors
                .handle_component_error(
                    "NotificationManager",
                    error.as_deref().unwrap_or("health check failed"),
                    None,
                )
                .await;
        }

        NotificationHealth {
            healthy: can_create && can_delete,
            can_create,
            can_delete,
            total: self.get_notification_count().await,
            unread: self.get_unread_count().await,
            preferences: self.get_preferences().await,
            error,
        }
    }
}

fn with_value<T>(outcome: Outcome<()>, value: T) -> Outcome<T> {
    match outcome.failure {
        Some(failure) => Outcome::degraded(value, failure),
        None => Outcome::ok(value),
    }
}

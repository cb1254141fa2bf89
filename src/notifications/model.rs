//! Notification Records
//!
//! Inbox entries and the per-type switches that gate their creation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Maximum number of notifications kept in the inbox.
pub const MAX_NOTIFICATIONS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Like,
    Comment,
    Quest,
    Token,
    Friend,
    System,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NotificationType::Like => "like",
            NotificationType::Comment => "comment",
            NotificationType::Quest => "quest",
            NotificationType::Token => "token",
            NotificationType::Friend => "friend",
            NotificationType::System => "system",
        };
        f.write_str(label)
    }
}

// == Notification ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
}

impl Notification {
    pub fn new(
        kind: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        details: NotificationDetails,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            title: title.into(),
            message: message.into(),
            timestamp: Utc::now(),
            read: false,
            data: details.data,
            user_id: details.user_id,
            post_id: details.post_id,
        }
    }
}

/// Optional payload attached to a notification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationDetails {
    pub data: Option<Value>,
    pub user_id: Option<String>,
    pub post_id: Option<String>,
}

impl NotificationDetails {
    pub fn for_post(post_id: impl Into<String>) -> Self {
        Self {
            post_id: Some(post_id.into()),
            ..Default::default()
        }
    }

    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

// == Preferences ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPreferences {
    pub like: bool,
    pub comment: bool,
    pub quest: bool,
    pub token: bool,
    pub friend: bool,
    pub system: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            like: true,
            comment: true,
            quest: true,
            token: true,
            friend: true,
            system: true,
        }
    }
}

impl NotificationPreferences {
    pub fn is_enabled(&self, kind: NotificationType) -> bool {
        match kind {
            NotificationType::Like => self.like,
            NotificationType::Comment => self.comment,
            NotificationType::Quest => self.quest,
            NotificationType::Token => self.token,
            NotificationType::Friend => self.friend,
            NotificationType::System => self.system,
        }
    }

    pub fn merged(mut self, update: &PreferencesUpdate) -> Self {
        let fields = [
            (&mut self.like, update.like),
            (&mut self.comment, update.comment),
            (&mut self.quest, update.quest),
            (&mut self.token, update.token),
            (&mut self.friend, update.friend),
            (&mut self.system, update.system),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                *field = value;
            }
        }
        self
    }
}

/// Partial preference change; `None` leaves the switch untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PreferencesUpdate {
    pub like: Option<bool>,
    pub comment: Option<bool>,
    pub quest: Option<bool>,
    pub token: Option<bool>,
    pub friend: Option<bool>,
    pub system: Option<bool>,
}

//! Request DTOs for the diagnostics API
//!
//! Defines the structure of incoming query strings.

use serde::Deserialize;

/// Query string for `GET /notifications`
///
/// # Fields
/// - `unread`: When true only unread notifications are listed
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
}

//! Storage Health Module
//!
//! Structured reports produced by the storage self-test and size accounting.

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Storage Stats ==
/// Aggregate size of everything in the underlying store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    /// Sum of key and value lengths in bytes
    pub total_bytes: usize,
    /// Same total expressed in megabytes
    pub total_size_mb: f64,
    /// Number of keys present
    pub item_count: usize,
}

// == Storage Health ==
/// Result of the write/read/delete round trip plus current usage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageHealth {
    pub healthy: bool,
    pub can_write: bool,
    pub can_read: bool,
    pub can_delete: bool,
    pub total_size_mb: f64,
    pub max_size_mb: f64,
    pub item_count: usize,
    /// First failure seen during the check
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl StorageHealth {
    /// Usage as a fraction of the configured cap.
    pub fn usage_ratio(&self) -> f64 {
        if self.max_size_mb <= 0.0 {
            0.0
        } else {
            self.total_size_mb / self.max_size_mb
        }
    }
}

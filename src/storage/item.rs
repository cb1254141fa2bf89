//! Cache Item Module
//!
//! Envelope that wraps every value written through the `StorageManager`.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

// == Cache Item ==
/// A stored value with its write time and optional expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheItem<T> {
    /// The stored value
    pub data: T,
    /// Write timestamp (Unix milliseconds)
    pub timestamp: i64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl<T> CacheItem<T> {
    // == Constructor ==
    /// Wraps `data` stamped with the current time.
    ///
    /// `expires_at` is `timestamp + max_age` when a max age is configured.
    pub fn new(data: T, max_age: Option<Duration>) -> Self {
        let now = current_timestamp_ms();
        let expires_at = max_age.map(|age| now + age.as_millis() as i64);

        Self {
            data,
            timestamp: now,
            expires_at,
        }
    }

    // == Is Expired ==
    /// An item is expired once the current time reaches `expires_at`.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }

    /// Returns remaining lifetime in milliseconds, or None if no expiration is set.
    pub fn ttl_remaining_ms(&self) -> Option<i64> {
        self.expires_at
            .map(|expires| (expires - current_timestamp_ms()).max(0))
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Converts a byte count to megabytes.
pub fn bytes_to_mb(bytes: usize) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

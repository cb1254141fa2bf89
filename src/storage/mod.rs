//! Storage Module
//!
//! Typed cache with lazy expiry and oldest-first trimming over a pluggable
//! key-value backend.

mod backend;
mod health;
mod item;
mod manager;


// Re-export public types
pub use backend::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, StoreResult};
pub use health::{StorageHealth, StorageStats};
pub use item::{bytes_to_mb, current_timestamp_ms, CacheItem};
pub use manager::{StorageConfig, StorageConfigUpdate, StorageManager, HEALTH_CHECK_KEY};

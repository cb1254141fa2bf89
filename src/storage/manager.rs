//! Storage Manager Module
//!
//! Typed, expiring cache over a `KeyValueStore`. Every failure is reported to
//! the `ErrorHandler`; each method either propagates a wrapped `AppError` or
//! hands back an `Outcome` carrying a safe default.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{AppError, Outcome, Result};
use crate::reporting::ErrorHandler;
use crate::storage::{
    bytes_to_mb, current_timestamp_ms, CacheItem, KeyValueStore, StorageHealth, StorageStats,
};

/// Key written and removed by the health self-test.
pub const HEALTH_CHECK_KEY: &str = "__storage_health_check__";

// == Storage Config ==
/// Process-wide cache policy.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    /// Lifetime of a cached item, None = never expires
    pub max_age: Option<Duration>,
    /// Cap for a single item and for the store as a whole
    pub max_size_mb: f64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_age: Some(Duration::from_secs(24 * 60 * 60)),
            max_size_mb: 50.0,
        }
    }
}

/// Partial update merged over the current `StorageConfig`.
#[derive(Debug, Clone, Default)]
pub struct StorageConfigUpdate {
    pub max_age: Option<Option<Duration>>,
    pub max_size_mb: Option<f64>,
}

// == Storage Manager ==
pub struct StorageManager {
    store: Arc<dyn KeyValueStore>,
    errors: Arc<ErrorHandler>,
    config: RwLock<StorageConfig>,
}

impl StorageManager {
    // == Constructor ==
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        errors: Arc<ErrorHandler>,
        config: StorageConfig,
    ) -> Self {
        Self {
            store,
            errors,
            config: RwLock::new(config),
        }
    }

    // == Config ==
    pub fn config(&self) -> StorageConfig {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Merges `update` over the current config and returns the result.
    pub fn set_config(&self, update: StorageConfigUpdate) -> StorageConfig {
        let mut config = self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(max_age) = update.max_age {
            config.max_age = max_age;
        }
        if let Some(max_size_mb) = update.max_size_mb {
            config.max_size_mb = max_size_mb;
        }
        info!(
            max_age_ms = config.max_age.map(|age| age.as_millis() as u64),
            max_size_mb = config.max_size_mb,
            "storage config updated"
        );
        config.clone()
    }

    // == Set Item ==
    /// Wraps `value` in a `CacheItem` and persists it under `key`.
    ///
    /// Nothing is written when validation or the size check fails.
    pub async fn set_item<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        if key.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Storage key cannot be empty".to_string(),
            ));
        }

        let data = serde_json::to_value(value).map_err(|err| {
            AppError::InvalidInput(format!("Value for {key} is not serializable: {err}"))
        })?;
        if data.is_null() {
            return Err(AppError::InvalidInput(format!(
                "Value for {key} cannot be null"
            )));
        }

        let config = self.config();
        let item = CacheItem::new(data, config.max_age);
        let serialized = serde_json::to_string(&item).map_err(|err| {
            AppError::InvalidInput(format!("Value for {key} is not serializable: {err}"))
        })?;

        let size_mb = bytes_to_mb(serialized.len());
        if size_mb > config.max_size_mb {
            let err = AppError::SizeExceeded {
                size_mb,
                max_mb: config.max_size_mb,
            };
            self.errors.handle_validation_error(key, &err.to_string()).await;
            return Err(err);
        }

        if let Err(err) = self.store.set_item(key, serialized).await {
            self.errors
                .handle_storage_error("setItem", &err, Some(key))
                .await;
            return Err(AppError::write_failed("setItem", err));
        }

        debug!(key, size_mb, "item stored");
        Ok(())
    }

    // == Get Item ==
    /// Reads `key`, returning `None` when absent, expired or unreadable.
    ///
    /// Expired and corrupted entries are deleted as a side effect. A
    /// well-formed entry whose data does not fit `T` is left in place.
    pub async fn get_item<T>(&self, key: &str) -> Outcome<Option<T>>
    where
        T: DeserializeOwned,
    {
        let raw = match self.store.get_item(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Outcome::ok(None),
            Err(err) => {
                self.errors
                    .handle_storage_error("getItem", &err, Some(key))
                    .await;
                return Outcome::degraded(None, AppError::read_failed("getItem", err));
            }
        };

        let item: CacheItem<Value> = match serde_json::from_str(&raw) {
            Ok(item) => item,
            Err(err) => {
                debug!(key, error = %err, "discarding corrupted cache entry");
                if let Err(remove_err) = self.store.remove_item(key).await {
                    self.errors
                        .handle_storage_error("getItem", &remove_err, Some(key))
                        .await;
                }
                return Outcome::degraded(
                    None,
                    AppError::Corrupted {
                        key: key.to_string(),
                        reason: err.to_string(),
                    },
                );
            }
        };

        if item.is_expired() {
            debug!(key, "cache entry expired");
            if let Err(err) = self.store.remove_item(key).await {
                self.errors
                    .handle_storage_error("getItem", &err, Some(key))
                    .await;
            }
            return Outcome::ok(None);
        }

        match serde_json::from_value(item.data) {
            Ok(data) => Outcome::ok(Some(data)),
            Err(err) => Outcome::degraded(
                None,
                AppError::Corrupted {
                    key: key.to_string(),
                    reason: err.to_string(),
                },
            ),
        }
    }

    // == Remove Item ==
    pub async fn remove_item(&self, key: &str) -> Result<()> {
        if let Err(err) = self.store.remove_item(key).await {
            self.errors
                .handle_storage_error("removeItem", &err, Some(key))
                .await;
            return Err(AppError::write_failed("removeItem", err));
        }
        Ok(())
    }

    // == Clear ==
    pub async fn clear(&self) -> Result<()> {
        if let Err(err) = self.store.clear().await {
            self.errors.handle_storage_error("clear", &err, None).await;
            return Err(AppError::write_failed("clear", err));
        }
        info!("storage cleared");
        Ok(())
    }

    // == Pass-through Operations ==
    pub async fn get_all_keys(&self) -> Outcome<Vec<String>> {
        match self.store.get_all_keys().await {
            Ok(keys) => Outcome::ok(keys),
            Err(err) => {
                self.errors
                    .handle_storage_error("getAllKeys", &err, None)
                    .await;
                Outcome::degraded(Vec::new(), AppError::read_failed("getAllKeys", err))
            }
        }
    }

    /// Raw values for `keys`; on failure every value is `None`.
    pub async fn multi_get(&self, keys: &[String]) -> Outcome<Vec<(String, Option<String>)>> {
        match self.store.multi_get(keys).await {
            Ok(pairs) => Outcome::ok(pairs),
            Err(err) => {
                self.errors
                    .handle_storage_error("multiGet", &err, None)
                    .await;
                let empty = keys.iter().map(|key| (key.clone(), None)).collect();
                Outcome::degraded(empty, AppError::read_failed("multiGet", err))
            }
        }
    }

    pub async fn multi_set(&self, pairs: Vec<(String, String)>) -> Outcome<()> {
        match self.store.multi_set(pairs).await {
            Ok(()) => Outcome::ok(()),
            Err(err) => {
                self.errors
                    .handle_storage_error("multiSet", &err, None)
                    .await;
                Outcome::degraded((), AppError::write_failed("multiSet", err))
            }
        }
    }

    // == Cleanup Expired ==
    /// Deletes every cache entry whose `expiresAt` has passed.
    ///
    /// Entries that are not cache items are skipped. Returns the number removed.
    pub async fn cleanup_expired_cache(&self) -> Outcome<usize> {
        let entries = match self.load_all("cleanupExpiredCache").await {
            Ok(entries) => entries,
            Err(err) => return Outcome::degraded(0, err),
        };

        let now = current_timestamp_ms();
        let mut removed = 0;
        for (key, raw) in entries {
            let Some(raw) = raw else { continue };
            let Ok(item) = serde_json::from_str::<CacheItem<Value>>(&raw) else {
                continue;
            };
            if !item.is_expired_at(now) {
                continue;
            }
            match self.store.remove_item(&key).await {
                Ok(()) => removed += 1,
                Err(err) => {
                    self.errors
                        .handle_storage_error("cleanupExpiredCache", &err, Some(&key))
                        .await;
                    return Outcome::degraded(
                        removed,
                        AppError::write_failed("cleanupExpiredCache", err),
                    );
                }
            }
        }

        if removed > 0 {
            info!(removed, "expired cache entries removed");
        }
        Outcome::ok(removed)
    }

    // == Clear Old Cache ==
    /// Deletes cache entries oldest-first until the store fits `max_size_mb`.
    ///
    /// Total size is re-measured after every deletion. Returns the number removed.
    pub async fn clear_old_cache(&self) -> Outcome<usize> {
        let max_size_mb = self.config().max_size_mb;
        let mut removed = 0;

        loop {
            let entries = match self.load_all("clearOldCache").await {
                Ok(entries) => entries,
                Err(err) => return Outcome::degraded(removed, err),
            };

            let total_mb = bytes_to_mb(total_bytes(&entries));
            if total_mb <= max_size_mb {
                break;
            }

            let oldest = entries
                .iter()
                .filter_map(|(key, raw)| {
                    let raw = raw.as_ref()?;
                    let item = serde_json::from_str::<CacheItem<Value>>(raw).ok()?;
                    Some((item.timestamp, key))
                })
                .min();

            let Some((_, key)) = oldest else {
                debug!(total_mb, "over size limit but nothing left to evict");
                break;
            };

            if let Err(err) = self.store.remove_item(key).await {
                self.errors
                    .handle_storage_error("clearOldCache", &err, Some(key))
                    .await;
                return Outcome::degraded(removed, AppError::write_failed("clearOldCache", err));
            }
            debug!(key = %key, total_mb, "evicted oldest cache entry");
            removed += 1;
        }

        if removed > 0 {
            info!(removed, "old cache entries evicted");
        }
        Outcome::ok(removed)
    }

    // == Stats ==
    pub async fn storage_stats(&self) -> Outcome<StorageStats> {
        match self.load_all("getStorageStats").await {
            Ok(entries) => {
                let total = total_bytes(&entries);
                Outcome::ok(StorageStats {
                    total_bytes: total,
                    total_size_mb: bytes_to_mb(total),
                    item_count: entries.len(),
                })
            }
            Err(err) => Outcome::degraded(StorageStats::default(), err),
        }
    }

    // == Health ==
    /// Round-trips a sentinel key and reports current usage. Never fails.
    pub async fn get_storage_health(&self) -> StorageHealth {
        let mut error = None;

        let can_write = match self
            .store
            .set_item(HEALTH_CHECK_KEY, current_timestamp_ms().to_string())
            .await
        {
            Ok(()) => true,
            Err(err) => {
                error.get_or_insert(err.to_string());
                false
            }
        };

        let can_read = match self.store.get_item(HEALTH_CHECK_KEY).await {
            Ok(value) => !can_write || value.is_some(),
            Err(err) => {
                error.get_or_insert(err.to_string());
                false
            }
        };

        let can_delete = match self.store.remove_item(HEALTH_CHECK_KEY).await {
            Ok(()) => true,
            Err(err) => {
                error.get_or_insert(err.to_string());
                false
            }
        };

        let stats = self.storage_stats().await;
        if let Some(failure) = &stats.failure {
            error.get_or_insert(failure.to_string());
        }
        let stats = stats.into_value();
        let max_size_mb = self.config().max_size_mb;

        StorageHealth {
            healthy: can_write && can_read && can_delete && stats.total_size_mb <= max_size_mb,
            can_write,
            can_read,
            can_delete,
            total_size_mb: stats.total_size_mb,
            max_size_mb,
            item_count: stats.item_count,
            error,
            checked_at: chrono::Utc::now(),
        }
    }

    async fn load_all(&self, operation: &str) -> Result<Vec<(String, Option<String>)>> {
        let keys = match self.store.get_all_keys().await {
            Ok(keys) => keys,
            Err(err) => {
                self.errors.handle_storage_error(operation, &err, None).await;
                return Err(AppError::read_failed(operation, err));
            }
        };
        match self.store.multi_get(&keys).await {
            Ok(entries) => Ok(entries),
            Err(err) => {
                self.errors.handle_storage_error(operation, &err, None).await;
                Err(AppError::read_failed(operation, err))
            }
        }
    }
}

fn total_bytes(entries: &[(String, Option<String>)]) -> usize {
    entries
        .iter()
        .map(|(key, value)| key.len() + value.as_ref().map_or(0, String::len))
        .sum()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::RecordingAlerts;
    use crate::error::StoreError;
    use crate::storage::{MemoryKeyValueStore, StoreResult};
    use serde::Deserialize;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::sleep;

    fn setup(config: StorageConfig) -> (Arc<MemoryKeyValueStore>, StorageManager, Arc<ErrorHandler>) {
        let store = Arc::new(MemoryKeyValueStore::new());
        let errors = Arc::new(ErrorHandler::new(
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(RecordingAlerts::new()),
        ));
        let manager = StorageManager::new(store.clone(), errors.clone(), config);
        (store, manager, errors)
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Profile {
        id: u32,
        name: String,
    }

    #[tokio::test]
    async fn test_set_and_get_round_trip() {
        let (_, manager, _) = setup(StorageConfig::default());
        let profile = Profile {
            id: 7,
            name: "ada".to_string(),
        };

        manager.set_item("user_7", &profile).await.unwrap();
        let loaded: Option<Profile> = manager.get_item("user_7").await.into_value();

        assert_eq!(loaded, Some(profile));
    }

    #[tokio::test]
    async fn test_set_rejects_empty_key_and_null() {
        let (store, manager, _) = setup(StorageConfig::default());

        assert!(matches!(
            manager.set_item("", &1).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            manager.set_item("k", &Value::Null).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            manager.set_item("k", &None::<u8>).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(store.get_all_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_size_exceeded_leaves_store_unchanged() {
        let (store, manager, errors) = setup(StorageConfig {
            max_age: None,
            max_size_mb: 0.001,
        });
        manager.set_item("keep", &"small").await.unwrap();

        let big = "x".repeat(4096);
        let result = manager.set_item("big", &big).await;

        assert!(matches!(result, Err(AppError::SizeExceeded { .. })));
        assert_eq!(store.get_all_keys().await.unwrap(), vec!["keep"]);
        assert_eq!(errors.get_error_logs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_key_is_none() {
        let (_, manager, _) = setup(StorageConfig::default());

        let outcome = manager.get_item::<String>("missing").await;
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.into_value(), None);
    }

    #[tokio::test]
    async fn test_expiry_scenario() {
        let (_, manager, _) = setup(StorageConfig {
            max_age: Some(Duration::from_millis(1000)),
            max_size_mb: 50.0,
        });

        manager.set_item("k", &json!({"a": 1})).await.unwrap();

        sleep(Duration::from_millis(500)).await;
        let early: Option<Value> = manager.get_item("k").await.into_value();
        assert_eq!(early, Some(json!({"a": 1})));

        sleep(Duration::from_millis(1000)).await;
        let late: Option<Value> = manager.get_item("k").await.into_value();
        assert_eq!(late, None);
        assert!(!manager
            .get_all_keys()
            .await
            .into_value()
            .contains(&"k".to_string()));
    }

    #[tokio::test]
    async fn test_corrupted_entry_is_erased() {
        let (store, manager, _) = setup(StorageConfig::default());
        store
            .set_item("broken", "{not json".to_string())
            .await
            .unwrap();

        let outcome = manager.get_item::<Value>("broken").await;

        assert!(matches!(outcome.failure, Some(AppError::Corrupted { .. })));
        assert_eq!(outcome.value, None);
        assert!(store.get_item("broken").await.unwrap().is_none());
    }

    /// Reads succeed, deletes fail.
    #[derive(Default)]
    struct ReadOnlyStore {
        inner: MemoryKeyValueStore,
    }

    #[async_trait::async_trait]
    impl KeyValueStore for ReadOnlyStore {
        async fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
            self.inner.get_item(key).await
        }

        async fn set_item(&self, key: &str, value: String) -> StoreResult<()> {
            self.inner.set_item(key, value).await
        }

        async fn remove_item(&self, _key: &str) -> StoreResult<()> {
            Err(StoreError::Unavailable("delete refused".to_string()))
        }

        async fn clear(&self) -> StoreResult<()> {
            Err(StoreError::Unavailable("delete refused".to_string()))
        }

        async fn get_all_keys(&self) -> StoreResult<Vec<String>> {
            self.inner.get_all_keys().await
        }
    }

    #[tokio::test]
    async fn test_failed_corrupted_entry_removal_is_reported() {
        let store = Arc::new(ReadOnlyStore::default());
        let errors = Arc::new(ErrorHandler::new(
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(RecordingAlerts::new()),
        ));
        let manager = StorageManager::new(store.clone(), errors.clone(), StorageConfig::default());
        store
            .set_item("broken", "{not json".to_string())
            .await
            .unwrap();

        let outcome = manager.get_item::<Value>("broken").await;

        assert!(matches!(outcome.failure, Some(AppError::Corrupted { .. })));
        let logs = errors.get_error_logs().await;
        assert_eq!(logs.len(), 1);
        assert!(logs[0].error.contains("getItem"));
        assert_eq!(logs[0].severity, crate::reporting::Severity::High);
    }

    #[tokio::test]
    async fn test_type_mismatch_keeps_entry() {
        let (store, manager, _) = setup(StorageConfig::default());
        manager.set_item("theme_mode", &"dark").await.unwrap();

        let outcome = manager.get_item::<Profile>("theme_mode").await;

        assert!(outcome.is_degraded());
        assert!(store.get_item("theme_mode").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_offline_store_degrades_and_reports() {
        let (store, manager, errors) = setup(StorageConfig::default());
        store.set_offline(true);

        assert!(matches!(
            manager.set_item("k", &1).await,
            Err(AppError::StorageWriteFailed { .. })
        ));
        assert!(matches!(
            manager.remove_item("k").await,
            Err(AppError::StorageWriteFailed { .. })
        ));
        assert!(matches!(
            manager.clear().await,
            Err(AppError::StorageWriteFailed { .. })
        ));

        let keys = manager.get_all_keys().await;
        assert!(keys.is_degraded());
        assert!(keys.value.is_empty());

        let pairs = manager
            .multi_get(&["a".to_string(), "b".to_string()])
            .await
            .into_value();
        assert_eq!(
            pairs,
            vec![("a".to_string(), None), ("b".to_string(), None)]
        );

        let read = manager.get_item::<i32>("k").await;
        assert!(matches!(read.failure, Some(AppError::StorageReadFailed { .. })));

        assert!(errors.get_error_logs().await.len() >= 5);
    }

    #[tokio::test]
    async fn test_cleanup_expired_skips_foreign_entries() {
        let (store, manager, _) = setup(StorageConfig {
            max_age: Some(Duration::from_millis(50)),
            max_size_mb: 50.0,
        });
        manager.set_item("short", &1).await.unwrap();
        store
            .set_item("raw", "plain text".to_string())
            .await
            .unwrap();
        manager.set_config(StorageConfigUpdate {
            max_age: Some(None),
            ..Default::default()
        });
        manager.set_item("forever", &2).await.unwrap();

        sleep(Duration::from_millis(100)).await;
        let removed = manager.cleanup_expired_cache().await;

        assert_eq!(removed.into_result().unwrap(), 1);
        assert_eq!(
            store.get_all_keys().await.unwrap(),
            vec!["forever".to_string(), "raw".to_string()]
        );
    }

    #[tokio::test]
    async fn test_clear_old_cache_evicts_oldest_first() {
        let (store, manager, _) = setup(StorageConfig::default());
        let payload = "x".repeat(400);

        manager.set_item("t1", &payload).await.unwrap();
        sleep(Duration::from_millis(5)).await;
        manager.set_item("t2", &payload).await.unwrap();
        sleep(Duration::from_millis(5)).await;
        manager.set_item("t3", &payload).await.unwrap();

        let entry_bytes = store.get_item("t1").await.unwrap().unwrap().len() + 2;
        let two_newest = bytes_to_mb(entry_bytes * 2);
        let all_three = bytes_to_mb(entry_bytes * 3);
        manager.set_config(StorageConfigUpdate {
            max_size_mb: Some((two_newest + all_three) / 2.0),
            ..Default::default()
        });

        let removed = manager.clear_old_cache().await.into_value();

        assert_eq!(removed, 1);
        assert_eq!(
            store.get_all_keys().await.unwrap(),
            vec!["t2".to_string(), "t3".to_string()]
        );
    }

    #[tokio::test]
    async fn test_clear_old_cache_noop_under_limit() {
        let (store, manager, _) = setup(StorageConfig::default());
        manager.set_item("a", &1).await.unwrap();

        assert_eq!(manager.clear_old_cache().await.into_value(), 0);
        assert_eq!(store.get_all_keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_storage_health_reports_usage() {
        let (store, manager, _) = setup(StorageConfig::default());
        manager.set_item("a", &1).await.unwrap();

        let health = manager.get_storage_health().await;
        assert!(health.healthy);
        assert!(health.can_write && health.can_read && health.can_delete);
        assert_eq!(health.item_count, 1);
        assert!(health.error.is_none());
        assert!(store.get_item(HEALTH_CHECK_KEY).await.unwrap().is_none());

        store.set_offline(true);
        let health = manager.get_storage_health().await;
        assert!(!health.healthy);
        assert!(!health.can_write);
        assert!(health.error.is_some());
    }

    #[tokio::test]
    async fn test_set_config_merges() {
        let (_, manager, _) = setup(StorageConfig::default());

        let updated = manager.set_config(StorageConfigUpdate {
            max_size_mb: Some(5.0),
            ..Default::default()
        });

        assert_eq!(updated.max_size_mb, 5.0);
        assert_eq!(updated.max_age, StorageConfig::default().max_age);
    }
}

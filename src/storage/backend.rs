//! Key-Value Backends
//!
//! The durable string store underneath the `StorageManager` and the error log.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::error::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

// == Key-Value Store ==
/// Asynchronous string-to-string persistence.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set_item(&self, key: &str, value: String) -> StoreResult<()>;

    async fn remove_item(&self, key: &str) -> StoreResult<()>;

    async fn clear(&self) -> StoreResult<()>;

    async fn get_all_keys(&self) -> StoreResult<Vec<String>>;

    async fn multi_get(&self, keys: &[String]) -> StoreResult<Vec<(String, Option<String>)>> {
        let mut pairs = Vec::with_capacity(keys.len());
        for key in keys {
            pairs.push((key.clone(), self.get_item(key).await?));
        }
        Ok(pairs)
    }

    async fn multi_set(&self, pairs: Vec<(String, String)>) -> StoreResult<()> {
        for (key, value) in pairs {
            self.set_item(&key, value).await?;
        }
        Ok(())
    }
}

// == Memory Store ==
/// In-process store, mainly for tests and ephemeral sessions.
///
/// `set_offline(true)` makes every call fail with `StoreError::Unavailable`,
/// which is how degradation paths get exercised.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<BTreeMap<String, String>>,
    offline: AtomicBool,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        self.check_online()?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: String) -> StoreResult<()> {
        self.check_online()?;
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> StoreResult<()> {
        self.check_online()?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.check_online()?;
        self.entries.write().await.clear();
        Ok(())
    }

    async fn get_all_keys(&self) -> StoreResult<Vec<String>> {
        self.check_online()?;
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn multi_set(&self, pairs: Vec<(String, String)>) -> StoreResult<()> {
        self.check_online()?;
        let mut entries = self.entries.write().await;
        entries.extend(pairs);
        Ok(())
    }
}

// == File Store ==
/// Store persisted as a single JSON object on disk.
///
/// The whole map is rewritten on every mutation through a temporary file
/// and a rename, so a crash mid-write leaves the previous snapshot intact.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileKeyValueStore {
    /// Opens the store at `path`, creating parent directories as needed.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, entries: &BTreeMap<String, String>) -> StoreResult<()> {
        let serialized = serde_json::to_string(entries)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serialized).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: String) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        let previous = entries.insert(key.to_string(), value);
        if let Err(err) = self.flush(&entries).await {
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        if let Some(old) = entries.remove(key) {
            if let Err(err) = self.flush(&entries).await {
                entries.insert(key.to_string(), old);
                return Err(err);
            }
        }
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        let snapshot = std::mem::take(&mut *entries);
        if let Err(err) = self.flush(&entries).await {
            *entries = snapshot;
            return Err(err);
        }
        Ok(())
    }

    async fn get_all_keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.entries.lock().await.keys().cloned().collect())
    }

    async fn multi_set(&self, pairs: Vec<(String, String)>) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        let snapshot = entries.clone();
        entries.extend(pairs);
        if let Err(err) = self.flush(&entries).await {
            *entries = snapshot;
            return Err(err);
        }
        Ok(())
    }
}

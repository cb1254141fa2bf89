//! Configuration Module
//!
//! Handles loading and managing service configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::network::RequestConfig;
use crate::storage::StorageConfig;

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache item lifetime and size cap
    pub storage: StorageConfig,
    /// Default timeout/retry policy for outgoing requests
    pub request: RequestConfig,
    /// Base URL joined with relative request paths
    pub api_base_url: String,
    /// Directory of the file-backed key-value store
    pub data_dir: PathBuf,
    /// Background maintenance interval in seconds
    pub maintenance_interval: u64,
    /// Diagnostics HTTP port
    pub diagnostics_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `STORAGE_MAX_AGE_MS` - Cache item lifetime, 0 disables expiry (default: 86400000)
    /// - `STORAGE_MAX_SIZE_MB` - Item and aggregate size cap (default: 50)
    /// - `API_BASE_URL` - Request base URL (default: http://localhost:8000/api)
    /// - `REQUEST_TIMEOUT_MS` - Per-attempt timeout (default: 10000)
    /// - `REQUEST_RETRIES` - Extra attempts after the first (default: 3)
    /// - `REQUEST_RETRY_DELAY_MS` - Pause between attempts (default: 1000)
    /// - `DATA_DIR` - Store directory (default: ./data)
    /// - `MAINTENANCE_INTERVAL` - Cache sweep frequency in seconds (default: 300)
    /// - `DIAGNOSTICS_PORT` - Diagnostics HTTP port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_age = match env_or::<u64>("STORAGE_MAX_AGE_MS") {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.storage.max_age,
        };

        let mut request = defaults.request.clone();
        if let Some(ms) = env_or::<u64>("REQUEST_TIMEOUT_MS") {
            request.timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = env_or::<u32>("REQUEST_RETRIES") {
            request.retries = retries;
        }
        if let Some(ms) = env_or::<u64>("REQUEST_RETRY_DELAY_MS") {
            request.retry_delay = Duration::from_millis(ms);
        }

        Self {
            storage: StorageConfig {
                max_age,
                max_size_mb: env_or("STORAGE_MAX_SIZE_MB").unwrap_or(defaults.storage.max_size_mb),
            },
            request,
            api_base_url: env::var("API_BASE_URL").unwrap_or(defaults.api_base_url),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            maintenance_interval: env_or("MAINTENANCE_INTERVAL")
                .unwrap_or(defaults.maintenance_interval),
            diagnostics_port: env_or("DIAGNOSTICS_PORT").unwrap_or(defaults.diagnostics_port),
        }
    }

    /// Path of the key-value store file inside `data_dir`.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("store.json")
    }
}

fn env_or<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            request: RequestConfig::default(),
            api_base_url: "http://localhost:8000/api".to_string(),
            data_dir: PathBuf::from("./data"),
            maintenance_interval: 300,
            diagnostics_port: 3000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.storage.max_age, Some(Duration::from_secs(86_400)));
        assert_eq!(config.storage.max_size_mb, 50.0);
        assert_eq!(config.request.retries, 3);
        assert_eq!(config.maintenance_interval, 300);
        assert_eq!(config.diagnostics_port, 3000);
        assert_eq!(config.store_path(), PathBuf::from("./data/store.json"));
    }

    #[test]
    fn test_config_from_env() {
        // Single test touches the environment to avoid races between tests
        for name in [
            "STORAGE_MAX_SIZE_MB",
            "API_BASE_URL",
            "REQUEST_TIMEOUT_MS",
            "REQUEST_RETRIES",
            "REQUEST_RETRY_DELAY_MS",
            "DATA_DIR",
            "MAINTENANCE_INTERVAL",
            "DIAGNOSTICS_PORT",
        ] {
            env::remove_var(name);
        }
        env::set_var("STORAGE_MAX_AGE_MS", "0");
        env::set_var("REQUEST_RETRIES", "5");
        env::set_var("DIAGNOSTICS_PORT", "not-a-port");

        let config = Config::from_env();
        assert_eq!(config.storage.max_age, None);
        assert_eq!(config.storage.max_size_mb, 50.0);
        assert_eq!(config.request.retries, 5);
        assert_eq!(config.request.timeout, Duration::from_secs(10));
        assert_eq!(config.diagnostics_port, 3000);
        assert_eq!(config.api_base_url, "http://localhost:8000/api");

        env::remove_var("STORAGE_MAX_AGE_MS");
        env::remove_var("REQUEST_RETRIES");
        env::remove_var("DIAGNOSTICS_PORT");
    }
}

//! Request Configuration
//!
//! Process-wide request defaults and the per-call overrides merged over them.

use std::collections::BTreeMap;
use std::time::Duration;

// == Request Config ==
#[derive(Debug, Clone, PartialEq)]
pub struct RequestConfig {
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Extra attempts after the first one
    pub retries: u32,
    /// Fixed pause between attempts
    pub retry_delay: Duration,
    pub headers: BTreeMap<String, String>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Accept".to_string(), "application/json".to_string());

        Self {
            timeout: Duration::from_secs(10),
            retries: 3,
            retry_delay: Duration::from_secs(1),
            headers,
        }
    }
}

impl RequestConfig {
    /// Returns a copy with every field set in `overrides` replaced.
    ///
    /// Headers are merged key by key, override winning.
    pub fn merged(&self, overrides: &RequestOverrides) -> Self {
        let mut merged = self.clone();
        if let Some(timeout) = overrides.timeout {
            merged.timeout = timeout;
        }
        if let Some(retries) = overrides.retries {
            merged.retries = retries;
        }
        if let Some(retry_delay) = overrides.retry_delay {
            merged.retry_delay = retry_delay;
        }
        merged.headers.extend(
            overrides
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        merged
    }
}

// == Request Overrides ==
/// Call-level settings; unset fields fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOverrides {
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub retry_delay: Option<Duration>,
    pub headers: BTreeMap<String, String>,
    /// Id under which the request can be cancelled; generated when absent
    pub request_id: Option<String>,
}

impl RequestOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = Some(retry_delay);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

//! Network Manager
//!
//! HTTP execution with per-attempt timeout, bounded fixed-delay retry and
//! cancellation by request id.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, NetworkFailure, Result};
use crate::network::registry::{CancelGuard, InFlightRequests};
use crate::network::{ApiResponse, Method, RequestConfig, RequestOverrides};
use crate::reporting::ErrorHandler;

/// Host probed by `check_connectivity` unless reconfigured.
pub const DEFAULT_CONNECTIVITY_URL: &str = "https://www.google.com";

const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(5);

// == Network Manager ==
pub struct NetworkManager {
    pub(crate) client: reqwest::Client,
    pub(crate) errors: Arc<ErrorHandler>,
    base_url: RwLock<String>,
    defaults: RwLock<RequestConfig>,
    connectivity_url: RwLock<String>,
    pub(crate) in_flight: InFlightRequests,
}

impl NetworkManager {
    // == Constructor ==
    pub fn new(base_url: impl Into<String>, defaults: RequestConfig, errors: Arc<ErrorHandler>) -> Self {
        Self {
            client: reqwest::Client::new(),
            errors,
            base_url: RwLock::new(base_url.into()),
            defaults: RwLock::new(defaults),
            connectivity_url: RwLock::new(DEFAULT_CONNECTIVITY_URL.to_string()),
            in_flight: InFlightRequests::default(),
        }
    }

    // == Settings ==
    pub fn base_url(&self) -> String {
        self.base_url
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_base_url(&self, base_url: impl Into<String>) {
        let base_url = base_url.into();
        info!(base_url = %base_url, "base URL updated");
        *self
            .base_url
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = base_url;
    }

    pub fn default_config(&self) -> RequestConfig {
        self.defaults
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Merges `overrides` into the process-wide defaults.
    pub fn set_default_config(&self, overrides: RequestOverrides) -> RequestConfig {
        let mut defaults = self
            .defaults
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *defaults = defaults.merged(&overrides);
        defaults.clone()
    }

    pub fn set_connectivity_url(&self, url: impl Into<String>) {
        *self
            .connectivity_url
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = url.into();
    }

    /// Absolute URLs pass through; anything else is joined onto the base URL.
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    // == Make Request ==
    /// Runs the retry loop for one logical request.
    ///
    /// Attempts `retries + 1` times at most, pausing `retry_delay` between
    /// attempts. Timeouts, cancellations and 401/403 end the loop at once.
    /// The final failure is reported to the `ErrorHandler` and returned.
    pub async fn make_request(
        &self,
        path: &str,
        method: Method,
        body: Option<Value>,
        overrides: Option<RequestOverrides>,
    ) -> Result<ApiResponse> {
        let overrides = overrides.unwrap_or_default();
        let url = self.resolve_url(path);
        let config = self.default_config().merged(&overrides);
        let request_id = overrides
            .request_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut cancel = self.in_flight.register(&request_id);

        let mut attempt = 0;
        let failure = loop {
            debug!(%method, url = %url, attempt, request_id = %cancel.id(), "sending request");
            let failure = match self
                .attempt(&url, method, body.as_ref(), &config, &mut cancel)
                .await
            {
                Ok(response) => return Ok(response),
                Err(failure) => failure,
            };

            if !failure.is_retryable() || attempt >= config.retries {
                break failure;
            }
            attempt += 1;
            info!(
                url = %url,
                attempt,
                delay_ms = config.retry_delay.as_millis() as u64,
                error = %failure,
                "retrying request"
            );

            tokio::select! {
                _ = tokio::time::sleep(config.retry_delay) => {}
                _ = cancel.cancelled() => break NetworkFailure::Aborted,
            }
        };

        self.errors.handle_network_error(&url, &failure).await;
        Err(AppError::NetworkRequestFailed { url, failure })
    }

    async fn attempt(
        &self,
        url: &str,
        method: Method,
        body: Option<&Value>,
        config: &RequestConfig,
        cancel: &mut CancelGuard,
    ) -> std::result::Result<ApiResponse, NetworkFailure> {
        let mut request = self.client.request(method.into(), url);
        for (name, value) in &config.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|err| NetworkFailure::Transport(err.to_string()))?;
            read_response(response, url).await
        };

        // Dropping the losing branch aborts the in-flight request or the timer.
        tokio::select! {
            result = exchange => result,
            _ = tokio::time::sleep(config.timeout) => Err(NetworkFailure::Timeout {
                timeout_ms: config.timeout.as_millis() as u64,
            }),
            _ = cancel.cancelled() => Err(NetworkFailure::Aborted),
        }
    }

    // == Verbs ==
    pub async fn get(&self, path: &str, overrides: Option<RequestOverrides>) -> Result<ApiResponse> {
        self.make_request(path, Method::Get, None, overrides).await
    }

    pub async fn post<B>(&self, path: &str, body: &B, overrides: Option<RequestOverrides>) -> Result<ApiResponse>
    where
        B: Serialize + ?Sized,
    {
        let body = encode_body(body)?;
        self.make_request(path, Method::Post, Some(body), overrides).await
    }

    pub async fn put<B>(&self, path: &str, body: &B, overrides: Option<RequestOverrides>) -> Result<ApiResponse>
    where
        B: Serialize + ?Sized,
    {
        let body = encode_body(body)?;
        self.make_request(path, Method::Put, Some(body), overrides).await
    }

    pub async fn patch<B>(&self, path: &str, body: &B, overrides: Option<RequestOverrides>) -> Result<ApiResponse>
    where
        B: Serialize + ?Sized,
    {
        let body = encode_body(body)?;
        self.make_request(path, Method::Patch, Some(body), overrides).await
    }

    pub async fn delete(&self, path: &str, overrides: Option<RequestOverrides>) -> Result<ApiResponse> {
        self.make_request(path, Method::Delete, None, overrides).await
    }

    // == Connectivity ==
    /// HEAD probe of the connectivity host.
    ///
    /// Any response, whatever its status, counts as reachable; any error as
    /// unreachable.
    pub async fn check_connectivity(&self) -> bool {
        let url = self
            .connectivity_url
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        let reachable = self
            .client
            .head(&url)
            .timeout(CONNECTIVITY_TIMEOUT)
            .send()
            .await
            .is_ok();
        debug!(url = %url, reachable, "connectivity probe");
        reachable
    }

    // == Cancellation ==
    /// Aborts every request registered under `id`. Returns false if none is in flight.
    pub fn cancel_request(&self, id: &str) -> bool {
        let cancelled = self.in_flight.cancel(id);
        if cancelled {
            info!(request_id = id, "request cancelled");
        }
        cancelled
    }

    /// Ids of requests currently in flight.
    pub fn in_flight_requests(&self) -> Vec<String> {
        self.in_flight.ids()
    }
}

/// Turns a raw response into an `ApiResponse` or the failure it represents.
///
/// Error bodies are parsed best-effort (`{}` when not JSON); an empty 2xx
/// body becomes `Null`.
pub(crate) async fn read_response(
    response: reqwest::Response,
    url: &str,
) -> std::result::Result<ApiResponse, NetworkFailure> {
    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .map_err(|err| NetworkFailure::Transport(err.to_string()))?;

    if !(200..300).contains(&status) {
        let body = serde_json::from_str(&text).unwrap_or_else(|_| json!({}));
        return Err(NetworkFailure::Status { status, body });
    }

    let data = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).map_err(|err| NetworkFailure::InvalidJson(err.to_string()))?
    };
    Ok(ApiResponse {
        data,
        status,
        url: url.to_string(),
    })
}

fn encode_body<B: Serialize + ?Sized>(body: &B) -> Result<Value> {
    serde_json::to_value(body)
        .map_err(|err| AppError::InvalidInput(format!("Request body is not serializable: {err}")))
}

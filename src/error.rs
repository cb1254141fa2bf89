//! Error types for the resilience layer
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

// == Network Failure ==
/// Why a single HTTP request failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkFailure {
    /// Server answered with a non-2xx status
    #[error("HTTP {status}")]
    Status {
        status: u16,
        /// Parsed error body, `{}` when the body was not JSON
        body: Value,
    },

    /// Attempt exceeded its timeout
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Request was cancelled through `cancel_request`
    #[error("request aborted")]
    Aborted,

    /// Connection-level failure
    #[error("transport error: {0}")]
    Transport(String),

    /// A 2xx response whose body could not be parsed
    #[error("invalid JSON response: {0}")]
    InvalidJson(String),
}

impl NetworkFailure {
    /// Returns the HTTP status when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            NetworkFailure::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 401 and 403 responses.
    pub fn is_auth(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }

    /// Timeouts, aborts and auth rejections are not worth another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, NetworkFailure::Timeout { .. } | NetworkFailure::Aborted) && !self.is_auth()
    }
}

// == Store Error ==
/// Failure reported by a `KeyValueStore` backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

// == App Error Enum ==
/// Unified error type for the resilience layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    /// Bad arguments from the caller
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialized cache entry is larger than the configured cap
    #[error("Item size {size_mb:.3}MB exceeds maximum of {max_mb}MB")]
    SizeExceeded { size_mb: f64, max_mb: f64 },

    /// Underlying persistence rejected a write
    #[error("Storage write failed during {operation}: {reason}")]
    StorageWriteFailed { operation: String, reason: String },

    /// Underlying persistence rejected a read
    #[error("Storage read failed during {operation}: {reason}")]
    StorageReadFailed { operation: String, reason: String },

    /// HTTP request failed after the retry policy gave up
    #[error("Request to {url} failed: {failure}")]
    NetworkRequestFailed { url: String, failure: NetworkFailure },

    /// Persisted payload could not be parsed
    #[error("Corrupted entry {key}: {reason}")]
    Corrupted { key: String, reason: String },
}

impl AppError {
    pub(crate) fn write_failed(operation: &str, err: impl std::fmt::Display) -> Self {
        AppError::StorageWriteFailed {
            operation: operation.to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn read_failed(operation: &str, err: impl std::fmt::Display) -> Self {
        AppError::StorageReadFailed {
            operation: operation.to_string(),
            reason: err.to_string(),
        }
    }

    /// Returns the network failure carried by this error, if any.
    pub fn network_failure(&self) -> Option<&NetworkFailure> {
        match self {
            AppError::NetworkRequestFailed { failure, .. } => Some(failure),
            _ => None,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::SizeExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NetworkRequestFailed { .. } => StatusCode::BAD_GATEWAY,
            AppError::Corrupted { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::StorageWriteFailed { .. } | AppError::StorageReadFailed { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the resilience layer.
pub type Result<T> = std::result::Result<T, AppError>;

// == Outcome ==
/// Result of a best-effort operation.
///
/// `value` always holds something usable (the real result or a safe default);
/// `failure` records why the default was substituted. Callers pick between
/// degrading with [`Outcome::into_value`] and propagating with
/// [`Outcome::into_result`].
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub failure: Option<AppError>,
}

impl<T> Outcome<T> {
    pub fn ok(value: T) -> Self {
        Self { value, failure: None }
    }

    pub fn degraded(value: T, failure: AppError) -> Self {
        Self {
            value,
            failure: Some(failure),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.failure.is_some()
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn into_result(self) -> Result<T> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.value),
        }
    }
}

//! Network Types
//!
//! Verbs, responses and upload payloads exchanged with the `NetworkManager`.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, NetworkFailure, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
            Method::Head => reqwest::Method::HEAD,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&reqwest::Method::from(*self), f)
    }
}

// == Api Response ==
/// Successful response: parsed JSON body (`Null` when empty) and status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub data: Value,
    pub status: u16,
    #[serde(skip)]
    pub url: String,
}

impl ApiResponse {
    /// Decodes `data` into `T`.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value(self.data).map_err(|err| AppError::NetworkRequestFailed {
            url: self.url,
            failure: NetworkFailure::InvalidJson(err.to_string()),
        })
    }
}

// == Upload ==
/// A file sent as one part of a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    /// Form field name
    pub field_name: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            field_name: "file".to_string(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub loaded: u64,
    pub total: u64,
}

impl UploadProgress {
    /// Completed share in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.loaded as f64 / self.total as f64
        }
    }
}

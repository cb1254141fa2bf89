//! Network Module
//!
//! Request execution with timeout, fixed-delay retry and cancellation,
//! plus multipart upload and a connectivity probe.

mod config;
mod manager;
mod registry;
mod types;
mod upload;

// Re-export public types
pub use config::{RequestConfig, RequestOverrides};
pub use manager::{NetworkManager, DEFAULT_CONNECTIVITY_URL};
pub use types::{ApiResponse, Method, UploadFile, UploadProgress};
pub use upload::UPLOAD_CHUNK_SIZE;

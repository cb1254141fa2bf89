//! Reporting Module
//!
//! Structured error logging with persistence, severity-driven user prompts
//! and capture of `tracing` warnings/errors and panics.

mod capture;
mod handler;
mod log;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use capture::{CapturedEvent, ErrorCaptureLayer};
pub use handler::{ErrorHandler, InitState, ERROR_LOGS_KEY};
pub use log::{ErrorLog, ErrorReport, ErrorStats, Severity, MAX_ERROR_LOGS};

//! Error Log Records
//!
//! The structured entries owned by the `ErrorHandler`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Maximum number of entries kept in memory and in the persisted list.
pub const MAX_ERROR_LOGS: usize = 100;

// == Severity ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(label)
    }
}

// == Error Log ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLog {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    pub severity: Severity,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ErrorLog {
    pub(crate) fn from_report(report: ErrorReport) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            error: report.message,
            stack: report.detail,
            component: report.component,
            screen: report.screen,
            severity: report.severity,
            resolved: false,
            metadata: report.metadata,
        }
    }
}

// == Error Report ==
/// Input to `ErrorHandler::log_error`.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorReport {
    pub message: String,
    /// Underlying error text or backtrace
    pub detail: Option<String>,
    pub severity: Severity,
    pub metadata: Option<Value>,
    pub component: Option<String>,
    pub screen: Option<String>,
}

impl ErrorReport {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            detail: None,
            severity,
            metadata: None,
            component: None,
            screen: None,
        }
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn screen(mut self, screen: impl Into<String>) -> Self {
        self.screen = Some(screen.into());
        self
    }
}

// == Error Stats ==
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStats {
    pub total: usize,
    pub unresolved: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl ErrorStats {
    pub fn from_logs(logs: &[ErrorLog]) -> Self {
        let mut stats = ErrorStats {
            total: logs.len(),
            ..Default::default()
        };
        for log in logs {
            if !log.resolved {
                stats.unresolved += 1;
            }
            match log.severity {
                Severity::Low => stats.low += 1,
                Severity::Medium => stats.medium += 1,
                Severity::High => stats.high += 1,
                Severity::Critical => stats.critical += 1,
            }
        }
        stats
    }
}

//! Alert Surface
//!
//! Blocking prompt collaborator used for critical errors and notification presentation.

use std::sync::Mutex;

use tracing::info;

/// Label of the default acknowledgement button.
pub const BUTTON_OK: &str = "OK";

/// Label of the button that asks for an error report to be sent.
pub const BUTTON_REPORT: &str = "Report";

/// A single labeled button on an alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertButton {
    pub label: String,
    /// Rendered as cancel/dismiss by surfaces that distinguish it
    pub cancel: bool,
}

impl AlertButton {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            cancel: false,
        }
    }

    pub fn cancel(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            cancel: true,
        }
    }
}

/// A modal prompt with a title, message and one or more buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub buttons: Vec<AlertButton>,
}

impl Alert {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            buttons: vec![AlertButton::new(BUTTON_OK)],
        }
    }

    pub fn with_buttons(mut self, buttons: Vec<AlertButton>) -> Self {
        self.buttons = buttons;
        self
    }
}

/// Presents alerts to the user.
///
/// Returns the label of the button the user pressed, or `None` if the
/// surface cannot collect a choice.
pub trait AlertSurface: Send + Sync {
    fn present(&self, alert: Alert) -> Option<String>;
}

// == Tracing Alerts ==
/// Headless surface that writes alerts to the log and never answers.
#[derive(Debug, Default, Clone)]
pub struct TracingAlerts;

impl AlertSurface for TracingAlerts {
    fn present(&self, alert: Alert) -> Option<String> {
        info!(title = %alert.title, message = %alert.message, "alert presented");
        None
    }
}

// == Recording Alerts ==
/// Surface that remembers every alert and answers with a fixed button.
#[derive(Debug, Default)]
pub struct RecordingAlerts {
    presented: Mutex<Vec<Alert>>,
    answer: Option<String>,
}

impl RecordingAlerts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every alert with `label`.
    pub fn answering(label: impl Into<String>) -> Self {
        Self {
            presented: Mutex::new(Vec::new()),
            answer: Some(label.into()),
        }
    }

    pub fn presented(&self) -> Vec<Alert> {
        self.presented
            .lock()
            .map(|alerts| alerts.clone())
            .unwrap_or_default()
    }
}

impl AlertSurface for RecordingAlerts {
    fn present(&self, alert: Alert) -> Option<String> {
        if let Ok(mut alerts) = self.presented.lock() {
            alerts.push(alert);
        }
        self.answer.clone()
    }
}

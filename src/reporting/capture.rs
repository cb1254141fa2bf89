//! Error Capture
//!
//! Routes `tracing` warnings/errors and panics into the `ErrorHandler`
//! without the call sites knowing about it.

use std::fmt;

use serde_json::{Map, Value};
use tokio::sync::mpsc::UnboundedSender;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::reporting::Severity;

/// Events from the reporting module itself are never captured.
pub(crate) const REPORTING_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::reporting");

// == Captured Event ==
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedEvent {
    /// A `tracing` event at WARN or ERROR
    Log {
        severity: Severity,
        message: String,
        target: String,
        fields: Map<String, Value>,
    },
    /// A panic on any thread
    Panic {
        message: String,
        location: Option<String>,
        fatal: bool,
    },
}

// == Capture Layer ==
/// `tracing_subscriber` layer that mirrors ERROR events as `medium` and
/// WARN events as `low` error logs. It only observes, so other layers
/// still print the event.
#[derive(Debug, Clone)]
pub struct ErrorCaptureLayer {
    sender: UnboundedSender<CapturedEvent>,
}

impl ErrorCaptureLayer {
    pub(crate) fn new(sender: UnboundedSender<CapturedEvent>) -> Self {
        Self { sender }
    }
}

impl<S: Subscriber> Layer<S> for ErrorCaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let severity = match *metadata.level() {
            Level::ERROR => Severity::Medium,
            Level::WARN => Severity::Low,
            _ => return,
        };
        if metadata.target().starts_with(REPORTING_TARGET) {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        // Receiver gone means the handler was dropped; nothing to report to.
        let _ = self.sender.send(CapturedEvent::Log {
            severity,
            message: visitor.message.unwrap_or_default(),
            target: metadata.target().to_string(),
            fields: visitor.fields,
        });
    }
}

#[derive(Default)]
struct EventVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl EventVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(text) => text,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::from(format!("{value:?}")));
    }
}

// == Panic Hook ==
/// Chains a hook in front of the current panic hook.
///
/// Panics on the thread named `main` are fatal.
pub(crate) fn install_panic_hook(sender: UnboundedSender<CapturedEvent>) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let payload = info.payload();
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "panic with non-string payload".to_string()
        };
        let location = info
            .location()
            .map(|location| format!("{}:{}", location.file(), location.line()));
        let fatal = std::thread::current().name() == Some("main");

        let _ = sender.send(CapturedEvent::Panic {
            message,
            location,
            fatal,
        });
        previous(info);
    }));
}

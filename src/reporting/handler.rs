//! Error Handler
//!
//! Terminal sink for every failure in the crate: classifies, records,
//! persists and, for critical errors, interrupts the user. Nothing here
//! propagates an error; persistence problems degrade to log output only.

use std::fmt::Display;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::alert::{Alert, AlertButton, AlertSurface, BUTTON_OK, BUTTON_REPORT};
use crate::error::NetworkFailure;
use crate::reporting::capture::{install_panic_hook, CapturedEvent, ErrorCaptureLayer};
use crate::reporting::{ErrorLog, ErrorReport, ErrorStats, Severity, MAX_ERROR_LOGS};
use crate::storage::KeyValueStore;

/// Store key holding the serialized error log list.
pub const ERROR_LOGS_KEY: &str = "error_logs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    Initializing,
    Initialized,
}

// == Error Handler ==
pub struct ErrorHandler {
    store: Arc<dyn KeyValueStore>,
    alerts: Arc<dyn AlertSurface>,
    /// Newest first, at most `MAX_ERROR_LOGS`
    logs: RwLock<Vec<ErrorLog>>,
    state: Mutex<InitState>,
    capture_tx: UnboundedSender<CapturedEvent>,
    /// Taken on initialization; `None` afterwards means hooks are installed
    capture_rx: Mutex<Option<UnboundedReceiver<CapturedEvent>>>,
}

impl ErrorHandler {
    // == Constructor ==
    /// `store` receives the persisted log list; `alerts` shows critical prompts.
    pub fn new(store: Arc<dyn KeyValueStore>, alerts: Arc<dyn AlertSurface>) -> Self {
        let (capture_tx, capture_rx) = mpsc::unbounded_channel();
        Self {
            store,
            alerts,
            logs: RwLock::new(Vec::new()),
            state: Mutex::new(InitState::Uninitialized),
            capture_tx,
            capture_rx: Mutex::new(Some(capture_rx)),
        }
    }

    /// Layer to add to the global subscriber so WARN/ERROR events are recorded.
    ///
    /// Events are buffered until `initialize` starts draining them.
    pub fn capture_layer(&self) -> ErrorCaptureLayer {
        ErrorCaptureLayer::new(self.capture_tx.clone())
    }

    pub fn state(&self) -> InitState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_initialized(&self) -> bool {
        self.state() == InitState::Initialized
    }

    // == Initialize ==
    /// Loads persisted logs and installs the capture pump and panic hook.
    ///
    /// Calling it again, or while another call is in progress, does nothing.
    pub async fn initialize(self: &Arc<Self>) {
        {
            let mut state = self
                .state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if *state != InitState::Uninitialized {
                debug!(state = ?*state, "error handler already initialized");
                return;
            }
            *state = InitState::Initializing;
        }

        self.load_persisted_logs().await;
        self.install_hooks();

        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = InitState::Initialized;
        info!(
            loaded = self.logs.read().await.len(),
            "error handler initialized"
        );
    }

    async fn load_persisted_logs(&self) {
        let raw = match self.store.get_item(ERROR_LOGS_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(err) => {
                warn!(error = %err, "could not load persisted error logs");
                return;
            }
        };

        match serde_json::from_str::<Vec<ErrorLog>>(&raw) {
            Ok(loaded) => {
                let mut logs = self.logs.write().await;
                logs.extend(loaded);
                logs.truncate(MAX_ERROR_LOGS);
            }
            Err(err) => warn!(error = %err, "persisted error logs are corrupted"),
        }
    }

    fn install_hooks(self: &Arc<Self>) {
        let receiver = self
            .capture_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(mut receiver) = receiver else {
            return;
        };

        install_panic_hook(self.capture_tx.clone());

        let handler = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                let Some(handler) = handler.upgrade() else {
                    break;
                };
                handler.record_captured(event).await;
            }
        });
    }

    async fn record_captured(&self, event: CapturedEvent) {
        match event {
            CapturedEvent::Log {
                severity,
                message,
                target,
                fields,
            } => {
                let report = ErrorReport::new(message, severity).metadata(json!({
                    "source": "tracing",
                    "target": target,
                    "fields": fields,
                }));
                self.log_error(report).await;
            }
            CapturedEvent::Panic {
                message,
                location,
                fatal,
            } => {
                self.report_uncaught(&message, location.as_deref(), fatal)
                    .await;
            }
        }
    }

    // == Log Error ==
    /// Records `report` and returns the new log id.
    ///
    /// An empty message is rejected with an empty id. Critical reports
    /// prompt the user with "OK" / "Report".
    pub async fn log_error(&self, report: ErrorReport) -> String {
        self.record(report, true).await
    }

    async fn record(&self, report: ErrorReport, prompt: bool) -> String {
        if report.message.trim().is_empty() {
            warn!("ignoring error report without a message");
            return String::new();
        }

        let log = ErrorLog::from_report(report);
        let id = log.id.clone();
        let severity = log.severity;
        emit(&log);

        {
            let mut logs = self.logs.write().await;
            logs.insert(0, log.clone());
            logs.truncate(MAX_ERROR_LOGS);
            self.persist(&logs).await;
        }

        if prompt && severity == Severity::Critical {
            self.prompt_critical(&log);
        }
        id
    }

    async fn persist(&self, logs: &[ErrorLog]) {
        let serialized = match serde_json::to_string(logs) {
            Ok(serialized) => serialized,
            Err(err) => {
                error!(error = %err, "could not serialize error logs");
                return;
            }
        };
        if let Err(err) = self.store.set_item(ERROR_LOGS_KEY, serialized).await {
            error!(error = %err, "could not persist error logs");
        }
    }

    fn prompt_critical(&self, log: &ErrorLog) {
        let alert = Alert::new(
            "Critical Error",
            format!(
                "{}\n\nWould you like to report this issue?",
                log.error
            ),
        )
        .with_buttons(vec![
            AlertButton::cancel(BUTTON_OK),
            AlertButton::new(BUTTON_REPORT),
        ]);

        if self.alerts.present(alert).as_deref() == Some(BUTTON_REPORT) {
            info!(id = %log.id, "user asked to report critical error");
        }
    }

    // == Uncaught ==
    /// Records a failure nobody handled: `critical` when fatal, else `high`.
    ///
    /// Fatal failures also tell the user the app will restart.
    pub async fn report_uncaught(&self, message: &str, location: Option<&str>, fatal: bool) -> String {
        let severity = if fatal {
            Severity::Critical
        } else {
            Severity::High
        };
        let mut report = ErrorReport::new(message, severity)
            .metadata(json!({ "uncaught": true, "fatal": fatal }));
        if let Some(location) = location {
            report = report.detail(location);
        }

        let id = self.record(report, !fatal).await;
        if fatal {
            self.alerts.present(
                Alert::new(
                    "Unexpected Error",
                    "The app encountered a critical error and will restart.",
                )
                .with_buttons(vec![AlertButton::new("Restart")]),
            );
        }
        id
    }

    // == Typed Handlers ==
    pub async fn handle_network_error(&self, url: &str, failure: &NetworkFailure) -> String {
        let kind = match failure {
            NetworkFailure::Status { .. } => "status",
            NetworkFailure::Timeout { .. } => "timeout",
            NetworkFailure::Aborted => "aborted",
            NetworkFailure::Transport(_) => "transport",
            NetworkFailure::InvalidJson(_) => "invalid_json",
        };
        let report = ErrorReport::new(format!("Network request failed: {failure}"), Severity::Medium)
            .component("NetworkManager")
            .metadata(json!({
                "url": url,
                "kind": kind,
                "status": failure.status(),
            }));
        self.log_error(report).await
    }

    pub async fn handle_storage_error(
        &self,
        operation: &str,
        error: impl Display,
        key: Option<&str>,
    ) -> String {
        let report = ErrorReport::new(format!("Storage operation failed: {operation}"), Severity::High)
            .detail(error.to_string())
            .component("StorageManager")
            .metadata(json!({ "operation": operation, "key": key }));
        self.log_error(report).await
    }

    pub async fn handle_component_error(
        &self,
        component: &str,
        error: impl Display,
        screen: Option<&str>,
    ) -> String {
        let mut report = ErrorReport::new(format!("Component error in {component}"), Severity::High)
            .detail(error.to_string())
            .component(component);
        if let Some(screen) = screen {
            report = report.screen(screen);
        }
        self.log_error(report).await
    }

    pub async fn handle_validation_error(&self, field: &str, message: &str) -> String {
        let report = ErrorReport::new(format!("Validation failed for {field}: {message}"), Severity::Low)
            .metadata(json!({ "field": field }));
        self.log_error(report).await
    }

    /// Logs only when `duration` exceeds `threshold`.
    pub async fn handle_performance_issue(
        &self,
        operation: &str,
        duration: Duration,
        threshold: Duration,
    ) -> Option<String> {
        if duration <= threshold {
            return None;
        }
        let report = ErrorReport::new(
            format!(
                "Slow operation {operation}: {}ms (threshold {}ms)",
                duration.as_millis(),
                threshold.as_millis()
            ),
            Severity::Low,
        )
        .metadata(json!({
            "operation": operation,
            "durationMs": duration.as_millis() as u64,
            "thresholdMs": threshold.as_millis() as u64,
        }));
        Some(self.log_error(report).await)
    }

    // == Queries ==
    /// Snapshot of all logs, newest first.
    pub async fn get_error_logs(&self) -> Vec<ErrorLog> {
        self.logs.read().await.clone()
    }

    pub async fn get_unresolved_errors(&self) -> Vec<ErrorLog> {
        self.logs
            .read()
            .await
            .iter()
            .filter(|log| !log.resolved)
            .cloned()
            .collect()
    }

    pub async fn error_stats(&self) -> ErrorStats {
        ErrorStats::from_logs(&self.logs.read().await)
    }

    // == Mutations ==
    /// Flags `id` as resolved and re-persists. Returns false for unknown ids.
    pub async fn mark_error_resolved(&self, id: &str) -> bool {
        let mut logs = self.logs.write().await;
        let Some(log) = logs.iter_mut().find(|log| log.id == id) else {
            debug!(id, "no error log to resolve");
            return false;
        };
        log.resolved = true;
        self.persist(&logs).await;
        true
    }

    pub async fn clear_error_logs(&self) {
        let mut logs = self.logs.write().await;
        logs.clear();
        if let Err(err) = self.store.remove_item(ERROR_LOGS_KEY).await {
            error!(error = %err, "could not clear persisted error logs");
        }
        info!("error logs cleared");
    }
}

fn emit(log: &ErrorLog) {
    match log.severity {
        Severity::Critical | Severity::High => error!(
            id = %log.id,
            severity = %log.severity,
            component = log.component.as_deref(),
            "{}",
            log.error
        ),
        Severity::Medium => warn!(id = %log.id, severity = %log.severity, "{}", log.error),
        Severity::Low => debug!(id = %log.id, severity = %log.severity, "{}", log.error),
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::RecordingAlerts;
    use crate::storage::MemoryKeyValueStore;
    use tokio_test::assert_ok;

    fn setup() -> (Arc<MemoryKeyValueStore>, Arc<RecordingAlerts>, Arc<ErrorHandler>) {
        let store = Arc::new(MemoryKeyValueStore::new());
        let alerts = Arc::new(RecordingAlerts::answering(BUTTON_REPORT));
        let handler = Arc::new(ErrorHandler::new(store.clone(), alerts.clone()));
        (store, alerts, handler)
    }

    async fn persisted(store: &MemoryKeyValueStore) -> Vec<ErrorLog> {
        let raw = store.get_item(ERROR_LOGS_KEY).await.unwrap().unwrap();
        assert_ok!(serde_json::from_str(&raw))
    }

    #[tokio::test]
    async fn test_log_error_prepends_and_persists() {
        let (store, alerts, handler) = setup();

        let first = handler
            .log_error(ErrorReport::new("first", Severity::Low))
            .await;
        let second = handler
            .log_error(ErrorReport::new("second", Severity::Medium))
            .await;

        let logs = handler.get_error_logs().await;
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].id, second);
        assert_eq!(logs[1].id, first);
        assert_eq!(persisted(&store).await, logs);
        assert!(alerts.presented().is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let (_, _, handler) = setup();

        let id = handler
            .log_error(ErrorReport::new("   ", Severity::High))
            .await;

        assert!(id.is_empty());
        assert!(handler.get_error_logs().await.is_empty());
    }

    #[tokio::test]
    async fn test_critical_prompts_user() {
        let (_, alerts, handler) = setup();

        handler
            .log_error(ErrorReport::new("payment failed", Severity::Critical))
            .await;

        let presented = alerts.presented();
        assert_eq!(presented.len(), 1);
        assert_eq!(presented[0].title, "Critical Error");
        let labels: Vec<_> = presented[0].buttons.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec![BUTTON_OK, BUTTON_REPORT]);
    }

    #[tokio::test]
    async fn test_log_cap_keeps_newest() {
        let (store, _, handler) = setup();

        for i in 0..(MAX_ERROR_LOGS + 5) {
            handler
                .log_error(ErrorReport::new(format!("error {i}"), Severity::Low))
                .await;
        }

        let logs = handler.get_error_logs().await;
        assert_eq!(logs.len(), MAX_ERROR_LOGS);
        assert_eq!(logs[0].error, format!("error {}", MAX_ERROR_LOGS + 4));
        assert_eq!(logs[MAX_ERROR_LOGS - 1].error, "error 5");
        assert_eq!(persisted(&store).await.len(), MAX_ERROR_LOGS);
    }

    #[tokio::test]
    async fn test_snapshots_are_independent() {
        let (_, _, handler) = setup();
        handler
            .log_error(ErrorReport::new("x", Severity::Low))
            .await;

        let mut snapshot = handler.get_error_logs().await;
        snapshot[0].resolved = true;
        snapshot.clear();

        let logs = handler.get_error_logs().await;
        assert_eq!(logs.len(), 1);
        assert!(!logs[0].resolved);
    }

    #[tokio::test]
    async fn test_mark_resolved_filters_unresolved() {
        let (store, _, handler) = setup();
        let a = handler.log_error(ErrorReport::new("a", Severity::Low)).await;
        handler.log_error(ErrorReport::new("b", Severity::Low)).await;

        assert!(handler.mark_error_resolved(&a).await);
        assert!(!handler.mark_error_resolved("unknown").await);

        let unresolved = handler.get_unresolved_errors().await;
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].error, "b");
        assert!(persisted(&store).await.iter().any(|log| log.id == a && log.resolved));
        assert_eq!(handler.error_stats().await.unresolved, 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_swallowed() {
        let (store, _, handler) = setup();
        store.set_offline(true);

        let id = handler
            .log_error(ErrorReport::new("still recorded", Severity::High))
            .await;

        assert!(!id.is_empty());
        assert_eq!(handler.get_error_logs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_initialize_loads_and_is_idempotent() {
        let (store, alerts, handler) = setup();
        handler
            .log_error(ErrorReport::new("from last session", Severity::Medium))
            .await;

        let restarted = Arc::new(ErrorHandler::new(store.clone(), alerts));
        assert_eq!(restarted.state(), InitState::Uninitialized);

        restarted.initialize().await;
        restarted.initialize().await;

        assert!(restarted.is_initialized());
        let logs = restarted.get_error_logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].error, "from last session");
    }

    #[tokio::test]
    async fn test_initialize_survives_corrupted_logs() {
        let (store, _, handler) = setup();
        store
            .set_item(ERROR_LOGS_KEY, "garbage".to_string())
            .await
            .unwrap();

        handler.initialize().await;

        assert!(handler.is_initialized());
        assert!(handler.get_error_logs().await.is_empty());
    }

    #[tokio::test]
    async fn test_performance_issue_threshold() {
        let (_, _, handler) = setup();

        let below = handler
            .handle_performance_issue("render", Duration::from_millis(10), Duration::from_millis(16))
            .await;
        let above = handler
            .handle_performance_issue("render", Duration::from_millis(40), Duration::from_millis(16))
            .await;

        assert!(below.is_none());
        assert!(above.is_some());
        assert_eq!(handler.get_error_logs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_typed_handlers_set_severity() {
        let (_, _, handler) = setup();

        handler.handle_validation_error("email", "missing @").await;
        handler
            .handle_storage_error("setItem", "disk full", Some("theme_mode"))
            .await;
        handler
            .handle_component_error("FeedScreen", "render failed", Some("Feed"))
            .await;
        handler
            .handle_network_error(
                "http://api/posts",
                &NetworkFailure::Status {
                    status: 500,
                    body: json!({}),
                },
            )
            .await;

        let logs = handler.get_error_logs().await;
        assert_eq!(logs[3].severity, Severity::Low);
        assert_eq!(logs[2].severity, Severity::High);
        assert_eq!(logs[2].metadata.as_ref().unwrap()["key"], "theme_mode");
        assert_eq!(logs[1].screen.as_deref(), Some("Feed"));
        assert_eq!(logs[0].severity, Severity::Medium);
        assert_eq!(logs[0].metadata.as_ref().unwrap()["status"], 500);
    }

    #[tokio::test]
    async fn test_fatal_uncaught_prompts_restart() {
        let (_, alerts, handler) = setup();

        handler.report_uncaught("index out of bounds", Some("src/feed.rs:10"), true).await;
        handler.report_uncaught("worker died", None, false).await;

        let logs = handler.get_error_logs().await;
        assert_eq!(logs[1].severity, Severity::Critical);
        assert_eq!(logs[1].stack.as_deref(), Some("src/feed.rs:10"));
        assert_eq!(logs[0].severity, Severity::High);

        let presented = alerts.presented();
        assert_eq!(presented.len(), 1);
        assert_eq!(presented[0].title, "Unexpected Error");
    }

    #[tokio::test]
    async fn test_captured_events_are_recorded() {
        let (_, _, handler) = setup();
        handler.initialize().await;

        handler
            .capture_tx
            .send(CapturedEvent::Log {
                severity: Severity::Low,
                message: "cache miss storm".to_string(),
                target: "client_resilience::storage".to_string(),
                fields: Default::default(),
            })
            .unwrap();

        for _ in 0..50 {
            if !handler.get_error_logs().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let logs = handler.get_error_logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].error, "cache miss storm");
        assert_eq!(logs[0].severity, Severity::Low);
    }

    #[tokio::test]
    async fn test_clear_error_logs() {
        let (store, _, handler) = setup();
        handler.log_error(ErrorReport::new("x", Severity::Low)).await;

        handler.clear_error_logs().await;

        assert!(handler.get_error_logs().await.is_empty());
        assert!(store.get_item(ERROR_LOGS_KEY).await.unwrap().is_none());
    }
}

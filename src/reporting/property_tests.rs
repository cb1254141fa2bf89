//! Property-Based Tests for Reporting Module
//!
//! Checks the log cap and ordering over arbitrary sequences of reports.

use proptest::prelude::*;
use std::sync::Arc;

use crate::alert::RecordingAlerts;
use crate::reporting::{ErrorHandler, ErrorLog, ErrorReport, Severity, ERROR_LOGS_KEY, MAX_ERROR_LOGS};
use crate::storage::{KeyValueStore, MemoryKeyValueStore};

fn severity_strategy() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Low),
        Just(Severity::Medium),
        Just(Severity::High),
        Just(Severity::Critical),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    // After any sequence of reports the in-memory and persisted lists hold at
    // most MAX_ERROR_LOGS entries: the most recent ones, newest first.
    #[test]
    fn prop_log_cap_and_order(severities in prop::collection::vec(severity_strategy(), 1..160)) {
        let store = Arc::new(MemoryKeyValueStore::new());
        let handler = ErrorHandler::new(store.clone(), Arc::new(RecordingAlerts::new()));

        let (logs, persisted) = tokio_test::block_on(async {
            for (i, severity) in severities.iter().enumerate() {
                handler.log_error(ErrorReport::new(format!("error {i}"), *severity)).await;
            }
            let raw = store.get_item(ERROR_LOGS_KEY).await.unwrap().unwrap();
            let persisted: Vec<ErrorLog> = serde_json::from_str(&raw).unwrap();
            (handler.get_error_logs().await, persisted)
        });

        let expected_len = severities.len().min(MAX_ERROR_LOGS);
        prop_assert_eq!(logs.len(), expected_len);
        prop_assert_eq!(&persisted, &logs);

        for (position, log) in logs.iter().enumerate() {
            let expected_index = severities.len() - 1 - position;
            prop_assert_eq!(&log.error, &format!("error {expected_index}"));
            prop_assert_eq!(log.severity, severities[expected_index]);
        }
    }
}

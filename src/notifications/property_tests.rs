//! Property-Based Tests for Notifications Module
//!
//! Uses proptest to check preference gating and the inbox cap.

use proptest::prelude::*;
use std::sync::Arc;

use crate::alert::RecordingAlerts;
use crate::notifications::{
    NotificationDetails, NotificationManager, NotificationType, PreferencesUpdate,
    MAX_NOTIFICATIONS,
};
use crate::reporting::ErrorHandler;
use crate::storage::{MemoryKeyValueStore, StorageConfig, StorageManager};

fn kind_strategy() -> impl Strategy<Value = NotificationType> {
    prop_oneof![
        Just(NotificationType::Like),
        Just(NotificationType::Comment),
        Just(NotificationType::Quest),
        Just(NotificationType::Token),
        Just(NotificationType::Friend),
        Just(NotificationType::System),
    ]
}

fn update_strategy() -> impl Strategy<Value = PreferencesUpdate> {
    prop::array::uniform6(any::<Option<bool>>()).prop_map(|[like, comment, quest, token, friend, system]| {
        PreferencesUpdate {
            like,
            comment,
            quest,
            token,
            friend,
            system,
        }
    })
}

async fn manager() -> Arc<NotificationManager> {
    let alerts = Arc::new(RecordingAlerts::new());
    let errors = Arc::new(ErrorHandler::new(
        Arc::new(MemoryKeyValueStore::new()),
        alerts.clone(),
    ));
    let storage = Arc::new(StorageManager::new(
        Arc::new(MemoryKeyValueStore::new()),
        errors.clone(),
        StorageConfig::default(),
    ));
    NotificationManager::create(storage, errors, alerts).await
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    // A notification is created exactly when its type is enabled.
    #[test]
    fn prop_preferences_gate_creation(
        update in update_strategy(),
        kinds in prop::collection::vec(kind_strategy(), 1..20),
    ) {
        let (created, expected, count) = tokio_test::block_on(async {
            let manager = manager().await;
            let prefs = manager.update_preferences(update).await.into_value();

            let mut created = 0;
            for kind in &kinds {
                let id = manager
                    .create_notification(*kind, "title", "message", NotificationDetails::default())
                    .await
                    .unwrap();
                if !id.is_empty() {
                    created += 1;
                }
            }
            let expected = kinds.iter().filter(|kind| prefs.is_enabled(**kind)).count();
            (created, expected, manager.get_notification_count().await)
        });

        prop_assert_eq!(created, expected);
        prop_assert_eq!(count, expected);
    }

    // The inbox never grows past its cap and keeps the newest entries.
    #[test]
    fn prop_inbox_capped(extra in 1usize..20) {
        let total = MAX_NOTIFICATIONS + extra;

        let notifications = tokio_test::block_on(async {
            let manager = manager().await;
            for n in 0..total {
                manager
                    .create_system_notification("tick", &n.to_string())
                    .await
                    .unwrap();
            }
            manager.get_notifications().await
        });

        prop_assert_eq!(notifications.len(), MAX_NOTIFICATIONS);
        let newest = (total - 1).to_string();
        prop_assert_eq!(notifications[0].message.as_str(), newest.as_str());
    }
}

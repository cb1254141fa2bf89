//! Cache Maintenance Task
//!
//! Background task that periodically sweeps expired entries and evicts the
//! oldest ones while the store is over its size cap.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::storage::StorageManager;

/// What one maintenance pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceReport {
    pub expired_removed: usize,
    pub evicted: usize,
    /// True when either step hit a storage failure
    pub degraded: bool,
}

/// Runs `cleanup_expired_cache` then `clear_old_cache` once.
pub async fn run_maintenance(storage: &StorageManager) -> MaintenanceReport {
    let expired = storage.cleanup_expired_cache().await;
    let evicted = storage.clear_old_cache().await;

    MaintenanceReport {
        degraded: expired.is_degraded() || evicted.is_degraded(),
        expired_removed: expired.into_value(),
        evicted: evicted.into_value(),
    }
}

/// Spawns a background task that runs a maintenance pass every interval.
///
/// # Arguments
/// * `storage` - shared storage manager
/// * `interval_secs` - Interval in seconds between passes
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_maintenance_task(storage: Arc<StorageManager>, interval_secs: u64) -> JoinHandle<()> {
    spawn_with_interval(storage, Duration::from_secs(interval_secs))
}

fn spawn_with_interval(storage: Arc<StorageManager>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_ms = interval.as_millis() as u64,
            "starting cache maintenance task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let report = run_maintenance(&storage).await;
            if report.expired_removed > 0 || report.evicted > 0 {
                info!(
                    expired = report.expired_removed,
                    evicted = report.evicted,
                    "cache maintenance pass"
                );
            } else {
                debug!(degraded = report.degraded, "cache maintenance: nothing to do");
            }
        }
    })
}

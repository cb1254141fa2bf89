//! In-Flight Requests
//!
//! Table of cancellation switches keyed by request id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

/// Every request registered under an id, tagged with its guard's generation.
type Switches = Arc<Mutex<HashMap<String, Vec<(u64, watch::Sender<bool>)>>>>;

#[derive(Debug, Clone, Default)]
pub(crate) struct InFlightRequests {
    switches: Switches,
    generation: Arc<AtomicU64>,
}

impl InFlightRequests {
    /// Registers `id`; the entry is removed when the guard drops.
    ///
    /// Ids may be shared by concurrent requests.
    pub(crate) fn register(&self, id: &str) -> CancelGuard {
        let (tx, rx) = watch::channel(false);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        self.lock()
            .entry(id.to_string())
            .or_default()
            .push((generation, tx));
        CancelGuard {
            id: id.to_string(),
            generation,
            switches: self.switches.clone(),
            receiver: rx,
        }
    }

    /// Flips the switch of every request under `id`. Returns false when
    /// nothing is in flight under it.
    pub(crate) fn cancel(&self, id: &str) -> bool {
        let Some(senders) = self.lock().remove(id) else {
            return false;
        };
        senders
            .into_iter()
            .fold(false, |sent, (_, tx)| tx.send(true).is_ok() || sent)
    }

    pub(crate) fn ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<(u64, watch::Sender<bool>)>>> {
        self.switches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub(crate) struct CancelGuard {
    id: String,
    generation: u64,
    switches: Switches,
    receiver: watch::Receiver<bool>,
}

impl CancelGuard {
    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    /// Resolves once the request is cancelled; pends forever otherwise.
    pub(crate) async fn cancelled(&mut self) {
        if self.receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        let mut switches = self
            .switches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(senders) = switches.get_mut(&self.id) else {
            return;
        };
        senders.retain(|(generation, _)| *generation != self.generation);
        if senders.is_empty() {
            switches.remove(&self.id);
        }
    }
}

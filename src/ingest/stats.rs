use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::reconcile::ReconcileResult;

/// Per-run ingestion counters for diagnostics. Never persisted.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSnapshot {
    pub samples_seen: u64,
    pub deltas_credited: u64,
    pub steps_credited: u64,
    pub resets_observed: u64,
    pub uploads_enqueued: u64,
    pub uploads_dropped: u64,
}

#[derive(Clone)]
pub struct IngestStats {
    inner: Arc<Mutex<IngestSnapshot>>,
}

impl IngestStats {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(IngestSnapshot::default())),
        }
    }

    pub async fn record_sample(&self, result: &ReconcileResult) {
        let mut state = self.inner.lock().await;
        state.samples_seen += 1;
        match result {
            ReconcileResult::Delta(amount) => {
                state.deltas_credited += 1;
                state.steps_credited += amount;
            }
            ReconcileResult::Reset => state.resets_observed += 1,
            ReconcileResult::Initialized | ReconcileResult::NoChange => {}
        }
    }

    pub async fn record_upload(&self, enqueued: bool) {
        let mut state = self.inner.lock().await;
        if enqueued {
            state.uploads_enqueued += 1;
        } else {
            state.uploads_dropped += 1;
        }
    }

    pub async fn snapshot(&self) -> IngestSnapshot {
        *self.inner.lock().await
    }

    pub async fn reset(&self) {
        *self.inner.lock().await = IngestSnapshot::default();
    }
}

impl Default for IngestStats {
    fn default() -> Self {
        Self::new()
    }
}

//! Detached history recording.
//!
//! A completed relay is written to the store on a spawned task. The caller
//! never waits on it and never sees its errors; failures are logged and
//! counted.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::config::LiveSettings;
use crate::history::sanitize::sanitize_for_storage;
use crate::observability::metrics;
use crate::relay::envelope::ResponseEnvelope;
use crate::storage::{NewHistoryEntry, Store};

#[derive(Clone)]
pub struct HistoryRecorder {
    store: Arc<dyn Store>,
    settings: Arc<ArcSwap<LiveSettings>>,
}

impl HistoryRecorder {
    pub fn new(store: Arc<dyn Store>, settings: Arc<ArcSwap<LiveSettings>>) -> Self {
        Self { store, settings }
    }

    /// Spawn a write for `envelope`, unless recording is disabled or there
    /// is no identity. The returned handle may be dropped.
    pub fn record(
        &self,
        identity: Option<&str>,
        method: Option<&str>,
        envelope: &ResponseEnvelope,
    ) -> Option<JoinHandle<()>> {
        let history = self.settings.load().history.clone();
        if !history.enabled {
            return None;
        }
        let entry = build_entry(identity?, method, envelope, history.max_value_bytes)?;
        let store = self.store.clone();

        Some(tokio::spawn(async move {
            let url = entry.url.clone();
            match store.insert_history(entry).await {
                Ok(saved) => {
                    metrics::record_history_write("ok");
                    tracing::debug!(id = %saved.id, url = %url, "History entry recorded");
                }
                Err(e) => {
                    metrics::record_history_write("error");
                    tracing::error!(url = %url, error = %e, "History insert failed");
                }
            }
        }))
    }
}

/// Build the row for a completed relay. `None` when `identity` is blank.
pub fn build_entry(
    identity: &str,
    method: Option<&str>,
    envelope: &ResponseEnvelope,
    max_value_bytes: usize,
) -> Option<NewHistoryEntry> {
    if identity.trim().is_empty() {
        return None;
    }

    let method = method
        .filter(|m| !m.is_empty())
        .map(str::to_ascii_uppercase)
        .unwrap_or_else(|| "UNKNOWN".to_string());

    let headers = Value::Object(
        envelope
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    );

    Some(NewHistoryEntry {
        user_uid: identity.to_string(),
        url: envelope.url.clone(),
        method,
        headers: sanitize_for_storage(Some(&headers), max_value_bytes),
        body: sanitize_for_storage(Some(&envelope.body), max_value_bytes),
        status: envelope.status,
        time_ms: envelope.time.round().max(0.0) as u64,
    })
}

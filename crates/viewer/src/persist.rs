//! Cross-session state kept in the key-value store. Read failures and
//! malformed values are absorbed here: the key is cleared and the caller
//! proceeds as if nothing had been stored.

use serde::{Deserialize, Serialize};
use sequence::ViewName;
use store::KeyValueStore;

pub const GUIDE_KEY: &str = "viewer-guide-shown";

pub fn frame_set_key(view: &ViewName) -> String { format!("viewer-cache-{}", view) }

/// Resource paths seen in an earlier session, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistedFrameSet(Vec<String>);

impl PersistedFrameSet {
    pub fn new(paths: Vec<String>) -> Self { Self(paths) }

    pub fn paths(&self) -> &[String] { &self.0 }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

pub fn load_frame_set(store: &dyn KeyValueStore, view: &ViewName) -> PersistedFrameSet {
    let key = frame_set_key(view);
    let raw = match store.get(&key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return PersistedFrameSet::default(),
        Err(err) => {
            tracing::warn!(%key, error = %err, "could not read persisted frames");
            return PersistedFrameSet::default();
        }
    };
    match serde_json::from_str::<PersistedFrameSet>(&raw) {
        Ok(set) => set,
        Err(err) => {
            tracing::warn!(%key, error = %err, "discarding malformed persisted frames");
            if let Err(err) = store.remove(&key) {
                tracing::warn!(%key, error = %err, "could not clear persisted frames");
            }
            PersistedFrameSet::default()
        }
    }
}

pub fn save_frame_set(store: &dyn KeyValueStore, view: &ViewName, set: &PersistedFrameSet) {
    let key = frame_set_key(view);
    let result = serde_json::to_string(set)
        .map_err(|err| err.to_string())
        .and_then(|json| store.set(&key, &json).map_err(|err| err.to_string()));
    match result {
        Ok(()) => tracing::debug!(%key, frames = set.len(), "persisted frames"),
        Err(err) => tracing::warn!(%key, error = %err, "could not persist frames"),
    }
}

pub fn guide_dismissed(store: &dyn KeyValueStore) -> bool {
    match store.get(GUIDE_KEY) {
        Ok(Some(value)) if value == "true" => true,
        Ok(Some(value)) => {
            tracing::warn!(%value, "discarding malformed guide flag");
            if let Err(err) = store.remove(GUIDE_KEY) {
                tracing::warn!(error = %err, "could not clear guide flag");
            }
            false
        }
        Ok(None) => false,
        Err(err) => {
            tracing::warn!(error = %err, "could not read guide flag");
            false
        }
    }
}

pub fn mark_guide_dismissed(store: &dyn KeyValueStore) {
    if let Err(err) = store.set(GUIDE_KEY, "true") {
        tracing::warn!(error = %err, "could not persist guide flag");
    }
}

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::Entry;

/// Message pushed to a connected listener
///
/// Serialized as `{"event": "initialData", "data": [...]}` or
/// `{"event": "newData", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum PushEvent {
    /// Full history snapshot, sent once on connect
    InitialData(Vec<Arc<Entry>>),
    /// A single newly ingested entry
    NewData(Arc<Entry>),
}

impl PushEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PushEvent::InitialData(_) => "initialData",
            PushEvent::NewData(_) => "newData",
        }
    }
}

//! Relay core
//!
//! Ties the bounded history to the broadcast hub: every ingested entry is
//! appended to the history first and then fanned out to connected listeners.

pub mod history;
pub mod hub;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::models::{Entry, IngestAck};

pub use history::{HistoryStore, DEFAULT_HISTORY_CAPACITY};
pub use hub::{BroadcastHub, ListenerId, Subscription, LISTENER_BUFFER_SIZE};

/// Shared relay state, created at startup and owned by the API server
pub struct Relay {
    history: Arc<HistoryStore>,
    hub: BroadcastHub,
    /// Held across stamp, append and publish; stores the last stamp issued
    ingest_lock: Mutex<DateTime<Utc>>,
}

impl Relay {
    pub fn new(capacity: usize) -> Self {
        let history = Arc::new(HistoryStore::new(capacity));
        let hub = BroadcastHub::new(history.clone());
        Self {
            history,
            hub,
            ingest_lock: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    /// Stamp, store and broadcast a submitted payload
    ///
    /// Ingests are serialized, so ids never decrease along the history and
    /// listeners see `newData` in history order. A wall clock stepping
    /// backwards reuses the previous stamp.
    pub fn ingest(&self, data: Value, source: impl Into<String>) -> IngestAck {
        let mut last_stamp = self.ingest_lock.lock();
        let now = Utc::now().max(*last_stamp);
        *last_stamp = now;

        let entry = Arc::new(Entry::at(data, source, now));

        info!(id = entry.id, source = %entry.source, "Received data");
        debug!(data = %entry.data, "Payload");

        self.history.append(entry.clone());
        let delivered = self.hub.publish(entry.clone());
        drop(last_stamp);
        debug!(id = entry.id, listeners = delivered, "Broadcasted entry");

        IngestAck::accepted(&entry)
    }

    /// Current history, newest first
    pub fn snapshot(&self) -> Vec<Arc<Entry>> {
        self.history.snapshot()
    }

    pub fn connect(&self) -> Subscription {
        self.hub.connect()
    }

    pub fn disconnect(&self, id: ListenerId) -> bool {
        self.hub.disconnect(id)
    }

    pub fn listener_count(&self) -> usize {
        self.hub.listener_count()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PushEvent;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_ingest_acknowledges_with_entry_id() {
        let relay = Relay::default();
        let ack = relay.ingest(json!({"x": 1}), "10.0.0.1");

        assert!(ack.success);
        let snapshot = relay.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, ack.data_id);
        assert_eq!(snapshot[0].data, json!({"x": 1}));
        assert_eq!(snapshot[0].source, "10.0.0.1");
    }

    #[test]
    fn test_ingest_accepts_empty_object_and_unknown_source() {
        let relay = Relay::default();
        let ack = relay.ingest(json!({}), "");

        assert!(ack.success);
        assert_eq!(relay.snapshot()[0].source, "");
    }

    #[test]
    fn test_ids_increase_across_distinct_times() {
        let relay = Relay::default();
        let first = relay.ingest(json!({"n": 1}), "");
        std::thread::sleep(Duration::from_millis(5));
        let second = relay.ingest(json!({"n": 2}), "");

        assert!(second.data_id > first.data_id);
    }

    #[tokio::test]
    async fn test_connected_listener_receives_ingested_entry() {
        let relay = Relay::default();
        let mut sub = relay.connect();
        assert_eq!(sub.recv().await, Some(PushEvent::InitialData(Vec::new())));

        let ack = relay.ingest(json!({"x": 1}), "127.0.0.1");

        match sub.recv().await {
            Some(PushEvent::NewData(entry)) => {
                assert_eq!(entry.id, ack.data_id);
                assert_eq!(entry, relay.snapshot()[0]);
            }
            other => panic!("expected newData, got {:?}", other),
        }
    }

    #[test]
    fn test_concurrent_ingest_keeps_history_and_push_order() {
        for _ in 0..20 {
            let relay = Arc::new(Relay::new(256));
            let mut sub = relay.connect();

            let handles: Vec<_> = (0..8)
                .map(|t| {
                    let relay = relay.clone();
                    std::thread::spawn(move || {
                        for i in 0..25 {
                            relay.ingest(json!({ "t": t, "i": i }), "");
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            let history = relay.snapshot();
            assert_eq!(history.len(), 200);
            assert!(
                history.windows(2).all(|w| w[0].id >= w[1].id),
                "history ids must not increase towards the tail"
            );

            assert!(matches!(
                sub.events.try_recv(),
                Ok(PushEvent::InitialData(_))
            ));
            let mut pushed = Vec::new();
            while let Ok(event) = sub.events.try_recv() {
                match event {
                    PushEvent::NewData(entry) => pushed.push(entry.data.clone()),
                    other => panic!("expected newData, got {:?}", other),
                }
            }
            let oldest_first: Vec<Value> = history.iter().rev().map(|e| e.data.clone()).collect();
            assert_eq!(pushed, oldest_first);
        }
    }

    #[tokio::test]
    async fn test_disconnected_listener_misses_entry() {
        let relay = Relay::default();
        let sub = relay.connect();
        assert!(relay.disconnect(sub.id));

        relay.ingest(json!({"x": 1}), "");
        assert_eq!(relay.listener_count(), 0);
        assert_eq!(relay.history().len(), 1);
    }
}

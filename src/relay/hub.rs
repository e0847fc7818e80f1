//! Broadcast hub
//!
//! Keeps the registry of connected listeners, onboards new listeners with a
//! history snapshot and fans new entries out to everyone registered.
//! Delivery goes through bounded per-listener channels with `try_send`, so
//! publishing never waits on a slow or dead listener.

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use super::HistoryStore;
use crate::models::{Entry, PushEvent};

/// Maximum number of events buffered per listener
pub const LISTENER_BUFFER_SIZE: usize = 256;

/// Identity of a connected listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receiving side handed to a newly connected listener
///
/// The first event is always the `initialData` snapshot.
pub struct Subscription {
    pub id: ListenerId,
    pub events: mpsc::Receiver<PushEvent>,
}

impl Subscription {
    /// Wait for the next pushed event, `None` once deregistered
    pub async fn recv(&mut self) -> Option<PushEvent> {
        self.events.recv().await
    }
}

pub struct BroadcastHub {
    history: Arc<HistoryStore>,
    listeners: DashMap<ListenerId, mpsc::Sender<PushEvent>>,
    next_id: AtomicU64,
    buffer_size: usize,
}

impl BroadcastHub {
    pub fn new(history: Arc<HistoryStore>) -> Self {
        Self::with_buffer_size(history, LISTENER_BUFFER_SIZE)
    }

    pub fn with_buffer_size(history: Arc<HistoryStore>, buffer_size: usize) -> Self {
        Self {
            history,
            listeners: DashMap::new(),
            next_id: AtomicU64::new(1),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Register a listener and queue the current history snapshot to it
    ///
    /// The snapshot is taken while the registry slot is held, so an entry
    /// appended after the snapshot is always delivered through `publish`.
    /// An entry appended just before may arrive twice: once in the snapshot
    /// and once as `newData`.
    pub fn connect(&self) -> Subscription {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.buffer_size);

        self.listeners.entry(id).or_insert_with(|| {
            let snapshot = self.history.snapshot();
            debug!(listener = %id, entries = snapshot.len(), "Sending initial snapshot");
            // Fresh channel with capacity >= 1, cannot be full or closed.
            let _ = tx.try_send(PushEvent::InitialData(snapshot));
            tx
        });

        Subscription { id, events: rx }
    }

    /// Deregister a listener. Returns false if it was already gone.
    pub fn disconnect(&self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    /// Queue `entry` to every registered listener
    ///
    /// Returns how many listeners the event was queued for. Listeners whose
    /// receiver is gone are skipped and pruned; full buffers drop the event.
    pub fn publish(&self, entry: Arc<Entry>) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for listener in self.listeners.iter() {
            match listener
                .value()
                .try_send(PushEvent::NewData(entry.clone()))
            {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(listener = %listener.key(), "Listener buffer full, dropping entry");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    closed.push(*listener.key());
                }
            }
        }

        for id in closed {
            debug!(listener = %id, "Pruning closed listener");
            self.listeners.remove(&id);
        }

        delivered
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn create_test_entry(id: i64) -> Arc<Entry> {
        let ts = Utc.timestamp_millis_opt(id).unwrap();
        Arc::new(Entry::at(json!({ "n": id }), "127.0.0.1", ts))
    }

    fn setup() -> (Arc<HistoryStore>, BroadcastHub) {
        let history = Arc::new(HistoryStore::default());
        let hub = BroadcastHub::new(history.clone());
        (history, hub)
    }

    fn expect_initial(sub: &mut Subscription) -> Vec<Arc<Entry>> {
        match sub.events.try_recv() {
            Ok(PushEvent::InitialData(entries)) => entries,
            other => panic!("expected initialData, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_sends_empty_snapshot() {
        let (_history, hub) = setup();
        let mut sub = hub.connect();

        assert!(expect_initial(&mut sub).is_empty());
        assert_eq!(hub.listener_count(), 1);
    }

    #[tokio::test]
    async fn test_late_joiner_receives_current_snapshot() {
        let (history, hub) = setup();
        for i in 1..=60 {
            history.append(create_test_entry(i));
        }

        let mut sub = hub.connect();
        let initial = expect_initial(&mut sub);

        assert_eq!(initial.len(), 50);
        assert_eq!(initial, history.snapshot());
        assert_eq!(initial[0].id, 60);
    }

    #[tokio::test]
    async fn test_publish_reaches_all_listeners() {
        let (_history, hub) = setup();
        let mut a = hub.connect();
        let mut b = hub.connect();
        expect_initial(&mut a);
        expect_initial(&mut b);

        let entry = create_test_entry(7);
        assert_eq!(hub.publish(entry.clone()), 2);

        assert_eq!(a.recv().await, Some(PushEvent::NewData(entry.clone())));
        assert_eq!(b.recv().await, Some(PushEvent::NewData(entry)));
    }

    #[tokio::test]
    async fn test_disconnected_listener_not_delivered() {
        let (_history, hub) = setup();
        let mut stays = hub.connect();
        let mut leaves = hub.connect();
        expect_initial(&mut stays);
        expect_initial(&mut leaves);

        assert!(hub.disconnect(leaves.id));
        assert!(!hub.disconnect(leaves.id));

        assert_eq!(hub.publish(create_test_entry(1)), 1);
        assert!(matches!(stays.recv().await, Some(PushEvent::NewData(_))));
        // Sender dropped on disconnect, channel drained and closed.
        assert_eq!(leaves.recv().await, None);
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_pruned() {
        let (_history, hub) = setup();
        let sub = hub.connect();
        drop(sub);

        assert_eq!(hub.publish(create_test_entry(1)), 0);
        assert_eq!(hub.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_full_buffer_drops_event() {
        let history = Arc::new(HistoryStore::default());
        let hub = BroadcastHub::with_buffer_size(history, 2);
        let mut slow = hub.connect();

        // initialData occupies one slot
        assert_eq!(hub.publish(create_test_entry(1)), 1);
        assert_eq!(hub.publish(create_test_entry(2)), 0);
        assert_eq!(hub.listener_count(), 1);

        expect_initial(&mut slow);
        match slow.recv().await {
            Some(PushEvent::NewData(entry)) => assert_eq!(entry.id, 1),
            other => panic!("expected newData, got {:?}", other),
        }
    }

    #[test]
    fn test_listener_ids_are_unique() {
        let (_history, hub) = setup();
        let a = hub.connect();
        let b = hub.connect();
        assert_ne!(a.id, b.id);
    }
}

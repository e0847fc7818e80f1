//! Bounded, newest-first history of relayed entries

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::models::Entry;

/// Default number of retained entries
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Holds the most recent entries, newest first
///
/// Appends and snapshots take the same lock, so a snapshot never observes a
/// half-applied append.
pub struct HistoryStore {
    entries: RwLock<VecDeque<Arc<Entry>>>,
    capacity: usize,
}

impl HistoryStore {
    /// Create a store bounded to `capacity` entries (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity + 1)),
            capacity,
        }
    }

    /// Insert at the front, evicting the oldest entry on overflow
    pub fn append(&self, entry: Arc<Entry>) {
        let mut entries = self.entries.write();
        entries.push_front(entry);
        entries.truncate(self.capacity);
    }

    /// Point-in-time copy of the history, newest first
    pub fn snapshot(&self) -> Vec<Arc<Entry>> {
        self.entries.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

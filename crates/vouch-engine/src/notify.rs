//! Notification aggregator: an unseen-count view derived from the
//! pending store.
//!
//! The aggregator stores no content of its own, only a seen set of ids.
//! Notifications are cleared in bulk; new arrivals after a clear are
//! unseen again.

use crate::pending::PendingStore;
use std::collections::HashSet;
use vouch_core::{MessageId, Notification};

/// Tracks which pending ids have been covered by a bulk clear.
#[derive(Debug, Default)]
pub struct NotificationAggregator {
    seen: HashSet<MessageId>,
}

impl NotificationAggregator {
    /// Create an aggregator with nothing marked seen.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending items not covered by the last clear.
    pub fn count_unseen(&self, store: &PendingStore) -> usize {
        store.ids().filter(|id| !self.seen.contains(*id)).count()
    }

    /// Notification views for all unseen pending items, arrival-ordered.
    pub fn unseen(&self, store: &PendingStore) -> Vec<Notification> {
        store
            .list()
            .iter()
            .filter(|item| !self.seen.contains(&item.id))
            .map(Notification::from)
            .collect()
    }

    /// Mark all currently pending ids as seen, atomically.
    pub fn clear(&mut self, store: &PendingStore) {
        self.seen = store.ids().cloned().collect();
    }

    /// Drop seen bookkeeping for an id that left the pending store.
    pub fn forget(&mut self, id: &MessageId) {
        self.seen.remove(id);
    }
}

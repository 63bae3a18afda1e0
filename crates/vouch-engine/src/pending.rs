//! Pending store: arrival-ordered map of validated testimonials awaiting
//! accept or reject.
//!
//! Mutation is exclusive-owner: only the ingestion path, the refresh
//! coordinator, and the reconciliation controller write; everything else
//! reads snapshots. The store itself is a plain synchronous structure;
//! the engine wraps it in a lock.

use indexmap::IndexMap;
use vouch_core::{MessageId, PendingAttestation};

/// Keyed, arrival-ordered collection of pending attestations.
///
/// Ordering is stable for display, not for correctness. Ids are unique at
/// all times: re-insertion of a present id is a no-op.
#[derive(Debug, Default)]
pub struct PendingStore {
    items: IndexMap<MessageId, PendingAttestation>,
}

impl PendingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item unless its id is already present.
    ///
    /// Returns `true` if the item was inserted, `false` if the id was
    /// already present (idempotent ingestion: re-delivery is a no-op).
    pub fn insert_if_absent(&mut self, item: PendingAttestation) -> bool {
        if self.items.contains_key(&item.id) {
            return false;
        }
        self.items.insert(item.id.clone(), item);
        true
    }

    /// Remove and return the item with the given id.
    pub fn remove(&mut self, id: &MessageId) -> Option<PendingAttestation> {
        // shift_remove keeps arrival order for the survivors
        self.items.shift_remove(id)
    }

    /// Look up an item by id.
    pub fn get(&self, id: &MessageId) -> Option<&PendingAttestation> {
        self.items.get(id)
    }

    /// Whether an id is present.
    pub fn contains(&self, id: &MessageId) -> bool {
        self.items.contains_key(id)
    }

    /// Snapshot of all items in arrival order.
    pub fn list(&self) -> Vec<PendingAttestation> {
        self.items.values().cloned().collect()
    }

    /// Iterator over ids in arrival order.
    pub fn ids(&self) -> impl Iterator<Item = &MessageId> {
        self.items.keys()
    }

    /// Number of pending items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vouch_core::Address;

    fn item(id: &str, sender: &str) -> PendingAttestation {
        PendingAttestation {
            id: MessageId::from(id),
            sender_address: Address::parse(sender).unwrap(),
            receiver_address: Address::parse("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb")
                .unwrap(),
            content: "content".into(),
            giver_name: "Alice".into(),
            profile_url: String::new(),
            signature: "sig".into(),
            received_at: Utc::now(),
        }
    }

    const A: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const C: &str = "0xcccccccccccccccccccccccccccccccccccccccc";

    #[test]
    fn insert_is_idempotent() {
        let mut store = PendingStore::new();
        assert!(store.insert_if_absent(item("m1", A)));
        assert!(!store.insert_if_absent(item("m1", A)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn duplicate_insert_keeps_original() {
        let mut store = PendingStore::new();
        store.insert_if_absent(item("m1", A));
        let mut changed = item("m1", A);
        changed.content = "different".into();
        store.insert_if_absent(changed);
        assert_eq!(store.get(&MessageId::from("m1")).unwrap().content, "content");
    }

    #[test]
    fn list_preserves_arrival_order_across_removal() {
        let mut store = PendingStore::new();
        store.insert_if_absent(item("m1", A));
        store.insert_if_absent(item("m2", C));
        store.insert_if_absent(item("m3", A));
        store.remove(&MessageId::from("m2"));

        let ids: Vec<_> = store.list().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![MessageId::from("m1"), MessageId::from("m3")]);
    }

    #[test]
    fn remove_returns_item() {
        let mut store = PendingStore::new();
        store.insert_if_absent(item("m1", A));
        let removed = store.remove(&MessageId::from("m1")).unwrap();
        assert_eq!(removed.id, MessageId::from("m1"));
        assert!(store.remove(&MessageId::from("m1")).is_none());
        assert!(store.is_empty());
    }

    proptest::proptest! {
        // Any delivery sequence drawn from a small id alphabet, with
        // arbitrary duplication, leaves each id present exactly once in
        // first-arrival order.
        #[test]
        fn replays_collapse_to_first_arrival(deliveries in proptest::collection::vec(0u8..6, 0..40)) {
            let mut store = PendingStore::new();
            let mut first_seen = Vec::new();
            for n in &deliveries {
                let id = format!("m{n}");
                let inserted = store.insert_if_absent(item(&id, A));
                proptest::prop_assert_eq!(inserted, !first_seen.contains(&id));
                if inserted {
                    first_seen.push(id);
                }
            }
            let ids: Vec<_> = store.list().into_iter().map(|i| i.id.as_str().to_owned()).collect();
            proptest::prop_assert_eq!(ids, first_seen);
        }
    }
}

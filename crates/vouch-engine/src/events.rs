//! Engine events for the presentation layer.
//!
//! The engine pushes state changes over a broadcast channel instead of
//! assuming any particular UI refresh mechanism. Slow consumers lag and
//! lose old events; the engine never blocks on or depends on a consumer.

use serde::{Deserialize, Serialize};
use vouch_core::{Address, ConnectionStatus, MessageId};

/// Why a pending item left the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalReason {
    /// Promoted to the ledger.
    Accepted,
    /// Discarded and tombstoned.
    Rejected,
}

/// A state change announced by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A new pending attestation was admitted.
    PendingArrived {
        /// Message id of the new item
        id: MessageId,
        /// Author's display name
        giver_name: String,
    },
    /// A pending attestation left the store.
    PendingRemoved {
        /// Message id of the removed item
        id: MessageId,
        /// Whether it was accepted or rejected
        reason: RemovalReason,
    },
    /// A testimonial was committed to the ledger.
    Committed {
        /// Ledger-assigned record id
        ledger_id: u64,
        /// Author of the committed testimonial
        sender: Address,
    },
    /// A confirmed testimonial was permanently deleted from the ledger.
    ConfirmedDeleted {
        /// Ledger-assigned record id
        ledger_id: u64,
    },
    /// Transport connectivity changed.
    Connection(ConnectionStatus),
    /// A refresh completed, merging this many items.
    Refreshed {
        /// Number of items newly inserted into the pending store
        merged: usize,
    },
}

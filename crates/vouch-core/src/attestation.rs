//! Attestation records: pending, confirmed, and the derived notification
//! view.

use crate::address::Address;
use crate::envelope::MessageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A validated testimonial awaiting accept or reject.
///
/// Created on first admission of a message id and immutable thereafter.
/// Destroyed by accept (promoted to the ledger), reject (discarded), or
/// engine shutdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAttestation {
    /// Transport message id, unique within the pending store.
    pub id: MessageId,
    /// Author's account address.
    pub sender_address: Address,
    /// Recipient's account address.
    pub receiver_address: Address,
    /// Testimonial body.
    pub content: String,
    /// Author's display name.
    pub giver_name: String,
    /// Author's profile link.
    pub profile_url: String,
    /// Author's signature over the testimonial fields.
    pub signature: String,
    /// When the engine admitted this envelope.
    pub received_at: DateTime<Utc>,
}

/// A testimonial committed to the ledger.
///
/// The ledger owns the set of confirmed attestations; the engine holds
/// these only as a read-through cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedAttestation {
    /// Ledger-assigned record id.
    pub ledger_id: u64,
    /// Testimonial body.
    pub content: String,
    /// Author's account address.
    pub sender_address: Address,
    /// Author's display name.
    pub giver_name: String,
    /// Author's profile link.
    pub profile_url: String,
    /// Ledger commit time.
    pub committed_at: DateTime<Utc>,
    /// Whether the ledger verified the author's signature on commit.
    pub verified: bool,
}

/// Derived view of one unseen pending attestation.
///
/// Notifications are cleared in bulk, never dismissed individually, and
/// carry no content of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// The pending attestation this notification points at.
    pub id: MessageId,
    /// Author's display name, for presentation.
    pub giver_name: String,
    /// When the underlying attestation was admitted.
    pub received_at: DateTime<Utc>,
}

impl From<&PendingAttestation> for Notification {
    fn from(item: &PendingAttestation) -> Self {
        Self {
            id: item.id.clone(),
            giver_name: item.giver_name.clone(),
            received_at: item.received_at,
        }
    }
}

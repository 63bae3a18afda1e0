//! Ledger collaborator interface.
//!
//! The ledger is the authoritative store of confirmed attestations and
//! enforces one active record per (sender, receiver) pair. The engine
//! never mutates ledger state directly; it invokes these operations and
//! applies the results to its own read-through cache.

use crate::address::Address;
use crate::attestation::ConfirmedAttestation;
use crate::error::VouchError;
use async_trait::async_trait;

/// Operations the engine requires from the ledger collaborator.
///
/// `commit` may be slow (network and consensus latency) and may fail.
/// The collaborator does NOT guarantee idempotence; the engine's
/// per-sender serialization is what prevents duplicate commits.
#[async_trait]
pub trait TestimonialLedger: Send + Sync {
    /// List all confirmed attestations addressed to `receiver`.
    async fn list_confirmed(
        &self,
        receiver: &Address,
    ) -> Result<Vec<ConfirmedAttestation>, VouchError>;

    /// Commit a testimonial. The ledger replaces any existing record from
    /// the same sender for this receiver.
    async fn commit(
        &self,
        receiver: &Address,
        sender: &Address,
        content: &str,
        giver_name: &str,
        profile_url: &str,
        signature: &str,
    ) -> Result<ConfirmedAttestation, VouchError>;

    /// Permanently remove a previously confirmed record.
    async fn discard(&self, receiver: &Address, ledger_id: u64) -> Result<(), VouchError>;

    /// Update the receiver's profile metadata (name, contact, bio).
    /// A side-channel external to reconciliation.
    async fn set_receiver_profile(
        &self,
        receiver: &Address,
        name: &str,
        contact: &str,
        bio: &str,
    ) -> Result<(), VouchError>;
}

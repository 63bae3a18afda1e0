//! Reconciliation controller: the accept/reject state machine and the
//! one-record-per-sender conflict protocol.
//!
//! Per-item phases: `Pending -> {Accepting, Rejecting, AwaitingReplacement}
//! -> {Confirmed, Discarded, Pending (on failure, unchanged)}`. A second
//! accept/reject on an item already in flight fails fast with
//! `OperationInProgress`; this prevents double-commit and double-removal.
//!
//! Accepts are additionally serialized per sender address, not only per
//! id: two pending items from the same sender must not race the ledger's
//! conflict check, because the check happens at commit time.

use crate::events::{EngineEvent, RemovalReason};
use crate::notify::NotificationAggregator;
use crate::pending::PendingStore;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard, RwLock};
use tracing::{info, warn};
use vouch_core::{
    Address, ConfirmedAttestation, MessageId, SignedTestimonial, TestimonialLedger,
    TestimonialTransport, VouchError,
};

/// Result of an accept call.
#[derive(Debug, Clone)]
pub enum AcceptOutcome {
    /// The testimonial was committed to the ledger.
    Committed(ConfirmedAttestation),
    /// The sender already has a confirmed testimonial for this receiver.
    /// No commit was attempted; the caller must confirm or cancel the
    /// replacement explicitly.
    RequiresConfirmation(ReplacementTicket),
}

/// A suspended accept awaiting explicit replacement confirmation.
///
/// Carries the originating pending id explicitly (when the accept came
/// from the pending store) so the resume path needs no ambient state.
/// An abandoned ticket leaves the item pending indefinitely; nothing is
/// committed until confirmation.
#[derive(Debug, Clone)]
pub struct ReplacementTicket {
    /// Opaque handle for confirm/cancel.
    pub ticket_id: u64,
    /// The pending-store item this accept originated from, if any.
    pub pending_id: Option<MessageId>,
    /// The confirmed testimonial that would be superseded.
    pub existing: ConfirmedAttestation,
    /// The testimonial that would replace it.
    pub incoming: SignedTestimonial,
}

/// In-flight operation marker for a pending item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemPhase {
    Accepting,
    Rejecting,
    AwaitingReplacement,
}

#[derive(Debug, Clone)]
struct TicketState {
    pending_id: Option<MessageId>,
    incoming: SignedTestimonial,
    /// Set while a resume holds this ticket; a second resume or a cancel
    /// fails fast instead of racing the commit.
    in_flight: bool,
}

fn ticket_label(ticket_id: u64, pending_id: Option<&MessageId>) -> String {
    match pending_id {
        Some(id) => id.as_str().to_owned(),
        None => format!("replacement ticket {ticket_id}"),
    }
}

/// Orchestrates accept/reject against the pending store and the ledger.
pub struct ReconciliationController {
    ledger: Arc<dyn TestimonialLedger>,
    transport: Arc<dyn TestimonialTransport>,
    receiver: Address,
    store: Arc<RwLock<PendingStore>>,
    notifier: Arc<Mutex<NotificationAggregator>>,
    tombstones: Arc<RwLock<HashSet<MessageId>>>,
    accepted: Arc<RwLock<HashSet<MessageId>>>,
    confirmed: Arc<RwLock<Vec<ConfirmedAttestation>>>,
    phases: Mutex<HashMap<MessageId, ItemPhase>>,
    sender_locks: Mutex<HashMap<Address, Arc<Mutex<()>>>>,
    tickets: Mutex<HashMap<u64, TicketState>>,
    next_ticket: AtomicU64,
    events: broadcast::Sender<EngineEvent>,
}

impl ReconciliationController {
    /// Create a controller over the engine's shared state.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        ledger: Arc<dyn TestimonialLedger>,
        transport: Arc<dyn TestimonialTransport>,
        receiver: Address,
        store: Arc<RwLock<PendingStore>>,
        notifier: Arc<Mutex<NotificationAggregator>>,
        tombstones: Arc<RwLock<HashSet<MessageId>>>,
        accepted: Arc<RwLock<HashSet<MessageId>>>,
        confirmed: Arc<RwLock<Vec<ConfirmedAttestation>>>,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            ledger,
            transport,
            receiver,
            store,
            notifier,
            tombstones,
            accepted,
            confirmed,
            phases: Mutex::new(HashMap::new()),
            sender_locks: Mutex::new(HashMap::new()),
            tickets: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(1),
            events,
        }
    }

    /// Accept a pending testimonial.
    ///
    /// Suspends at the ledger commit and, when the sender already has a
    /// confirmed entry, returns [`AcceptOutcome::RequiresConfirmation`]
    /// without committing. On commit failure the item stays pending,
    /// unchanged, and the same accept may be retried.
    pub async fn accept(&self, id: &MessageId) -> Result<AcceptOutcome, VouchError> {
        // Claim the item: phase marker blocks concurrent per-id operations.
        let item = {
            let store = self.store.read().await;
            let mut phases = self.phases.lock().await;
            if phases.contains_key(id) {
                return Err(VouchError::in_progress(id.as_str()));
            }
            let Some(item) = store.get(id).cloned() else {
                return Err(VouchError::not_found(id.as_str()));
            };
            phases.insert(id.clone(), ItemPhase::Accepting);
            item
        };

        let signed = SignedTestimonial {
            sender_address: item.sender_address,
            receiver_address: item.receiver_address,
            content: item.content,
            giver_name: item.giver_name,
            profile_url: item.profile_url,
            signature: item.signature,
        };

        match self.accept_inner(Some(id.clone()), signed).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                // Failure leaves the item pending and retryable.
                self.phases.lock().await.remove(id);
                Err(e)
            }
        }
    }

    /// Accept a pasted signed testimonial, bypassing the pending store.
    ///
    /// Runs the same conflict protocol and per-sender serialization as
    /// stream accepts, so a pasted payload cannot race a pending-item
    /// accept from the same sender.
    pub async fn accept_direct(
        &self,
        signed: SignedTestimonial,
    ) -> Result<AcceptOutcome, VouchError> {
        if signed.receiver_address != self.receiver {
            return Err(VouchError::validation(format!(
                "testimonial is addressed to {}, not this receiver",
                signed.receiver_address.short()
            )));
        }
        self.accept_inner(None, signed).await
    }

    /// Resume a suspended accept, replacing the existing confirmed entry.
    ///
    /// On commit failure the ticket stays valid and the call may be
    /// retried; nothing is removed from the pending store.
    pub async fn confirm_replace(
        &self,
        ticket_id: u64,
    ) -> Result<ConfirmedAttestation, VouchError> {
        // Claim the ticket before any suspension point: a concurrent
        // resume of the same ticket must fail fast, not double-commit.
        let state = {
            let mut tickets = self.tickets.lock().await;
            let Some(entry) = tickets.get_mut(&ticket_id) else {
                return Err(VouchError::InvalidTicket);
            };
            if entry.in_flight {
                return Err(VouchError::in_progress(ticket_label(
                    ticket_id,
                    entry.pending_id.as_ref(),
                )));
            }
            entry.in_flight = true;
            entry.clone()
        };

        let _sender = self.lock_sender(&state.incoming.sender_address).await;
        match self
            .commit_and_finalize(state.pending_id.as_ref(), &state.incoming)
            .await
        {
            Ok(committed) => {
                self.tickets.lock().await.remove(&ticket_id);
                if let Some(id) = &state.pending_id {
                    self.phases.lock().await.remove(id);
                }
                Ok(committed)
            }
            Err(e) => {
                // Release the claim; the same ticket may be retried.
                if let Some(entry) = self.tickets.lock().await.get_mut(&ticket_id) {
                    entry.in_flight = false;
                }
                Err(e)
            }
        }
    }

    /// Abort a suspended accept. The item (if any) returns to plain
    /// pending; no state changed.
    pub async fn cancel_replace(&self, ticket_id: u64) -> Result<(), VouchError> {
        let state = {
            let mut tickets = self.tickets.lock().await;
            let Some(entry) = tickets.remove(&ticket_id) else {
                return Err(VouchError::InvalidTicket);
            };
            if entry.in_flight {
                let label = ticket_label(ticket_id, entry.pending_id.as_ref());
                tickets.insert(ticket_id, entry);
                return Err(VouchError::in_progress(label));
            }
            entry
        };

        if let Some(id) = &state.pending_id {
            self.phases.lock().await.remove(id);
        }
        info!(
            sender = %state.incoming.sender_address.short(),
            "replacement cancelled, no state changed"
        );
        Ok(())
    }

    /// Reject a pending testimonial: tombstone it, signal transport
    /// removal (best-effort), and drop it from the store. Terminal and
    /// irreversible.
    pub async fn reject(&self, id: &MessageId) -> Result<(), VouchError> {
        {
            let store = self.store.read().await;
            let mut phases = self.phases.lock().await;
            if phases.contains_key(id) {
                return Err(VouchError::in_progress(id.as_str()));
            }
            if !store.contains(id) {
                return Err(VouchError::not_found(id.as_str()));
            }
            phases.insert(id.clone(), ItemPhase::Rejecting);
        }

        // The engine-side tombstone is authoritative; it is recorded
        // before the transport signal so a concurrent refresh cannot
        // resurrect the id regardless of transport acknowledgment.
        self.tombstones.write().await.insert(id.clone());

        if let Err(e) = self.transport.request_removal(id).await {
            warn!(id = %id, error = %e, "transport removal signal failed, tombstone stands");
        }

        self.store.write().await.remove(id);
        self.notifier.lock().await.forget(id);
        self.phases.lock().await.remove(id);

        let _ = self.events.send(EngineEvent::PendingRemoved {
            id: id.clone(),
            reason: RemovalReason::Rejected,
        });
        info!(id = %id, "testimonial rejected");
        Ok(())
    }

    /// Shared accept path for stream and pasted testimonials.
    async fn accept_inner(
        &self,
        origin: Option<MessageId>,
        signed: SignedTestimonial,
    ) -> Result<AcceptOutcome, VouchError> {
        let _sender = self.lock_sender(&signed.sender_address).await;

        // Conflict check happens at commit time, read-through to the
        // ledger, under the sender lock so concurrent accepts for the
        // same sender cannot observe a stale pre-commit state.
        let confirmed = self.ledger.list_confirmed(&self.receiver).await?;
        *self.confirmed.write().await = confirmed.clone();

        if let Some(existing) = confirmed
            .iter()
            .find(|c| c.sender_address == signed.sender_address)
        {
            let ticket_id = self.next_ticket.fetch_add(1, Ordering::Relaxed);
            self.tickets.lock().await.insert(
                ticket_id,
                TicketState {
                    pending_id: origin.clone(),
                    incoming: signed.clone(),
                    in_flight: false,
                },
            );
            if let Some(id) = &origin {
                self.phases
                    .lock()
                    .await
                    .insert(id.clone(), ItemPhase::AwaitingReplacement);
            }
            info!(
                sender = %signed.sender_address.short(),
                ledger_id = existing.ledger_id,
                "sender already has a confirmed testimonial, awaiting replacement confirmation"
            );
            return Ok(AcceptOutcome::RequiresConfirmation(ReplacementTicket {
                ticket_id,
                pending_id: origin,
                existing: existing.clone(),
                incoming: signed,
            }));
        }

        let committed = self.commit_and_finalize(origin.as_ref(), &signed).await?;
        if let Some(id) = &origin {
            self.phases.lock().await.remove(id);
        }
        Ok(AcceptOutcome::Committed(committed))
    }

    /// Commit to the ledger, then apply the success to engine state.
    ///
    /// Either the commit succeeds and the pending item is removed with
    /// the cache updated, or it fails and nothing changes: no partial
    /// state on any path.
    async fn commit_and_finalize(
        &self,
        origin: Option<&MessageId>,
        signed: &SignedTestimonial,
    ) -> Result<ConfirmedAttestation, VouchError> {
        let committed = self
            .ledger
            .commit(
                &self.receiver,
                &signed.sender_address,
                &signed.content,
                &signed.giver_name,
                &signed.profile_url,
                &signed.signature,
            )
            .await
            .map_err(|e| VouchError::commit(e.to_string()))?;

        if let Some(id) = origin {
            // Lock order is store before notifier, everywhere.
            let removed = {
                let mut store = self.store.write().await;
                store.remove(id)
            };
            if removed.is_some() {
                self.notifier.lock().await.forget(id);
                // Accepted ids are filtered on refresh: the historical
                // store may still list them.
                self.accepted.write().await.insert(id.clone());
                let _ = self.events.send(EngineEvent::PendingRemoved {
                    id: id.clone(),
                    reason: RemovalReason::Accepted,
                });
            }
        }

        {
            let mut cache = self.confirmed.write().await;
            cache.retain(|c| c.sender_address != committed.sender_address);
            cache.push(committed.clone());
        }

        let _ = self.events.send(EngineEvent::Committed {
            ledger_id: committed.ledger_id,
            sender: committed.sender_address.clone(),
        });
        info!(
            ledger_id = committed.ledger_id,
            sender = %committed.sender_address.short(),
            "testimonial committed"
        );
        Ok(committed)
    }

    /// Serialize accepts per sender address.
    async fn lock_sender(&self, sender: &Address) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.sender_locks.lock().await;
            // An entry whose only owner is the map itself has no holder
            // and no waiter; sweep those before adding to the map.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(sender.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

impl std::fmt::Debug for ReconciliationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationController")
            .field("receiver", &self.receiver)
            .finish()
    }
}

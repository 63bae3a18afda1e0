//! Engine facade: owns the shared state and the single ordered ingestion
//! channel, and exposes the operations the presentation layer calls.

use crate::config::EngineConfig;
use crate::connection::ConnectionMonitor;
use crate::events::EngineEvent;
use crate::notify::NotificationAggregator;
use crate::pending::PendingStore;
use crate::reconcile::{AcceptOutcome, ReconciliationController};
use crate::refresh::RefreshCoordinator;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::debug;
use vouch_core::{
    validate, Address, ConfirmedAttestation, ConnectionStatus, MessageId, Notification,
    PendingAttestation, SignedTestimonial, TestimonialEnvelope, TestimonialLedger,
    TestimonialTransport, TransportEvent, ValidationLimits, VouchError,
};

/// The testimonial reconciliation engine for one receiver session.
///
/// All mutation of the pending store and the notification aggregator
/// flows through the reconciliation controller, the refresh coordinator,
/// or the single ingestion task, so `insert_if_absent` calls never race.
pub struct TestimonialEngine {
    receiver: Address,
    store: Arc<RwLock<PendingStore>>,
    notifier: Arc<Mutex<NotificationAggregator>>,
    monitor: Arc<ConnectionMonitor>,
    confirmed: Arc<RwLock<Vec<ConfirmedAttestation>>>,
    controller: ReconciliationController,
    coordinator: RefreshCoordinator,
    ledger: Arc<dyn TestimonialLedger>,
    limits: ValidationLimits,
    events: broadcast::Sender<EngineEvent>,
    ingest_tx: mpsc::Sender<TransportEvent>,
    ingest_task: JoinHandle<()>,
    auto_refreshed: AtomicBool,
}

impl TestimonialEngine {
    /// Create an engine for `receiver` and spawn its ingestion task.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(
        config: EngineConfig,
        receiver: Address,
        ledger: Arc<dyn TestimonialLedger>,
        transport: Arc<dyn TestimonialTransport>,
    ) -> Self {
        let store = Arc::new(RwLock::new(PendingStore::new()));
        let notifier = Arc::new(Mutex::new(NotificationAggregator::new()));
        let monitor = Arc::new(ConnectionMonitor::new());
        let confirmed = Arc::new(RwLock::new(Vec::new()));
        let tombstones = Arc::new(RwLock::new(HashSet::new()));
        let accepted = Arc::new(RwLock::new(HashSet::new()));
        let (events, _) = broadcast::channel(config.event_capacity);
        let (ingest_tx, ingest_rx) = mpsc::channel(config.ingest_capacity);

        let controller = ReconciliationController::new(
            Arc::clone(&ledger),
            Arc::clone(&transport),
            receiver.clone(),
            Arc::clone(&store),
            Arc::clone(&notifier),
            Arc::clone(&tombstones),
            Arc::clone(&accepted),
            Arc::clone(&confirmed),
            events.clone(),
        );

        let coordinator = RefreshCoordinator::new(
            Arc::clone(&transport),
            Arc::clone(&monitor),
            receiver.clone(),
            Arc::clone(&store),
            Arc::clone(&tombstones),
            Arc::clone(&accepted),
            config.limits.clone(),
            events.clone(),
        );

        let ingest_task = tokio::spawn(run_ingestion(
            ingest_rx,
            receiver.clone(),
            config.limits.clone(),
            Arc::clone(&store),
            Arc::clone(&monitor),
            tombstones,
            accepted,
            events.clone(),
        ));

        Self {
            receiver,
            store,
            notifier,
            monitor,
            confirmed,
            controller,
            coordinator,
            ledger,
            limits: config.limits,
            events,
            ingest_tx,
            ingest_task,
            auto_refreshed: AtomicBool::new(false),
        }
    }

    /// The receiver this engine reconciles for.
    pub fn receiver(&self) -> &Address {
        &self.receiver
    }

    /// Handle for the transport adapter to push events through.
    pub fn ingest_handle(&self) -> mpsc::Sender<TransportEvent> {
        self.ingest_tx.clone()
    }

    /// Subscribe to engine events (presentation layer).
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Current transport connectivity, sampled synchronously.
    pub fn connection(&self) -> ConnectionStatus {
        self.monitor.current()
    }

    /// Watch receiver for connectivity transitions.
    pub fn connection_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.monitor.subscribe()
    }

    /// Arrival-ordered snapshot of the pending store.
    pub async fn pending(&self) -> Vec<PendingAttestation> {
        self.store.read().await.list()
    }

    /// Snapshot of the confirmed-attestation cache.
    pub async fn confirmed(&self) -> Vec<ConfirmedAttestation> {
        self.confirmed.read().await.clone()
    }

    /// Unseen notifications, arrival-ordered.
    pub async fn notifications(&self) -> Vec<Notification> {
        let store = self.store.read().await;
        self.notifier.lock().await.unseen(&store)
    }

    /// Number of pending items not covered by the last clear.
    pub async fn unseen_count(&self) -> usize {
        let store = self.store.read().await;
        self.notifier.lock().await.count_unseen(&store)
    }

    /// Mark all currently pending items as seen, atomically.
    pub async fn clear_notifications(&self) {
        let store = self.store.read().await;
        self.notifier.lock().await.clear(&store);
    }

    /// Accept a pending testimonial. See
    /// [`ReconciliationController::accept`].
    pub async fn accept(&self, id: &MessageId) -> Result<AcceptOutcome, VouchError> {
        self.controller.accept(id).await
    }

    /// Resume a suspended accept, replacing the existing confirmed entry.
    pub async fn confirm_replace(
        &self,
        ticket_id: u64,
    ) -> Result<ConfirmedAttestation, VouchError> {
        self.controller.confirm_replace(ticket_id).await
    }

    /// Abort a suspended accept; no state changes.
    pub async fn cancel_replace(&self, ticket_id: u64) -> Result<(), VouchError> {
        self.controller.cancel_replace(ticket_id).await
    }

    /// Reject a pending testimonial. Terminal and irreversible.
    pub async fn reject(&self, id: &MessageId) -> Result<(), VouchError> {
        self.controller.reject(id).await
    }

    /// Accept an already-validated signed testimonial directly.
    pub async fn accept_direct(
        &self,
        signed: SignedTestimonial,
    ) -> Result<AcceptOutcome, VouchError> {
        self.controller.accept_direct(signed).await
    }

    /// Decode and accept a pasted JSON testimonial payload.
    pub async fn accept_pasted(&self, raw: &str) -> Result<AcceptOutcome, VouchError> {
        let envelope = TestimonialEnvelope::from_json(raw)?;
        let signed = validate::admit_direct(envelope, &self.limits)?;
        self.controller.accept_direct(signed).await
    }

    /// Re-fetch the transport's historical store. See
    /// [`RefreshCoordinator::refresh`].
    pub async fn refresh(&self) -> Result<usize, VouchError> {
        self.coordinator.refresh().await
    }

    /// Whether a refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.coordinator.is_refreshing()
    }

    /// Signal that the caller entered review mode.
    ///
    /// Triggers the one implicit refresh for the session on the first
    /// connected entry; returns `Ok(Some(merged))` when it ran,
    /// `Ok(None)` when it was skipped (already done, or not connected —
    /// a later connected entry still gets the one shot).
    pub async fn enter_review(&self) -> Result<Option<usize>, VouchError> {
        if self.monitor.current() != ConnectionStatus::Connected {
            return Ok(None);
        }
        // Claim the one shot; the loser of a concurrent first entry is a
        // no-op, not an error.
        if self
            .auto_refreshed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(None);
        }
        match self.coordinator.refresh().await {
            Ok(merged) => Ok(Some(merged)),
            // An explicit refresh already in flight covers this entry;
            // the one shot stays available for a later visit.
            Err(VouchError::RefreshBusy) => {
                self.auto_refreshed.store(false, Ordering::Release);
                Ok(None)
            }
            Err(e) => {
                self.auto_refreshed.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Populate the confirmed cache from the ledger.
    pub async fn load_confirmed(&self) -> Result<Vec<ConfirmedAttestation>, VouchError> {
        let listed = self.ledger.list_confirmed(&self.receiver).await?;
        *self.confirmed.write().await = listed.clone();
        Ok(listed)
    }

    /// Permanently delete a confirmed testimonial from the ledger and
    /// the cache. Part of the separate delete flow; shares the
    /// confirmed-attestation entity with accept.
    pub async fn delete_confirmed(&self, ledger_id: u64) -> Result<(), VouchError> {
        self.ledger.discard(&self.receiver, ledger_id).await?;
        self.confirmed
            .write()
            .await
            .retain(|c| c.ledger_id != ledger_id);
        let _ = self.events.send(EngineEvent::ConfirmedDeleted { ledger_id });
        Ok(())
    }

    /// Update the receiver's profile metadata on the ledger. All three
    /// fields are required.
    pub async fn update_profile(
        &self,
        name: &str,
        contact: &str,
        bio: &str,
    ) -> Result<(), VouchError> {
        let (name, contact, bio) = (name.trim(), contact.trim(), bio.trim());
        if name.is_empty() || contact.is_empty() || bio.is_empty() {
            return Err(VouchError::validation(
                "profile name, contact, and bio are all required",
            ));
        }
        self.ledger
            .set_receiver_profile(&self.receiver, name, contact, bio)
            .await
    }
}

impl Drop for TestimonialEngine {
    fn drop(&mut self) {
        self.ingest_task.abort();
    }
}

impl std::fmt::Debug for TestimonialEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestimonialEngine")
            .field("receiver", &self.receiver)
            .field("connection", &self.monitor.current())
            .finish()
    }
}

/// The single ordered path from transport events into the pending store.
#[allow(clippy::too_many_arguments)]
async fn run_ingestion(
    mut rx: mpsc::Receiver<TransportEvent>,
    receiver: Address,
    limits: ValidationLimits,
    store: Arc<RwLock<PendingStore>>,
    monitor: Arc<ConnectionMonitor>,
    tombstones: Arc<RwLock<HashSet<MessageId>>>,
    accepted: Arc<RwLock<HashSet<MessageId>>>,
    events: broadcast::Sender<EngineEvent>,
) {
    while let Some(event) = rx.recv().await {
        match event {
            TransportEvent::Connectivity(status) => {
                monitor.set(status);
                let _ = events.send(EngineEvent::Connection(status));
            }
            TransportEvent::Envelope(envelope) => {
                let item = match validate::admit(envelope, &limits, Utc::now()) {
                    Ok(item) => item,
                    Err(e) => {
                        // Admission errors are local and silently
                        // protective: no partial state change.
                        debug!(error = %e, "dropped envelope at admission");
                        continue;
                    }
                };
                if item.receiver_address != receiver {
                    debug!(id = %item.id, "dropped envelope for another receiver");
                    continue;
                }
                if tombstones.read().await.contains(&item.id)
                    || accepted.read().await.contains(&item.id)
                {
                    continue;
                }

                let id = item.id.clone();
                let giver_name = item.giver_name.clone();
                let inserted = store.write().await.insert_if_absent(item);
                if inserted {
                    debug!(id = %id, "admitted pending testimonial");
                    let _ = events.send(EngineEvent::PendingArrived { id, giver_name });
                }
            }
        }
    }
    debug!("ingestion channel closed");
}

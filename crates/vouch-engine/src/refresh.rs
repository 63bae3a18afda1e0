//! Refresh coordinator: bounded, non-overlapping re-fetch of the
//! transport's historical store.
//!
//! A refresh re-queries history for the current receiver and merges the
//! results into the pending store. Ids that were rejected (tombstoned) or
//! already accepted are filtered out before insertion, so a refresh can
//! never resurrect them. Overlapping refreshes fail fast with
//! `RefreshBusy` rather than queuing.

use crate::connection::ConnectionMonitor;
use crate::events::EngineEvent;
use crate::pending::PendingStore;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};
use vouch_core::{
    validate, Address, ConnectionStatus, MessageId, TestimonialTransport, ValidationLimits,
    VouchError,
};

/// Clears the busy flag on every exit path, including panics and early
/// returns.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives non-overlapping history re-fetches into the pending store.
pub struct RefreshCoordinator {
    transport: Arc<dyn TestimonialTransport>,
    monitor: Arc<ConnectionMonitor>,
    receiver: Address,
    store: Arc<RwLock<PendingStore>>,
    tombstones: Arc<RwLock<HashSet<MessageId>>>,
    accepted: Arc<RwLock<HashSet<MessageId>>>,
    limits: ValidationLimits,
    busy: AtomicBool,
    events: broadcast::Sender<EngineEvent>,
}

impl RefreshCoordinator {
    /// Create a coordinator over the engine's shared state.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        transport: Arc<dyn TestimonialTransport>,
        monitor: Arc<ConnectionMonitor>,
        receiver: Address,
        store: Arc<RwLock<PendingStore>>,
        tombstones: Arc<RwLock<HashSet<MessageId>>>,
        accepted: Arc<RwLock<HashSet<MessageId>>>,
        limits: ValidationLimits,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            transport,
            monitor,
            receiver,
            store,
            tombstones,
            accepted,
            limits,
            busy: AtomicBool::new(false),
            events,
        }
    }

    /// Whether a refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Re-query the transport's historical store and merge the results.
    ///
    /// Returns the number of newly inserted items. Fails fast with
    /// `TransportUnavailable` when not connected and `RefreshBusy` when a
    /// refresh is already in flight. On failure the pending store is left
    /// unchanged.
    pub async fn refresh(&self) -> Result<usize, VouchError> {
        let status = self.monitor.current();
        if status != ConnectionStatus::Connected {
            return Err(VouchError::TransportUnavailable {
                status: status.to_string(),
            });
        }

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(VouchError::RefreshBusy);
        }
        let _guard = BusyGuard(&self.busy);

        let history = self
            .transport
            .query_history(self.receiver.as_str())
            .await
            .map_err(|e| VouchError::refresh(e.to_string()))?;

        debug!(
            receiver = %self.receiver.short(),
            fetched = history.len(),
            "merging transport history"
        );

        let mut merged = 0usize;
        {
            let tombstones = self.tombstones.read().await;
            let accepted = self.accepted.read().await;
            let mut store = self.store.write().await;

            for envelope in history {
                let item = match validate::admit(envelope, &self.limits, Utc::now()) {
                    Ok(item) => item,
                    Err(e) => {
                        debug!(error = %e, "discarding invalid historical envelope");
                        continue;
                    }
                };

                if item.receiver_address != self.receiver {
                    debug!(id = %item.id, "discarding envelope for another receiver");
                    continue;
                }
                // Rejected and accepted ids never re-enter the store,
                // even though the historical store still lists them.
                if tombstones.contains(&item.id) || accepted.contains(&item.id) {
                    continue;
                }

                let id = item.id.clone();
                let giver_name = item.giver_name.clone();
                if store.insert_if_absent(item) {
                    merged += 1;
                    let _ = self.events.send(EngineEvent::PendingArrived { id, giver_name });
                }
            }
        }

        if merged > 0 {
            info!(merged, "refresh merged new pending testimonials");
        }
        let _ = self.events.send(EngineEvent::Refreshed { merged });
        Ok(merged)
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("receiver", &self.receiver)
            .field("busy", &self.is_refreshing())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_guard_releases_on_drop() {
        let flag = AtomicBool::new(true);
        {
            let _guard = BusyGuard(&flag);
        }
        assert!(!flag.load(Ordering::Acquire));
    }
}

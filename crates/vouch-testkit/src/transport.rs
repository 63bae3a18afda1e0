//! In-memory transport collaborator.
//!
//! Serves a scripted historical store, records removal requests, and can
//! be made slow or failing to exercise the refresh coordinator's busy
//! and error paths.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use vouch_core::{MessageId, TestimonialEnvelope, TestimonialTransport, VouchError};

/// In-memory [`TestimonialTransport`] with failure and latency injection.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    history: Mutex<Vec<TestimonialEnvelope>>,
    removals: Mutex<Vec<MessageId>>,
    fail_history: AtomicBool,
    fail_removal: AtomicBool,
    history_delay: Mutex<Option<Duration>>,
}

impl MemoryTransport {
    /// Create a transport with an empty historical store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an envelope to the historical store.
    pub async fn push_history(&self, envelope: TestimonialEnvelope) {
        self.history.lock().await.push(envelope);
    }

    /// Removal requests received so far, in order.
    pub async fn removal_requests(&self) -> Vec<MessageId> {
        self.removals.lock().await.clone()
    }

    /// Make every subsequent history query fail (or succeed again).
    pub fn set_fail_history(&self, fail: bool) {
        self.fail_history.store(fail, Ordering::Release);
    }

    /// Make every subsequent removal request fail (or succeed again).
    pub fn set_fail_removal(&self, fail: bool) {
        self.fail_removal.store(fail, Ordering::Release);
    }

    /// Delay history queries, to hold a refresh in flight.
    pub async fn set_history_delay(&self, delay: Option<Duration>) {
        *self.history_delay.lock().await = delay;
    }
}

#[async_trait]
impl TestimonialTransport for MemoryTransport {
    async fn query_history(&self, _receiver: &str) -> Result<Vec<TestimonialEnvelope>, VouchError> {
        let delay = *self.history_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_history.load(Ordering::Acquire) {
            return Err(VouchError::transport("injected history failure"));
        }
        Ok(self.history.lock().await.clone())
    }

    async fn request_removal(&self, id: &MessageId) -> Result<(), VouchError> {
        if self.fail_removal.load(Ordering::Acquire) {
            return Err(VouchError::transport("injected removal failure"));
        }
        self.removals.lock().await.push(id.clone());
        Ok(())
    }
}

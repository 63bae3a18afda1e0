//! Transport collaborator interface.
//!
//! The transport pushes inbound envelopes and connectivity changes to the
//! engine as [`TransportEvent`]s over a single ordered channel, and
//! answers pull queries against its historical store. Peer discovery and
//! delivery mechanics are entirely its own concern.

use crate::envelope::{MessageId, TestimonialEnvelope};
use crate::error::VouchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport connectivity, process-wide.
///
/// Single writer (the transport adapter), many readers. Operations gated
/// on connectivity consult this synchronously; nothing blocks waiting for
/// a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// Not connected and not trying. Initial and fatal-failure state.
    Disconnected,
    /// Connection attempt (or auto-retry after a failure) in progress.
    Connecting,
    /// Connected and listening.
    Connected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// An event pushed by the transport adapter into the engine's ingestion
/// channel.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// An inbound envelope was delivered (at-least-once, possibly
    /// duplicated, possibly out of order across senders).
    Envelope(TestimonialEnvelope),
    /// Connectivity changed.
    Connectivity(ConnectionStatus),
}

/// Pull-side operations the engine requires from the transport.
#[async_trait]
pub trait TestimonialTransport: Send + Sync {
    /// Query the transport's historical store for all envelopes addressed
    /// to `receiver`. Used by refresh; may return duplicates of already
    /// delivered or already rejected messages.
    async fn query_history(&self, receiver: &str) -> Result<Vec<TestimonialEnvelope>, VouchError>;

    /// Ask the transport to permanently remove a message. Best-effort:
    /// other replicas may retain it, so the engine's tombstone is
    /// authoritative regardless of the outcome.
    async fn request_removal(&self, id: &MessageId) -> Result<(), VouchError>;
}

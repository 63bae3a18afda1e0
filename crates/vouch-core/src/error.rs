//! Unified error type for the Vouch engine.
//!
//! One enum covers the whole taxonomy so callers match on variants rather
//! than on nested error chains. Conflict-requires-confirmation is not an
//! error and does not appear here; it is a normal accept outcome.

use serde::{Deserialize, Serialize};

/// Errors surfaced by engine operations.
///
/// None of these are fatal to the process: every operation leaves the
/// pending store in a consistent state whether it succeeds or fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum VouchError {
    /// Malformed envelope, rejected at admission.
    #[error("validation failed: {message}")]
    Validation {
        /// What was wrong with the envelope
        message: String,
    },

    /// Operation referenced a message id that is not in the pending store.
    #[error("no pending testimonial with id {id}")]
    NotFound {
        /// The unknown message id
        id: String,
    },

    /// A second accept/reject was attempted while one is already in
    /// flight for the same item.
    #[error("operation already in progress for {id}")]
    OperationInProgress {
        /// The contended message id
        id: String,
    },

    /// The ledger collaborator rejected or timed out on a commit.
    /// Recoverable: the item stays pending and the same accept may be
    /// retried.
    #[error("ledger commit failed: {message}")]
    CommitFailure {
        /// Collaborator-reported reason
        message: String,
    },

    /// A refresh is already in flight; the call was refused rather than
    /// queued.
    #[error("refresh already in progress")]
    RefreshBusy,

    /// The transport history query failed. The pending store is unchanged.
    #[error("refresh failed: {message}")]
    RefreshFailure {
        /// Collaborator-reported reason
        message: String,
    },

    /// The transport is not connected, so the operation refused to start.
    #[error("transport unavailable (status: {status})")]
    TransportUnavailable {
        /// Connection status observed at the time
        status: String,
    },

    /// A non-commit ledger operation failed (list, discard, profile).
    #[error("ledger error: {message}")]
    Ledger {
        /// Collaborator-reported reason
        message: String,
    },

    /// A transport signal failed for a reason other than connectivity.
    #[error("transport error: {message}")]
    Transport {
        /// Collaborator-reported reason
        message: String,
    },

    /// A replacement ticket was presented that the engine did not issue
    /// or has already resolved.
    #[error("unknown or stale replacement ticket")]
    InvalidTicket,
}

impl VouchError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not-found error for a message id.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create an operation-in-progress error for a message id.
    pub fn in_progress(id: impl Into<String>) -> Self {
        Self::OperationInProgress { id: id.into() }
    }

    /// Create a commit failure error.
    pub fn commit(message: impl Into<String>) -> Self {
        Self::CommitFailure {
            message: message.into(),
        }
    }

    /// Create a refresh failure error.
    pub fn refresh(message: impl Into<String>) -> Self {
        Self::RefreshFailure {
            message: message.into(),
        }
    }

    /// Create a ledger error.
    pub fn ledger(message: impl Into<String>) -> Self {
        Self::Ledger {
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Whether the caller may retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CommitFailure { .. }
                | Self::RefreshBusy
                | Self::RefreshFailure { .. }
                | Self::TransportUnavailable { .. }
        )
    }
}

//! Core data model for the Vouch testimonial reconciliation engine.
//!
//! This crate is the interface layer shared by the engine and its
//! collaborators: the identifier newtypes, the envelope and attestation
//! records, the pure admission gate, the unified error type, and the
//! async traits the engine depends on (ledger and transport). It contains
//! no engine state and no I/O.

pub mod address;
pub mod attestation;
pub mod envelope;
pub mod error;
pub mod ledger;
pub mod transport;
pub mod validate;

pub use address::Address;
pub use attestation::{ConfirmedAttestation, Notification, PendingAttestation};
pub use envelope::{MessageId, SignedTestimonial, TestimonialEnvelope};
pub use error::VouchError;
pub use ledger::TestimonialLedger;
pub use transport::{ConnectionStatus, TestimonialTransport, TransportEvent};
pub use validate::{admit, admit_direct, ValidationLimits};

//! Testimonial reconciliation engine.
//!
//! Reconciles an at-least-once, possibly-duplicated, possibly-out-of-order
//! stream of unconfirmed testimonials with a ledger that enforces one
//! active record per (sender, receiver) pair.
//!
//! Data flow: transport events -> admission gate -> pending store ->
//! {notification aggregator, snapshots}. User actions (accept, reject,
//! refresh) run through the [`reconcile::ReconciliationController`] and
//! [`refresh::RefreshCoordinator`], which serialize all mutation.
//!
//! The entry point is [`engine::TestimonialEngine`].

pub mod config;
pub mod connection;
pub mod engine;
pub mod events;
pub mod notify;
pub mod pending;
pub mod reconcile;
pub mod refresh;

pub use config::EngineConfig;
pub use connection::ConnectionMonitor;
pub use engine::TestimonialEngine;
pub use events::{EngineEvent, RemovalReason};
pub use notify::NotificationAggregator;
pub use pending::PendingStore;
pub use reconcile::{AcceptOutcome, ReconciliationController, ReplacementTicket};
pub use refresh::RefreshCoordinator;

//! Test support for the Vouch engine: in-memory ledger and transport
//! collaborators with failure injection, plus envelope builders.
//!
//! Add to a crate's dev-dependencies and use the builders with the
//! engine's public API:
//!
//! ```rust,ignore
//! use vouch_testkit::*;
//!
//! let ledger = std::sync::Arc::new(MemoryLedger::new());
//! let transport = std::sync::Arc::new(MemoryTransport::new());
//! let env = envelope("m1", ALICE, BOB, "Great work");
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod ledger;
pub mod transport;

pub use ledger::MemoryLedger;
pub use transport::MemoryTransport;

use vouch_core::{Address, TestimonialEnvelope};

/// Well-known sender address for tests.
pub const ALICE: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
/// Well-known receiver address for tests.
pub const BOB: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
/// A second sender address for tests.
pub const CAROL: &str = "0xcccccccccccccccccccccccccccccccccccccccc";

/// Parse a well-known test address.
pub fn addr(s: &str) -> Address {
    Address::parse(s).unwrap()
}

/// Build a transport envelope with the given id, sender, receiver, and
/// content. Name, url, and signature get deterministic filler values.
pub fn envelope(id: &str, sender: &str, receiver: &str, content: &str) -> TestimonialEnvelope {
    TestimonialEnvelope {
        id: Some(id.to_owned()),
        sender_address: sender.to_owned(),
        receiver_address: receiver.to_owned(),
        content: content.to_owned(),
        giver_name: format!("giver-{sender}"),
        profile_url: String::new(),
        signature: format!("sig-{id}"),
        timestamp: None,
    }
}

/// Initialize test logging once; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

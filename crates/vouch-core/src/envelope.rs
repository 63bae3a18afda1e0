//! Inbound testimonial payloads.
//!
//! Two shapes reach the engine: transport-delivered envelopes (carrying a
//! message id) and pasted signed testimonials (no id, treated as direct
//! accept candidates that bypass the pending store).

use crate::error::VouchError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport message identifier.
///
/// Opaque to the engine; uniqueness is the transport's concern, and the
/// engine only requires that re-delivery reuses the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap a transport-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A structurally untrusted inbound envelope, as delivered by the
/// transport or decoded from pasted JSON.
///
/// All fields are raw strings; nothing here has passed validation. The
/// only path from an envelope into the pending store is
/// [`crate::validate::admit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestimonialEnvelope {
    /// Transport message id. Required for transport-delivered envelopes;
    /// absent on pasted payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Author's account address (unvalidated).
    pub sender_address: String,
    /// Recipient's account address (unvalidated).
    pub receiver_address: String,
    /// Testimonial body.
    pub content: String,
    /// Author's display name.
    #[serde(default)]
    pub giver_name: String,
    /// Author's profile link.
    #[serde(default)]
    pub profile_url: String,
    /// Author's signature over the testimonial fields.
    pub signature: String,
    /// Transport timestamp in unix milliseconds, when provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl TestimonialEnvelope {
    /// Decode a pasted JSON payload.
    pub fn from_json(raw: &str) -> Result<Self, VouchError> {
        serde_json::from_str(raw)
            .map_err(|e| VouchError::validation(format!("invalid testimonial JSON: {e}")))
    }
}

/// A validated signed testimonial with no transport id: the pasted-input
/// shape, handed straight to the accept path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTestimonial {
    /// Author's account address.
    pub sender_address: crate::Address,
    /// Recipient's account address.
    pub receiver_address: crate::Address,
    /// Testimonial body.
    pub content: String,
    /// Author's display name.
    pub giver_name: String,
    /// Author's profile link.
    pub profile_url: String,
    /// Author's signature over the testimonial fields.
    pub signature: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_camel_case_json() {
        let raw = r#"{
            "id": "m1",
            "senderAddress": "0xA",
            "receiverAddress": "0xB",
            "content": "Great work",
            "giverName": "Alice",
            "profileUrl": "https://example.com/alice",
            "signature": "sig1",
            "timestamp": 1700000000000
        }"#;
        let env = TestimonialEnvelope::from_json(raw).unwrap();
        assert_eq!(env.id.as_deref(), Some("m1"));
        assert_eq!(env.giver_name, "Alice");
        assert_eq!(env.timestamp, Some(1_700_000_000_000));
    }

    #[test]
    fn id_and_timestamp_are_optional() {
        let raw = r#"{
            "senderAddress": "0xA",
            "receiverAddress": "0xB",
            "content": "Great work",
            "giverName": "Alice",
            "profileUrl": "",
            "signature": "sig1"
        }"#;
        let env = TestimonialEnvelope::from_json(raw).unwrap();
        assert!(env.id.is_none());
        assert!(env.timestamp.is_none());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(TestimonialEnvelope::from_json("not json").is_err());
    }
}

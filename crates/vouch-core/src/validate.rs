//! Envelope admission gate.
//!
//! [`admit`] is the single path from an untrusted envelope into a
//! [`PendingAttestation`]. It is a pure transform: no side effects, no
//! I/O, and the pending store never receives un-validated input.
//!
//! Signature authenticity is deliberately not checked here; that is the
//! ledger's concern at commit time.

use crate::address::Address;
use crate::attestation::PendingAttestation;
use crate::envelope::{MessageId, TestimonialEnvelope};
use crate::error::VouchError;
use chrono::{DateTime, TimeZone, Utc};

/// Structural limits enforced at admission.
#[derive(Debug, Clone)]
pub struct ValidationLimits {
    /// Maximum testimonial body length in characters.
    pub max_content_chars: usize,
    /// Maximum profile URL length in characters.
    pub max_url_chars: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_content_chars: 2000,
            max_url_chars: 512,
        }
    }
}

/// Validate and normalize an inbound envelope.
///
/// Rejects when the `id` is missing, either address fails shape
/// validation, the content is empty or over the limit, or the signature
/// is missing. On success returns the normalized [`PendingAttestation`]
/// stamped with `received_at` (the envelope timestamp when present and
/// plausible, otherwise `now`).
pub fn admit(
    envelope: TestimonialEnvelope,
    limits: &ValidationLimits,
    now: DateTime<Utc>,
) -> Result<PendingAttestation, VouchError> {
    let id = match envelope.id {
        Some(ref id) if !id.trim().is_empty() => MessageId::new(id.trim()),
        _ => return Err(VouchError::validation("envelope has no message id")),
    };

    let sender_address = Address::parse(&envelope.sender_address)?;
    let receiver_address = Address::parse(&envelope.receiver_address)?;

    let content = envelope.content.trim();
    if content.is_empty() {
        return Err(VouchError::validation("testimonial content is empty"));
    }
    if content.chars().count() > limits.max_content_chars {
        return Err(VouchError::validation(format!(
            "testimonial content exceeds {} characters",
            limits.max_content_chars
        )));
    }

    if envelope.signature.trim().is_empty() {
        return Err(VouchError::validation("envelope has no signature"));
    }

    let profile_url = envelope.profile_url.trim();
    if profile_url.chars().count() > limits.max_url_chars {
        return Err(VouchError::validation(format!(
            "profile url exceeds {} characters",
            limits.max_url_chars
        )));
    }

    let received_at = envelope
        .timestamp
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
        .unwrap_or(now);

    Ok(PendingAttestation {
        id,
        sender_address,
        receiver_address,
        content: content.to_owned(),
        giver_name: envelope.giver_name.trim().to_owned(),
        profile_url: profile_url.to_owned(),
        signature: envelope.signature.trim().to_owned(),
        received_at,
    })
}

/// Validate a pasted payload as a direct accept candidate.
///
/// Same structural checks as [`admit`] except that no message id is
/// required (pasted payloads bypass the pending store entirely).
pub fn admit_direct(
    envelope: TestimonialEnvelope,
    limits: &ValidationLimits,
) -> Result<crate::envelope::SignedTestimonial, VouchError> {
    let sender_address = Address::parse(&envelope.sender_address)?;
    let receiver_address = Address::parse(&envelope.receiver_address)?;

    let content = envelope.content.trim();
    if content.is_empty() {
        return Err(VouchError::validation("testimonial content is empty"));
    }
    if content.chars().count() > limits.max_content_chars {
        return Err(VouchError::validation(format!(
            "testimonial content exceeds {} characters",
            limits.max_content_chars
        )));
    }

    if envelope.signature.trim().is_empty() {
        return Err(VouchError::validation("envelope has no signature"));
    }

    Ok(crate::envelope::SignedTestimonial {
        sender_address,
        receiver_address,
        content: content.to_owned(),
        giver_name: envelope.giver_name.trim().to_owned(),
        profile_url: envelope.profile_url.trim().to_owned(),
        signature: envelope.signature.trim().to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const SENDER: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const RECEIVER: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn envelope() -> TestimonialEnvelope {
        TestimonialEnvelope {
            id: Some("m1".into()),
            sender_address: SENDER.into(),
            receiver_address: RECEIVER.into(),
            content: "Great collaborator".into(),
            giver_name: "Alice".into(),
            profile_url: "https://example.com/alice".into(),
            signature: "sig1".into(),
            timestamp: None,
        }
    }

    #[test]
    fn admits_valid_envelope() {
        let now = Utc::now();
        let item = admit(envelope(), &ValidationLimits::default(), now).unwrap();
        assert_eq!(item.id.as_str(), "m1");
        assert_eq!(item.sender_address.as_str(), SENDER);
        assert_eq!(item.received_at, now);
    }

    #[test]
    fn uses_envelope_timestamp_when_present() {
        let mut env = envelope();
        env.timestamp = Some(1_700_000_000_000);
        let item = admit(env, &ValidationLimits::default(), Utc::now()).unwrap();
        assert_eq!(item.received_at.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn rejects_missing_id() {
        let mut env = envelope();
        env.id = None;
        assert_matches!(
            admit(env, &ValidationLimits::default(), Utc::now()),
            Err(VouchError::Validation { .. })
        );

        let mut env = envelope();
        env.id = Some("   ".into());
        assert_matches!(
            admit(env, &ValidationLimits::default(), Utc::now()),
            Err(VouchError::Validation { .. })
        );
    }

    #[test]
    fn rejects_bad_addresses() {
        let mut env = envelope();
        env.sender_address = "0xA".into();
        assert!(admit(env, &ValidationLimits::default(), Utc::now()).is_err());

        let mut env = envelope();
        env.receiver_address = "not-an-address".into();
        assert!(admit(env, &ValidationLimits::default(), Utc::now()).is_err());
    }

    #[test]
    fn rejects_empty_content_and_signature() {
        let mut env = envelope();
        env.content = "   ".into();
        assert!(admit(env, &ValidationLimits::default(), Utc::now()).is_err());

        let mut env = envelope();
        env.signature = String::new();
        assert!(admit(env, &ValidationLimits::default(), Utc::now()).is_err());
    }

    #[test]
    fn rejects_oversize_content() {
        let mut env = envelope();
        env.content = "x".repeat(2001);
        assert!(admit(env, &ValidationLimits::default(), Utc::now()).is_err());
    }

    #[test]
    fn admit_direct_does_not_require_id() {
        let mut env = envelope();
        env.id = None;
        let signed = admit_direct(env, &ValidationLimits::default()).unwrap();
        assert_eq!(signed.sender_address.as_str(), SENDER);
        assert_eq!(signed.content, "Great collaborator");
    }

    #[test]
    fn admit_direct_still_checks_structure() {
        let mut env = envelope();
        env.content = String::new();
        assert!(admit_direct(env, &ValidationLimits::default()).is_err());
    }
}

//! Account address newtype.
//!
//! Addresses arrive from untrusted envelopes in mixed case. Parsing
//! normalizes to lowercase so that equality and map keys are
//! case-insensitive by construction, matching how the ledger compares
//! senders.

use crate::error::VouchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of raw bytes in an account address.
pub const ADDRESS_BYTES: usize = 20;

/// A normalized account address: `0x` followed by 40 hex characters,
/// stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse and normalize an address string.
    ///
    /// Accepts mixed-case hex with a mandatory `0x` prefix and rejects
    /// anything that is not exactly 20 bytes of hex.
    pub fn parse(input: &str) -> Result<Self, VouchError> {
        let trimmed = input.trim();
        let Some(body) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        else {
            return Err(VouchError::validation(format!(
                "address missing 0x prefix: {trimmed:?}"
            )));
        };

        let bytes = hex::decode(body)
            .map_err(|_| VouchError::validation(format!("address is not hex: {trimmed:?}")))?;
        if bytes.len() != ADDRESS_BYTES {
            return Err(VouchError::validation(format!(
                "address must be {ADDRESS_BYTES} bytes, got {}",
                bytes.len()
            )));
        }

        Ok(Self(format!("0x{}", body.to_ascii_lowercase())))
    }

    /// The normalized string form (`0x` + 40 lowercase hex chars).
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened display form for logs: `0x1234..abcd`.
    pub fn short(&self) -> String {
        format!("{}..{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = VouchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = VouchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes_case() {
        let upper = Address::parse("0xABCDEF0123456789abcdef0123456789ABCDEF01").unwrap();
        let lower = Address::parse("0xabcdef0123456789abcdef0123456789abcdef01").unwrap();
        assert_eq!(upper, lower);
        assert_eq!(
            upper.as_str(),
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(Address::parse("abcdef0123456789abcdef0123456789abcdef01").is_err());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Address::parse("0xabcd").is_err());
        assert!(Address::parse("0xabcdef0123456789abcdef0123456789abcdef0100").is_err());
    }

    #[test]
    fn rejects_non_hex() {
        assert!(Address::parse("0xzzcdef0123456789abcdef0123456789abcdef01").is_err());
    }

    #[test]
    fn short_form() {
        let addr = Address::parse("0xabcdef0123456789abcdef0123456789abcdef01").unwrap();
        assert_eq!(addr.short(), "0xabcd..ef01");
    }

    proptest::proptest! {
        #[test]
        fn any_twenty_bytes_parse_case_insensitively(bytes in proptest::array::uniform20(0u8..)) {
            let lower = format!("0x{}", hex::encode(bytes));
            let upper = format!("0x{}", hex::encode_upper(bytes));
            let a = Address::parse(&lower).unwrap();
            let b = Address::parse(&upper).unwrap();
            proptest::prop_assert_eq!(&a, &b);
            proptest::prop_assert_eq!(a.as_str(), lower);
        }
    }
}

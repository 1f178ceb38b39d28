//! Foreign-chain Account Addresses
//!
//! 20-byte addresses with EIP-55 mixed-case checksums. Input in a single case
//! is accepted as-is; mixed-case input must carry a valid checksum.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::hash::keccak256;

/// A 20-byte account address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Decode an address from a left-padded 32-byte log topic
    pub fn from_topic(topic: &[u8; 32]) -> Result<Self, AddressError> {
        if topic[..12].iter().any(|b| *b != 0) {
            return Err(AddressError::DirtyPadding);
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&topic[12..]);
        Ok(Self(bytes))
    }

    /// Left-pad into a 32-byte log topic
    pub fn to_topic(&self) -> [u8; 32] {
        let mut topic = [0u8; 32];
        topic[12..].copy_from_slice(&self.0);
        topic
    }

    /// EIP-55 checksummed representation
    pub fn to_checksum_string(&self) -> String {
        let lower = hex::encode(self.0);
        let digest = keccak256(lower.as_bytes());

        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (digest[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.strip_prefix("0x").ok_or(AddressError::MissingPrefix)?;

        if body.len() != 40 {
            return Err(AddressError::InvalidLength(body.len()));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(body, &mut bytes)
            .map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        let address = Self(bytes);

        let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
        if has_upper && has_lower && address.to_checksum_string() != s {
            return Err(AddressError::BadChecksum);
        }

        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum_string())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Address parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address must start with 0x")]
    MissingPrefix,

    #[error("address must be 40 hex characters, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("mixed-case address has an invalid EIP-55 checksum")]
    BadChecksum,

    #[error("topic padding is not zero")]
    DirtyPadding,
}

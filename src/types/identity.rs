//! Host-side account identities
//!
//! Deposits name their beneficiary in a 32-byte log topic: the first byte is
//! the identity length, followed by the identity bytes and zero padding.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Maximum identity length that fits in a topic next to the length byte
pub const MAX_IDENTITY_LEN: usize = 29;

/// Opaque host ledger identity (1..=29 bytes)
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostIdentity(Vec<u8>);

impl HostIdentity {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        if bytes.is_empty() {
            return Err(IdentityError::Empty);
        }
        if bytes.len() > MAX_IDENTITY_LEN {
            return Err(IdentityError::TooLong(bytes.len()));
        }
        Ok(Self(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Decode the beneficiary topic of a deposit log
    pub fn from_topic(topic: &[u8; 32]) -> Result<Self, IdentityError> {
        let len = topic[0] as usize;
        if len == 0 {
            return Err(IdentityError::Empty);
        }
        if len > MAX_IDENTITY_LEN {
            return Err(IdentityError::TooLong(len));
        }
        if topic[1 + len..].iter().any(|b| *b != 0) {
            return Err(IdentityError::DirtyPadding);
        }
        Ok(Self(topic[1..1 + len].to_vec()))
    }

    pub fn to_topic(&self) -> [u8; 32] {
        let mut topic = [0u8; 32];
        topic[0] = self.0.len() as u8;
        topic[1..1 + self.0.len()].copy_from_slice(&self.0);
        topic
    }
}

impl FromStr for HostIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(body).map_err(|e| IdentityError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for HostIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for HostIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostIdentity({})", self)
    }
}

impl Serialize for HostIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HostIdentity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("identity is empty")]
    Empty,

    #[error("identity is {0} bytes, at most 29 allowed")]
    TooLong(usize),

    #[error("identity padding is not zero")]
    DirtyPadding,

    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_roundtrip() {
        let identity = HostIdentity::from_bytes(&[0xab; 29]).unwrap();
        let topic = identity.to_topic();
        assert_eq!(topic[0], 29);
        assert_eq!(HostIdentity::from_topic(&topic).unwrap(), identity);
    }

    #[test]
    fn test_topic_rejects_bad_layouts() {
        let mut topic = [0u8; 32];
        assert_eq!(HostIdentity::from_topic(&topic), Err(IdentityError::Empty));

        topic[0] = 30;
        assert_eq!(HostIdentity::from_topic(&topic), Err(IdentityError::TooLong(30)));

        topic[0] = 2;
        topic[1] = 1;
        topic[2] = 2;
        topic[20] = 7;
        assert_eq!(
            HostIdentity::from_topic(&topic),
            Err(IdentityError::DirtyPadding)
        );
    }

    #[test]
    fn test_parse_hex() {
        let identity: HostIdentity = "0x0102".parse().unwrap();
        assert_eq!(identity.as_bytes(), &[1, 2]);
        assert_eq!(identity.to_string(), "0102");
        assert!("".parse::<HostIdentity>().is_err());
    }
}

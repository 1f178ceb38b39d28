//! Keccak Hashing and 32-byte Hashes
//!
//! Transaction hashes, log topics and signing digests on the foreign chain
//! are all keccak-256 outputs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use tiny_keccak::{Hasher, Keccak};

/// Compute keccak-256 of `data`
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// A 32-byte hash (transaction hash, block hash)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}

impl FromStr for Hash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = decode_fixed::<32>(s)?;
        Ok(Self(bytes))
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Decode a `0x`-prefixed hex string of exactly `N` bytes
pub fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], String> {
    let stripped = s
        .strip_prefix("0x")
        .ok_or_else(|| format!("missing 0x prefix: {}", s))?;

    if stripped.len() != N * 2 {
        return Err(format!(
            "expected {} hex characters, got {}",
            N * 2,
            stripped.len()
        ));
    }

    let mut out = [0u8; N];
    hex::decode_to_slice(stripped, &mut out).map_err(|e| format!("invalid hex: {}", e))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_empty_input() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_hash_parse_and_display() {
        let text = "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b";
        let hash: Hash = text.parse().unwrap();
        assert_eq!(hash.to_string(), text);

        assert!("88df".parse::<Hash>().is_err());
        assert!("0x88df".parse::<Hash>().is_err());
    }
}

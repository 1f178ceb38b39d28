//! In-process Key Signer
//!
//! Holds a secp256k1 key in memory. Development and tests only; the
//! configuration layer refuses it on mainnet.

use async_trait::async_trait;
use k256::ecdsa::SigningKey;

use super::{SignRequest, SigningError, ThresholdSigner};

/// Single-key signer serving one key id
pub struct LocalKeySigner {
    key_id: String,
    signing_key: SigningKey,
}

impl LocalKeySigner {
    /// Create from secret key bytes
    pub fn from_bytes(key_id: impl Into<String>, bytes: &[u8; 32]) -> Result<Self, SigningError> {
        let signing_key =
            SigningKey::from_slice(bytes).map_err(|e| SigningError::InvalidKey(e.to_string()))?;

        Ok(Self {
            key_id: key_id.into(),
            signing_key,
        })
    }

    /// Create from hex string (with or without `0x`)
    pub fn from_hex(key_id: impl Into<String>, hex: &str) -> Result<Self, SigningError> {
        let bytes = hex::decode(hex.trim_start_matches("0x"))
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;

        if bytes.len() != 32 {
            return Err(SigningError::InvalidKey("key must be 32 bytes".to_string()));
        }

        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Self::from_bytes(key_id, &arr)
    }

    /// Generate a new random signer
    pub fn generate(key_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            signing_key: SigningKey::random(&mut rand::thread_rng()),
        }
    }

    /// Uncompressed SEC1 public key
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.signing_key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    /// Sign a prehashed digest, returning `r || s`
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<[u8; 64], SigningError> {
        let (signature, _recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|e| SigningError::Rejected(e.to_string()))?;

        let mut out = [0u8; 64];
        out.copy_from_slice(&signature.to_bytes());
        Ok(out)
    }

    fn check_key_id(&self, key_id: &str) -> Result<(), SigningError> {
        if key_id != self.key_id {
            return Err(SigningError::InvalidKey(format!("unknown key id {}", key_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl ThresholdSigner for LocalKeySigner {
    async fn public_key(&self, key_id: String) -> Result<Vec<u8>, SigningError> {
        self.check_key_id(&key_id)?;
        Ok(self.public_key_bytes())
    }

    async fn sign(&self, request: SignRequest) -> Result<[u8; 64], SigningError> {
        self.check_key_id(&request.key_id)?;
        self.sign_digest(&request.digest)
    }

    fn signer_type(&self) -> &'static str {
        "local-key"
    }
}

//! Signing Module
//!
//! The threshold signing service is consumed through [`ThresholdSigner`];
//! the [`SigningOrchestrator`] turns its raw signatures into signed
//! foreign-chain transactions.

pub mod local;
pub mod orchestrator;
pub mod remote;

use async_trait::async_trait;

pub use local::LocalKeySigner;
pub use orchestrator::{derive_address, SigningOrchestrator};
pub use remote::RemoteSigner;

/// Signing request sent to the signing service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignRequest {
    pub key_id: String,
    pub digest: [u8; 32],
}

/// Signing errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SigningError {
    #[error("signing service unavailable: {0}")]
    Unavailable(String),

    #[error("signing rejected: {0}")]
    Rejected(String),

    #[error("signing already in flight for sequence number {0}")]
    AlreadyInFlight(u64),

    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl SigningError {
    /// Every signing failure leaves the request untouched and may be retried
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidKey(_))
    }
}

/// Opaque signing service: digest and key id in, signature out
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ThresholdSigner: Send + Sync {
    /// SEC1-encoded public key of `key_id`
    async fn public_key(&self, key_id: String) -> Result<Vec<u8>, SigningError>;

    /// 64-byte `r || s` ECDSA signature over the digest
    async fn sign(&self, request: SignRequest) -> Result<[u8; 64], SigningError>;

    /// Signer type description
    fn signer_type(&self) -> &'static str;
}

//! Signing Orchestrator
//!
//! Serializes signing per nonce, normalizes signatures to low-S and
//! recovers the y-parity against the minter key before attaching the
//! signature to a transaction.
//!
//! A withdrawal signature is kept until the ledger has recorded it, so a
//! failed commit is retried with the same signed bytes.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

use super::{SignRequest, SigningError, ThresholdSigner};
use crate::transaction::{RecoverableSignature, SignedTransaction, UnsignedTransaction};
use crate::types::{keccak256, Address};

/// Wraps the signing service for the withdrawal driver
pub struct SigningOrchestrator {
    signer: Arc<dyn ThresholdSigner>,
    key_id: String,
    verifying_key: OnceCell<VerifyingKey>,
    in_flight: Mutex<HashSet<u64>>,
    /// Signed withdrawals the ledger has not recorded yet
    unrecorded: Mutex<HashMap<u64, SignedTransaction>>,
}

/// Removes its sequence number from the in-flight set when dropped
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<u64>>,
    sequence_number: u64,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<u64>>, sequence_number: u64) -> Result<Self, SigningError> {
        let mut guard = set.lock().unwrap_or_else(|e| e.into_inner());
        if !guard.insert(sequence_number) {
            return Err(SigningError::AlreadyInFlight(sequence_number));
        }
        Ok(Self {
            set,
            sequence_number,
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut guard = self.set.lock().unwrap_or_else(|e| e.into_inner());
        guard.remove(&self.sequence_number);
    }
}

impl SigningOrchestrator {
    pub fn new(signer: Arc<dyn ThresholdSigner>, key_id: impl Into<String>) -> Self {
        Self {
            signer,
            key_id: key_id.into(),
            verifying_key: OnceCell::new(),
            in_flight: Mutex::new(HashSet::new()),
            unrecorded: Mutex::new(HashMap::new()),
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn signer_type(&self) -> &'static str {
        self.signer.signer_type()
    }

    /// Minter public key, fetched once and cached
    pub async fn verifying_key(&self) -> Result<&VerifyingKey, SigningError> {
        self.verifying_key
            .get_or_try_init(|| async {
                let bytes = self.signer.public_key(self.key_id.clone()).await?;
                VerifyingKey::from_sec1_bytes(&bytes)
                    .map_err(|e| SigningError::InvalidKey(e.to_string()))
            })
            .await
    }

    /// Foreign-chain address controlled by the minter key
    pub async fn minter_address(&self) -> Result<Address, SigningError> {
        let key = self.verifying_key().await?;
        Ok(derive_address(key))
    }

    /// Sign the transaction of a withdrawal request
    ///
    /// Fails with [`SigningError::AlreadyInFlight`] while another signing
    /// call for the same sequence number is outstanding. If an earlier
    /// signature for `sequence_number` was never recorded, it is returned
    /// instead of signing `transaction`.
    pub async fn sign_withdrawal(
        &self,
        sequence_number: u64,
        transaction: UnsignedTransaction,
    ) -> Result<SignedTransaction, SigningError> {
        let _guard = InFlightGuard::acquire(&self.in_flight, sequence_number)?;
        if let Some(signed) = self.unrecorded_withdrawal(sequence_number) {
            return Ok(signed);
        }

        let signed = self.sign(transaction).await?;
        self.unrecorded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(sequence_number, signed.clone());
        Ok(signed)
    }

    /// Signature produced for `sequence_number` and not yet recorded
    pub fn unrecorded_withdrawal(&self, sequence_number: u64) -> Option<SignedTransaction> {
        self.unrecorded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&sequence_number)
            .cloned()
    }

    /// Forget the kept signature once the ledger holds the request's outcome
    pub fn withdrawal_recorded(&self, sequence_number: u64) {
        self.unrecorded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&sequence_number);
    }

    /// Sign a transfer that is not tied to a withdrawal request
    ///
    /// Shares the per-nonce in-flight guard with [`Self::sign_withdrawal`].
    pub async fn sign_transfer(
        &self,
        transaction: UnsignedTransaction,
    ) -> Result<SignedTransaction, SigningError> {
        let _guard = InFlightGuard::acquire(&self.in_flight, transaction.nonce())?;
        self.sign(transaction).await
    }

    async fn sign(
        &self,
        transaction: UnsignedTransaction,
    ) -> Result<SignedTransaction, SigningError> {
        let key = self.verifying_key().await?.clone();
        let digest = transaction.digest();

        let raw = self
            .signer
            .sign(SignRequest {
                key_id: self.key_id.clone(),
                digest,
            })
            .await?;

        let signature = recoverable_signature(&key, &digest, &raw)?;

        tracing::debug!(
            nonce = transaction.nonce(),
            signer = self.signer.signer_type(),
            "transaction signed"
        );
        Ok(transaction.into_signed(signature))
    }
}

/// `keccak256(uncompressed_key[1..])[12..]`
pub fn derive_address(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);

    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address::new(bytes)
}

/// Normalize to low-S and find the parity that recovers `key`
fn recoverable_signature(
    key: &VerifyingKey,
    digest: &[u8; 32],
    raw: &[u8; 64],
) -> Result<RecoverableSignature, SigningError> {
    let signature = Signature::from_slice(raw)
        .map_err(|e| SigningError::Rejected(format!("malformed signature: {}", e)))?;
    let signature = signature.normalize_s().unwrap_or(signature);

    for y_parity in [false, true] {
        let recovery_id = RecoveryId::new(y_parity, false);
        let recovered = VerifyingKey::recover_from_prehash(digest, &signature, recovery_id);

        if matches!(recovered, Ok(ref recovered) if recovered == key) {
            let bytes = signature.to_bytes();
            let mut r = [0u8; 32];
            let mut s = [0u8; 32];
            r.copy_from_slice(&bytes[..32]);
            s.copy_from_slice(&bytes[32..]);

            return Ok(RecoverableSignature { r, s, y_parity });
        }
    }

    Err(SigningError::Rejected(
        "signature does not recover the minter key".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::{LocalKeySigner, MockThresholdSigner};
    use crate::types::{Eip2930FeeSnapshot, FeeSnapshot, TRANSFER_GAS_LIMIT};

    const SECRET: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn transfer(nonce: u64) -> UnsignedTransaction {
        let fee = FeeSnapshot::Eip2930(Eip2930FeeSnapshot {
            gas_price: 20_000_000_000,
            gas_limit: TRANSFER_GAS_LIMIT,
        });
        UnsignedTransaction::transfer(
            &fee,
            1,
            nonce,
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap(),
            1_000,
        )
    }

    #[tokio::test]
    async fn test_minter_address_from_known_key() {
        let signer = LocalKeySigner::from_hex("minter", SECRET).unwrap();
        let orchestrator = SigningOrchestrator::new(Arc::new(signer), "minter");

        let address = orchestrator.minter_address().await.unwrap();
        assert_eq!(
            address.to_checksum_string(),
            "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23"
        );
    }

    #[tokio::test]
    async fn test_signature_recovers_minter_key() {
        let signer = LocalKeySigner::from_hex("minter", SECRET).unwrap();
        let orchestrator = SigningOrchestrator::new(Arc::new(signer), "minter");

        let tx = transfer(4);
        let digest = tx.digest();
        let signed = orchestrator.sign_withdrawal(4, tx).await.unwrap();

        let mut raw = [0u8; 64];
        raw[..32].copy_from_slice(&signed.signature.r);
        raw[32..].copy_from_slice(&signed.signature.s);
        let signature = Signature::from_slice(&raw).unwrap();
        assert!(signature.normalize_s().is_none(), "signature must be low-S");

        let recovered = VerifyingKey::recover_from_prehash(
            &digest,
            &signature,
            RecoveryId::new(signed.signature.y_parity, false),
        )
        .unwrap();
        assert_eq!(&recovered, orchestrator.verifying_key().await.unwrap());
    }

    #[tokio::test]
    async fn test_public_key_fetched_once() {
        let local = LocalKeySigner::from_hex("minter", SECRET).unwrap();
        let public_key = local.public_key_bytes();

        let mut mock = MockThresholdSigner::new();
        mock.expect_public_key()
            .times(1)
            .returning(move |_| Ok(public_key.clone()));
        mock.expect_signer_type().return_const("mock");

        let orchestrator = SigningOrchestrator::new(Arc::new(mock), "minter");
        let first = orchestrator.minter_address().await.unwrap();
        let second = orchestrator.minter_address().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_foreign_signature_is_rejected() {
        let local = LocalKeySigner::from_hex("minter", SECRET).unwrap();
        let public_key = local.public_key_bytes();
        let other = LocalKeySigner::generate("other");

        let mut mock = MockThresholdSigner::new();
        mock.expect_public_key()
            .returning(move |_| Ok(public_key.clone()));
        mock.expect_sign()
            .times(1)
            .returning(move |request| other.sign_digest(&request.digest));
        mock.expect_signer_type().return_const("mock");

        let orchestrator = SigningOrchestrator::new(Arc::new(mock), "minter");
        let err = orchestrator.sign_withdrawal(0, transfer(0)).await.unwrap_err();
        assert!(matches!(err, SigningError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_unavailable_signer_propagates() {
        let local = LocalKeySigner::from_hex("minter", SECRET).unwrap();
        let public_key = local.public_key_bytes();

        let mut mock = MockThresholdSigner::new();
        mock.expect_public_key()
            .returning(move |_| Ok(public_key.clone()));
        mock.expect_sign()
            .returning(|_| Err(SigningError::Unavailable("timeout".to_string())));
        mock.expect_signer_type().return_const("mock");

        let orchestrator = SigningOrchestrator::new(Arc::new(mock), "minter");
        let err = orchestrator.sign_withdrawal(0, transfer(0)).await.unwrap_err();
        assert!(err.is_retryable());

        // The in-flight marker is released after a failure
        let err = orchestrator.sign_withdrawal(0, transfer(0)).await.unwrap_err();
        assert!(matches!(err, SigningError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_unrecorded_withdrawal_is_reused() {
        let local = LocalKeySigner::from_hex("minter", SECRET).unwrap();
        let public_key = local.public_key_bytes();

        let mut mock = MockThresholdSigner::new();
        mock.expect_public_key()
            .returning(move |_| Ok(public_key.clone()));
        mock.expect_sign()
            .times(2)
            .returning(move |request| local.sign_digest(&request.digest));
        mock.expect_signer_type().return_const("mock");

        let orchestrator = SigningOrchestrator::new(Arc::new(mock), "minter");
        let first = orchestrator.sign_withdrawal(3, transfer(3)).await.unwrap();

        // A new fee snapshot does not produce a second signature
        let mut repriced = transfer(3);
        if let UnsignedTransaction::Eip2930(tx) = &mut repriced {
            tx.gas_price += 1;
        }
        let again = orchestrator.sign_withdrawal(3, repriced).await.unwrap();
        assert_eq!(again, first);
        assert_eq!(orchestrator.unrecorded_withdrawal(3), Some(first.clone()));

        orchestrator.withdrawal_recorded(3);
        assert_eq!(orchestrator.unrecorded_withdrawal(3), None);
        orchestrator.sign_withdrawal(3, transfer(3)).await.unwrap();
    }

    #[test]
    fn test_in_flight_guard() {
        let set = Mutex::new(HashSet::new());
        let guard = InFlightGuard::acquire(&set, 7).unwrap();
        assert_eq!(
            InFlightGuard::acquire(&set, 7).err(),
            Some(SigningError::AlreadyInFlight(7))
        );
        assert!(InFlightGuard::acquire(&set, 8).is_ok());

        drop(guard);
        assert!(InFlightGuard::acquire(&set, 7).is_ok());
    }
}

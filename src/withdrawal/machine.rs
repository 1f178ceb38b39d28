//! Withdrawal State Machine
//!
//! Moves withdrawal requests through
//! unapproved → signed → sent → finalized (or signed → invalid).
//!
//! # Flow:
//! 1. `withdraw` debits the caller and queues an unapproved request
//! 2. The driver signs the oldest unresolved request with `nonce = sequence_number`
//! 3. The stored raw transaction is submitted until the network knows it
//! 4. Sent transactions are finalized once their receipt is in a finalized block
//!
//! Requests are processed in strict sequence order: nothing advances past
//! an unapproved or signed request. Every transition is one commit, and the
//! state read before an outbound call is checked again before committing.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::common::{
    log_retryable_failure, log_withdrawal_event, EventCategory, MinterError, Network,
    ValidationError,
};
use crate::fees::{FeeError, FeeEstimator};
use crate::rpc::{BlockTag, EthRpcClient, SendRawTransactionResult};
use crate::signing::SigningOrchestrator;
use crate::state::{InvariantViolation, MinterEvent, StateHandle};
use crate::transaction::UnsignedTransaction;
use crate::types::{
    Address, FeeMarket, FinalizedReceipt, Hash, HostIdentity, NewWithdrawal, RetrieveEthStatus,
    Wei, WithdrawalReceipt, WithdrawalRequest, WithdrawalStatus,
};

/// Result of one driver cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriveReport {
    pub signed: usize,
    pub sent: usize,
    pub finalized: usize,
    pub invalidated: usize,
    /// Request the cycle stopped at, and why
    pub stalled: Option<(u64, String)>,
}

impl DriveReport {
    pub fn has_activity(&self) -> bool {
        self.signed > 0 || self.sent > 0 || self.finalized > 0 || self.invalidated > 0
    }
}

impl fmt::Display for DriveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} signed, {} sent, {} finalized, {} invalidated",
            self.signed, self.sent, self.finalized, self.invalidated
        )?;
        if let Some((sequence_number, reason)) = &self.stalled {
            write!(f, " (stalled at #{}: {})", sequence_number, reason)?;
        }
        Ok(())
    }
}

/// What happened to a signed request on submission
#[derive(Debug, Clone, PartialEq, Eq)]
enum SendStep {
    Sent,
    Invalidated,
    /// Keep it signed, resend the same bytes next cycle
    Retry(String),
}

/// Answer to a diagnostic transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestTransferResult {
    pub transaction_hash: Hash,
    pub nonce: u64,
    pub raw_transaction: String,
    pub result: SendRawTransactionResult,
}

/// Drives withdrawal requests to completion
pub struct WithdrawalDriver {
    client: EthRpcClient,
    fees: FeeEstimator,
    signer: Arc<SigningOrchestrator>,
    state: Arc<StateHandle>,
    fee_market: FeeMarket,
    min_withdrawal_amount: Wei,
    /// Held for the duration of a cycle
    cycle: Mutex<()>,
}

impl WithdrawalDriver {
    pub fn new(
        client: EthRpcClient,
        fees: FeeEstimator,
        signer: Arc<SigningOrchestrator>,
        state: Arc<StateHandle>,
        fee_market: FeeMarket,
        min_withdrawal_amount: Wei,
    ) -> Self {
        Self {
            client,
            fees,
            signer,
            state,
            fee_market,
            min_withdrawal_amount,
            cycle: Mutex::new(()),
        }
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Debit `caller` and queue a withdrawal to `destination`
    pub async fn withdraw(
        &self,
        caller: HostIdentity,
        amount: Wei,
        destination: &str,
    ) -> Result<WithdrawalReceipt, MinterError> {
        let destination: Address = destination
            .trim()
            .parse()
            .map_err(|e| ValidationError::InvalidDestination(format!("{}", e)))?;
        if destination.is_zero() {
            return Err(ValidationError::InvalidDestination("zero address".to_string()).into());
        }

        if amount < self.min_withdrawal_amount {
            return Err(ValidationError::AmountTooLow {
                minimum: self.min_withdrawal_amount,
                requested: amount,
            }
            .into());
        }

        let max_fee = self.current_max_fee().await;
        if amount <= max_fee {
            return Err(ValidationError::AmountBelowFee {
                max_fee,
                requested: amount,
            }
            .into());
        }

        let created_at = chrono::Utc::now().timestamp().max(0) as u64;

        let receipt = self
            .state
            .commit_with(|state| {
                let balance = state.balance_of(&caller);
                if balance < amount {
                    return Err(MinterError::from(ValidationError::InsufficientFunds {
                        balance,
                        requested: amount,
                    }));
                }

                let sequence_number = state.next_sequence_number();
                let event = MinterEvent::AcceptedWithdrawal(NewWithdrawal {
                    sequence_number,
                    caller: caller.clone(),
                    destination,
                    amount,
                    created_at,
                });
                Ok((vec![event], WithdrawalReceipt { sequence_number }))
            })
            .await?;

        log_withdrawal_event(
            "withdrawal_accepted",
            receipt.sequence_number,
            amount,
            &destination,
            None,
            None,
        );

        Ok(receipt)
    }

    /// Most the next withdrawal transaction may cost
    ///
    /// Falls back to the fee cap when no price is available.
    async fn current_max_fee(&self) -> Wei {
        let bound = self.fees.config().max_transaction_fee_bound().unwrap_or(Wei::MAX);

        match self.fees.estimate(self.fee_market).await {
            Ok(fee) => fee.max_transaction_fee().unwrap_or(bound),
            Err(e) => {
                tracing::debug!(error = %e, "no fee estimate, bounding by the fee cap");
                bound
            }
        }
    }

    /// Status of request `sequence_number`, finalizing it on demand
    pub async fn retrieve_eth_status(&self, sequence_number: u64) -> RetrieveEthStatus {
        let request = match self
            .state
            .read(|s| s.withdrawal(sequence_number).cloned())
            .await
        {
            Some(request) => request,
            None => return RetrieveEthStatus::NotFound,
        };

        if request.status == WithdrawalStatus::Sent {
            let finalized = match self.finalized_block().await {
                Ok(block) => self.finalize(&request, block).await,
                Err(e) => Err(e),
            };
            if let Err(e) = finalized {
                tracing::debug!(sequence_number, error = %e, "on-demand finalization skipped");
            }
        }

        self.state
            .read(|s| s.withdrawal(sequence_number).map(WithdrawalRequest::retrieve_status))
            .await
            .unwrap_or(RetrieveEthStatus::NotFound)
    }

    // =========================================================================
    // Driver
    // =========================================================================

    /// Run one driver cycle
    ///
    /// Returns `None` when another cycle is still running. Infrastructure
    /// failures stop the cycle at the affected request and are retried on
    /// the next one.
    pub async fn drive(&self) -> Option<DriveReport> {
        let _cycle = match self.cycle.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!("withdrawal cycle already running, skipping");
                return None;
            }
        };

        let mut report = DriveReport::default();

        while let Some(request) = self.state.read(|s| s.next_unresolved().cloned()).await {
            let sequence_number = request.sequence_number;

            let step = match request.status {
                WithdrawalStatus::Unapproved => self.sign(&request).await.map(|_| {
                    report.signed += 1;
                    None
                }),
                WithdrawalStatus::Signed => match self.send(&request).await {
                    Ok(SendStep::Sent) => {
                        report.sent += 1;
                        Ok(None)
                    }
                    Ok(SendStep::Invalidated) => {
                        report.invalidated += 1;
                        Ok(None)
                    }
                    Ok(SendStep::Retry(reason)) => Ok(Some(reason)),
                    Err(e) => Err(e),
                },
                // next_unresolved only yields unapproved or signed requests
                _ => Ok(Some(format!("unexpected status {}", request.status))),
            };

            match step {
                Ok(None) => continue,
                Ok(Some(reason)) => {
                    report.stalled = Some((sequence_number, reason));
                    break;
                }
                Err(e) => {
                    self.log_failure(sequence_number, &request.status, &e);
                    report.stalled = Some((sequence_number, e.to_string()));
                    break;
                }
            }
        }

        report.finalized += self.finalize_sent().await;

        Some(report)
    }

    /// Unapproved → Signed
    async fn sign(&self, request: &WithdrawalRequest) -> Result<(), MinterError> {
        let sequence_number = request.sequence_number;

        let signed = match self.signer.unrecorded_withdrawal(sequence_number) {
            Some(signed) => signed,
            None => {
                let transaction = self.price(request).await?;
                self.signer.sign_withdrawal(sequence_number, transaction).await?
            }
        };
        let hash = signed.hash;

        let committed = self
            .state
            .commit_with(|state| {
                let still_unapproved = state
                    .withdrawal(sequence_number)
                    .map_or(false, |r| r.status == WithdrawalStatus::Unapproved);
                if !still_unapproved {
                    return Ok::<_, MinterError>((vec![], false));
                }
                Ok((
                    vec![MinterEvent::SignedTransaction {
                        sequence_number,
                        transaction: signed,
                    }],
                    true,
                ))
            })
            .await?;
        self.signer.withdrawal_recorded(sequence_number);

        if committed {
            log_withdrawal_event(
                "withdrawal_signed",
                sequence_number,
                request.amount,
                &request.destination,
                Some(&hash),
                None,
            );
        }
        Ok(())
    }

    /// Transfer of `request` priced with a fresh fee snapshot
    async fn price(&self, request: &WithdrawalRequest) -> Result<UnsignedTransaction, MinterError> {
        let fee = self.fees.estimate(self.fee_market).await?;
        let max_fee = fee
            .max_transaction_fee()
            .ok_or_else(|| FeeError::PriceUnavailable("maximum fee overflows".to_string()))?;
        if request.amount <= max_fee {
            return Err(FeeError::FeeExceedsAmount {
                max_fee,
                amount: request.amount,
            }
            .into());
        }

        let chain_id = self.state.read(|s| s.chain_id()).await;
        Ok(UnsignedTransaction::transfer(
            &fee,
            chain_id,
            request.sequence_number,
            request.destination,
            request.amount - max_fee,
        ))
    }

    /// Signed → Sent | Invalid
    async fn send(&self, request: &WithdrawalRequest) -> Result<SendStep, MinterError> {
        let sequence_number = request.sequence_number;
        let transaction = request.transaction.as_ref().ok_or_else(|| {
            InvariantViolation::TransactionMismatch {
                sequence_number,
                reason: "signed request without transaction".to_string(),
            }
        })?;

        let result = self
            .client
            .send_raw_transaction(&transaction.raw_transaction)
            .await;

        let step = match result {
            SendRawTransactionResult::Ok | SendRawTransactionResult::AlreadyKnown => SendStep::Sent,
            SendRawTransactionResult::NonceTooLow => {
                // Either our own transaction was mined already or the nonce
                // was consumed by something else
                match self.client.get_transaction_by_hash(&transaction.hash).await? {
                    Some(_) => SendStep::Sent,
                    None => {
                        return self
                            .invalidate(request, "nonce too low and transaction unknown")
                            .await;
                    }
                }
            }
            SendRawTransactionResult::NonceTooHigh => SendStep::Retry("nonce too high".to_string()),
            SendRawTransactionResult::InsufficientFunds => {
                SendStep::Retry("insufficient funds".to_string())
            }
            SendRawTransactionResult::Retryable(reason) => SendStep::Retry(reason),
            SendRawTransactionResult::Rejected(reason) => {
                return self.invalidate(request, &reason).await;
            }
        };

        match step {
            SendStep::Sent => {
                let committed = self
                    .commit_if_status(
                        sequence_number,
                        WithdrawalStatus::Signed,
                        MinterEvent::SentTransaction { sequence_number },
                    )
                    .await?;
                if committed {
                    log_withdrawal_event(
                        "withdrawal_sent",
                        sequence_number,
                        request.amount,
                        &request.destination,
                        Some(&transaction.hash),
                        None,
                    );
                }
            }
            SendStep::Retry(ref reason) => {
                log_retryable_failure(
                    EventCategory::Withdrawal,
                    "eth_sendRawTransaction",
                    "SEND_RETRYABLE",
                    &format!("withdrawal {}: {}", sequence_number, reason),
                );
            }
            SendStep::Invalidated => {}
        }

        Ok(step)
    }

    async fn invalidate(
        &self,
        request: &WithdrawalRequest,
        reason: &str,
    ) -> Result<SendStep, MinterError> {
        let sequence_number = request.sequence_number;

        let committed = self
            .commit_if_status(
                sequence_number,
                WithdrawalStatus::Signed,
                MinterEvent::InvalidatedTransaction {
                    sequence_number,
                    reason: reason.to_string(),
                },
            )
            .await?;

        if committed {
            let error = MinterError::TerminalTransaction {
                sequence_number,
                reason: reason.to_string(),
            };
            log_withdrawal_event(
                "withdrawal_invalidated",
                sequence_number,
                request.amount,
                &request.destination,
                request.transaction_hash().as_ref(),
                Some(&error.to_string()),
            );
        }

        Ok(SendStep::Invalidated)
    }

    /// Sent → Finalized for every sent request whose receipt is final
    async fn finalize_sent(&self) -> usize {
        let sent = self.state.read(|s| s.sent_requests()).await;
        if sent.is_empty() {
            return 0;
        }

        let finalized_block = match self.finalized_block().await {
            Ok(block) => block,
            Err(e) => {
                log_retryable_failure(
                    EventCategory::Rpc,
                    "eth_getBlockByNumber",
                    e.error_code(),
                    &e.to_string(),
                );
                return 0;
            }
        };

        let mut finalized = 0;
        for request in &sent {
            match self.finalize(request, finalized_block).await {
                Ok(true) => finalized += 1,
                Ok(false) => {}
                Err(e) => self.log_failure(request.sequence_number, &request.status, &e),
            }
        }
        finalized
    }

    async fn finalized_block(&self) -> Result<u64, MinterError> {
        Ok(self.client.get_block_by_number(BlockTag::Finalized).await?.number)
    }

    /// Record the receipt of a sent request if it is final
    async fn finalize(
        &self,
        request: &WithdrawalRequest,
        finalized_block: u64,
    ) -> Result<bool, MinterError> {
        let sequence_number = request.sequence_number;
        let hash = match request.transaction_hash() {
            Some(hash) => hash,
            None => return Ok(false),
        };

        let receipt = match self.client.get_transaction_receipt(&hash).await? {
            Some(receipt) if receipt.block_number <= finalized_block => receipt,
            _ => return Ok(false),
        };

        let receipt = FinalizedReceipt {
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            effective_gas_price: receipt.effective_gas_price,
            status: receipt.status,
        };
        let fee = receipt.effective_transaction_fee();

        let committed = self
            .commit_if_status(
                sequence_number,
                WithdrawalStatus::Sent,
                MinterEvent::FinalizedTransaction {
                    sequence_number,
                    receipt,
                },
            )
            .await?;

        if committed {
            tracing::debug!(sequence_number, fee = %fee, "effective transaction fee");
            log_withdrawal_event(
                "withdrawal_finalized",
                sequence_number,
                request.amount,
                &request.destination,
                Some(&hash),
                None,
            );
        }
        Ok(committed)
    }

    /// Commit `event` only if request `sequence_number` is still in `expected`
    async fn commit_if_status(
        &self,
        sequence_number: u64,
        expected: WithdrawalStatus,
        event: MinterEvent,
    ) -> Result<bool, MinterError> {
        self.state
            .commit_with(|state| {
                let unchanged = state
                    .withdrawal(sequence_number)
                    .map_or(false, |r| r.status == expected);
                if !unchanged {
                    return Ok::<_, MinterError>((vec![], false));
                }
                Ok((vec![event], true))
            })
            .await
    }

    fn log_failure(&self, sequence_number: u64, status: &WithdrawalStatus, error: &MinterError) {
        if error.is_retryable() {
            let category = match error {
                MinterError::Signing(_) => EventCategory::Signing,
                MinterError::Rpc(_) => EventCategory::Rpc,
                _ => EventCategory::Withdrawal,
            };
            log_retryable_failure(
                category,
                &format!("withdrawal {} ({})", sequence_number, status),
                error.error_code(),
                &error.to_string(),
            );
        } else {
            tracing::error!(
                sequence_number,
                status = %status,
                code = error.error_code(),
                error = %error,
                "withdrawal step failed"
            );
        }
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Sign and submit a plain transfer outside the withdrawal queue
    ///
    /// Without `nonce`, the pending transaction count of the minter address
    /// is used. Nonces from the first sequence number on are reserved for
    /// withdrawals and refused, as is mainnet. The ledger is not touched.
    pub async fn test_transfer(
        &self,
        destination: &str,
        amount: Wei,
        nonce: Option<u64>,
    ) -> Result<TestTransferResult, MinterError> {
        let destination: Address = destination
            .trim()
            .parse()
            .map_err(|e| ValidationError::InvalidDestination(format!("{}", e)))?;

        let (chain_id, first_sequence_number) = self
            .state
            .read(|s| (s.chain_id(), s.first_sequence_number()))
            .await;
        if chain_id == Network::Mainnet.chain_id() {
            return Err(MinterError::Disabled("test_transfer on mainnet".to_string()));
        }

        let nonce = match nonce {
            Some(nonce) => nonce,
            None => {
                let minter = self.signer.minter_address().await?;
                self.client
                    .get_transaction_count(&minter, BlockTag::Pending)
                    .await?
            }
        };
        // Withdrawal sequence numbers never go below the first one
        if nonce >= first_sequence_number {
            return Err(ValidationError::ReservedNonce {
                nonce,
                first_sequence_number,
            }
            .into());
        }

        let fee = self.fees.estimate(self.fee_market).await?;
        let transaction = UnsignedTransaction::transfer(&fee, chain_id, nonce, destination, amount);

        let signed = self.signer.sign_transfer(transaction).await?;
        let result = self.client.send_raw_transaction(&signed.raw_transaction).await;

        tracing::info!(
            nonce,
            transaction_hash = %signed.hash,
            result = ?result,
            "test transfer submitted"
        );

        Ok(TestTransferResult {
            transaction_hash: signed.hash,
            nonce,
            raw_transaction: signed.raw_transaction,
            result,
        })
    }
}

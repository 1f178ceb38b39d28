//! Minter State
//!
//! The ledger, the scan cursor, the classified deposit sources and the
//! withdrawal queue. The state only changes through [`MinterState::apply`],
//! which validates an audit event before folding it in.

pub mod event;
pub mod handle;

use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::{
    Address, EventSource, HostIdentity, InvalidDeposit, MintedDeposit, WithdrawalRequest,
    WithdrawalStatus, Wei,
};

pub use event::MinterEvent;
pub use handle::{StateError, StateHandle};

/// A state change that would break a ledger invariant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("deposit source {0} is already classified")]
    DuplicateDeposit(EventSource),

    #[error("scan cursor regression from {current} to {proposed}")]
    CursorRegression { current: u64, proposed: u64 },

    #[error("balance overflow for {0}")]
    BalanceOverflow(HostIdentity),

    #[error("withdrawal of {amount} exceeds balance {balance} of {caller}")]
    Overdraft {
        caller: HostIdentity,
        amount: Wei,
        balance: Wei,
    },

    #[error("expected sequence number {expected}, got {got}")]
    SequenceMismatch { expected: u64, got: u64 },

    #[error("unknown withdrawal {0}")]
    UnknownWithdrawal(u64),

    #[error("withdrawal {sequence_number} cannot move from {from} to {to}")]
    InvalidTransition {
        sequence_number: u64,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
    },

    #[error("withdrawal {sequence_number} overtakes unresolved withdrawal {blocking}")]
    OutOfOrder { sequence_number: u64, blocking: u64 },

    #[error("transaction for withdrawal {sequence_number} does not match the request: {reason}")]
    TransactionMismatch { sequence_number: u64, reason: String },
}

/// Parameters fixed at installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinterInit {
    pub key_id: String,
    pub chain_id: u64,
    pub helper_contract: Address,
    /// Blocks up to and including this one are never scanned
    pub last_scraped_block: u64,
    /// Sequence number (and nonce) of the first withdrawal
    pub first_sequence_number: u64,
}

/// `total_credited - total_debited == sum(balances)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConservationReport {
    pub total_credited: Wei,
    pub total_debited: Wei,
    pub sum_of_balances: Wei,
    pub holds: bool,
    /// Debited amounts whose transaction was rejected and never refunded
    pub stuck_in_invalid: Wei,
}

/// Read-only export for operators
#[derive(Debug, Clone, Serialize)]
pub struct DebugSnapshot {
    pub key_id: String,
    pub chain_id: u64,
    pub helper_contract: Address,
    pub last_scraped_block: u64,
    pub minted_sources: Vec<EventSource>,
    pub invalid_deposits: Vec<InvalidDeposit>,
    pub total_issued_requests: u64,
    pub next_sequence_number: u64,
    pub unapproved: Vec<WithdrawalRequest>,
    /// Signed or sent
    pub in_flight: Vec<WithdrawalRequest>,
    /// Finalized or invalid
    pub resolved: Vec<WithdrawalRequest>,
    pub conservation: ConservationReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinterState {
    key_id: String,
    chain_id: u64,
    helper_contract: Address,
    last_scraped_block: u64,
    first_sequence_number: u64,
    next_sequence_number: u64,
    balances: BTreeMap<HostIdentity, Wei>,
    minted: BTreeMap<EventSource, MintedDeposit>,
    invalid: BTreeMap<EventSource, InvalidDeposit>,
    withdrawals: BTreeMap<u64, WithdrawalRequest>,
    total_credited: Wei,
    total_debited: Wei,
}

impl MinterState {
    pub fn new(init: MinterInit) -> Self {
        Self {
            key_id: init.key_id,
            chain_id: init.chain_id,
            helper_contract: init.helper_contract,
            last_scraped_block: init.last_scraped_block,
            first_sequence_number: init.first_sequence_number,
            next_sequence_number: init.first_sequence_number,
            balances: BTreeMap::new(),
            minted: BTreeMap::new(),
            invalid: BTreeMap::new(),
            withdrawals: BTreeMap::new(),
            total_credited: 0,
            total_debited: 0,
        }
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Validate `event` and fold it into the state
    ///
    /// On error the state is left unchanged.
    pub fn apply(&mut self, event: &MinterEvent) -> Result<(), InvariantViolation> {
        match event {
            MinterEvent::AcceptedDeposit(deposit) => {
                self.check_unclassified(&deposit.source)?;

                let beneficiary = &deposit.event.beneficiary;
                let amount = deposit.event.amount;
                let balance = self.balance_of(beneficiary);

                let new_balance = balance
                    .checked_add(amount)
                    .ok_or_else(|| InvariantViolation::BalanceOverflow(beneficiary.clone()))?;
                let total_credited = self
                    .total_credited
                    .checked_add(amount)
                    .ok_or_else(|| InvariantViolation::BalanceOverflow(beneficiary.clone()))?;

                self.balances.insert(beneficiary.clone(), new_balance);
                self.total_credited = total_credited;
                self.minted.insert(deposit.source, deposit.clone());
            }

            MinterEvent::InvalidDeposit(deposit) => {
                self.check_unclassified(&deposit.source)?;
                self.invalid.insert(deposit.source, deposit.clone());
            }

            MinterEvent::SyncedToBlock { block_number } => {
                if *block_number < self.last_scraped_block {
                    return Err(InvariantViolation::CursorRegression {
                        current: self.last_scraped_block,
                        proposed: *block_number,
                    });
                }
                self.last_scraped_block = *block_number;
            }

            MinterEvent::AcceptedWithdrawal(accepted) => {
                if accepted.sequence_number != self.next_sequence_number {
                    return Err(InvariantViolation::SequenceMismatch {
                        expected: self.next_sequence_number,
                        got: accepted.sequence_number,
                    });
                }

                let balance = self.balance_of(&accepted.caller);
                if accepted.amount > balance {
                    return Err(InvariantViolation::Overdraft {
                        caller: accepted.caller.clone(),
                        amount: accepted.amount,
                        balance,
                    });
                }

                let remaining = balance - accepted.amount;
                if remaining == 0 {
                    self.balances.remove(&accepted.caller);
                } else {
                    self.balances.insert(accepted.caller.clone(), remaining);
                }

                // Bounded by total_credited, which already fits
                self.total_debited += accepted.amount;
                self.next_sequence_number += 1;
                self.withdrawals.insert(
                    accepted.sequence_number,
                    WithdrawalRequest::new(accepted.clone()),
                );
            }

            MinterEvent::SignedTransaction {
                sequence_number,
                transaction,
            } => {
                if let Some(blocking) = self.first_unresolved_before(*sequence_number) {
                    return Err(InvariantViolation::OutOfOrder {
                        sequence_number: *sequence_number,
                        blocking,
                    });
                }

                let request = self.transition(
                    *sequence_number,
                    WithdrawalStatus::Unapproved,
                    WithdrawalStatus::Signed,
                )?;

                let mismatch = if transaction.nonce() != *sequence_number {
                    Some(format!("nonce {}", transaction.nonce()))
                } else if transaction.transaction.destination() != request.destination {
                    Some("destination".to_string())
                } else if transaction.transaction.amount() > request.amount {
                    Some(format!("value {}", transaction.transaction.amount()))
                } else {
                    None
                };

                if let Some(reason) = mismatch {
                    return Err(InvariantViolation::TransactionMismatch {
                        sequence_number: *sequence_number,
                        reason,
                    });
                }

                let request = self.request_mut(*sequence_number)?;
                request.status = WithdrawalStatus::Signed;
                request.transaction = Some(transaction.clone());
            }

            MinterEvent::SentTransaction { sequence_number } => {
                self.transition(
                    *sequence_number,
                    WithdrawalStatus::Signed,
                    WithdrawalStatus::Sent,
                )?;
                self.request_mut(*sequence_number)?.status = WithdrawalStatus::Sent;
            }

            MinterEvent::FinalizedTransaction {
                sequence_number,
                receipt,
            } => {
                self.transition(
                    *sequence_number,
                    WithdrawalStatus::Sent,
                    WithdrawalStatus::Finalized,
                )?;
                let request = self.request_mut(*sequence_number)?;
                request.status = WithdrawalStatus::Finalized;
                request.receipt = Some(receipt.clone());
            }

            MinterEvent::InvalidatedTransaction {
                sequence_number,
                reason,
            } => {
                self.transition(
                    *sequence_number,
                    WithdrawalStatus::Signed,
                    WithdrawalStatus::Invalid,
                )?;
                let request = self.request_mut(*sequence_number)?;
                request.status = WithdrawalStatus::Invalid;
                request.failure = Some(reason.clone());
            }
        }

        Ok(())
    }

    fn check_unclassified(&self, source: &EventSource) -> Result<(), InvariantViolation> {
        if self.is_classified(source) {
            return Err(InvariantViolation::DuplicateDeposit(*source));
        }
        Ok(())
    }

    /// Check that request `n` is in `from`; returns it
    fn transition(
        &self,
        sequence_number: u64,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
    ) -> Result<&WithdrawalRequest, InvariantViolation> {
        let request = self
            .withdrawals
            .get(&sequence_number)
            .ok_or(InvariantViolation::UnknownWithdrawal(sequence_number))?;

        if request.status != from {
            return Err(InvariantViolation::InvalidTransition {
                sequence_number,
                from: request.status,
                to,
            });
        }
        Ok(request)
    }

    fn request_mut(
        &mut self,
        sequence_number: u64,
    ) -> Result<&mut WithdrawalRequest, InvariantViolation> {
        self.withdrawals
            .get_mut(&sequence_number)
            .ok_or(InvariantViolation::UnknownWithdrawal(sequence_number))
    }

    fn first_unresolved_before(&self, sequence_number: u64) -> Option<u64> {
        self.withdrawals
            .range(..sequence_number)
            .find(|(_, request)| request.status.is_unresolved())
            .map(|(n, _)| *n)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn helper_contract(&self) -> Address {
        self.helper_contract
    }

    pub fn last_scraped_block(&self) -> u64 {
        self.last_scraped_block
    }

    /// Nonce of the first withdrawal this ledger ever issued
    pub fn first_sequence_number(&self) -> u64 {
        self.first_sequence_number
    }

    pub fn next_sequence_number(&self) -> u64 {
        self.next_sequence_number
    }

    pub fn total_issued_requests(&self) -> u64 {
        self.next_sequence_number - self.first_sequence_number
    }

    pub fn balance_of(&self, identity: &HostIdentity) -> Wei {
        self.balances.get(identity).copied().unwrap_or(0)
    }

    pub fn is_classified(&self, source: &EventSource) -> bool {
        self.minted.contains_key(source) || self.invalid.contains_key(source)
    }

    pub fn invalid_deposits(&self) -> impl Iterator<Item = &InvalidDeposit> {
        self.invalid.values()
    }

    pub fn withdrawal(&self, sequence_number: u64) -> Option<&WithdrawalRequest> {
        self.withdrawals.get(&sequence_number)
    }

    pub fn withdrawals(&self) -> impl Iterator<Item = &WithdrawalRequest> {
        self.withdrawals.values()
    }

    /// Oldest unapproved or signed request; nothing behind it may advance
    pub fn next_unresolved(&self) -> Option<&WithdrawalRequest> {
        self.withdrawals
            .values()
            .find(|request| request.status.is_unresolved())
    }

    /// Requests waiting for finality, oldest first
    pub fn sent_requests(&self) -> Vec<WithdrawalRequest> {
        self.withdrawals
            .values()
            .filter(|request| request.status == WithdrawalStatus::Sent)
            .cloned()
            .collect()
    }

    /// Minted deposits with block in `[from, to]`, clamped to the scanned range
    pub fn minted_in_range(
        &self,
        from: u64,
        to: u64,
        source_address: Option<Address>,
    ) -> Vec<MintedDeposit> {
        let to = to.min(self.last_scraped_block);
        if from > to {
            return Vec::new();
        }

        let mut deposits: Vec<MintedDeposit> = self
            .minted
            .values()
            .filter(|d| d.block_number >= from && d.block_number <= to)
            .filter(|d| source_address.map_or(true, |a| d.event.source_address == a))
            .cloned()
            .collect();

        deposits.sort_by_key(|d| (d.block_number, d.source.log_index));
        deposits
    }

    pub fn conservation(&self) -> ConservationReport {
        let sum_of_balances = self
            .balances
            .values()
            .fold(0u128, |acc, b| acc.saturating_add(*b));

        let stuck_in_invalid = self
            .withdrawals
            .values()
            .filter(|r| r.status == WithdrawalStatus::Invalid)
            .fold(0u128, |acc, r| acc.saturating_add(r.amount));

        ConservationReport {
            total_credited: self.total_credited,
            total_debited: self.total_debited,
            sum_of_balances,
            holds: self.total_credited.checked_sub(self.total_debited) == Some(sum_of_balances),
            stuck_in_invalid,
        }
    }

    pub fn snapshot(&self) -> DebugSnapshot {
        let mut unapproved = Vec::new();
        let mut in_flight = Vec::new();
        let mut resolved = Vec::new();

        for request in self.withdrawals.values() {
            match request.status {
                WithdrawalStatus::Unapproved => unapproved.push(request.clone()),
                WithdrawalStatus::Signed | WithdrawalStatus::Sent => {
                    in_flight.push(request.clone())
                }
                WithdrawalStatus::Finalized | WithdrawalStatus::Invalid => {
                    resolved.push(request.clone())
                }
            }
        }

        DebugSnapshot {
            key_id: self.key_id.clone(),
            chain_id: self.chain_id,
            helper_contract: self.helper_contract,
            last_scraped_block: self.last_scraped_block,
            minted_sources: self.minted.keys().copied().collect(),
            invalid_deposits: self.invalid.values().cloned().collect(),
            total_issued_requests: self.total_issued_requests(),
            next_sequence_number: self.next_sequence_number,
            unapproved,
            in_flight,
            resolved,
            conservation: self.conservation(),
        }
    }
}

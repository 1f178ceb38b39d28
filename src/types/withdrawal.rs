//! Withdrawal Types
//!
//! Types for the withdrawal ("retrieve") request lifecycle:
//! unapproved → signed → sent → finalized, or signed → invalid.

use serde::{Deserialize, Serialize};

use super::address::Address;
use super::hash::Hash;
use super::identity::HostIdentity;
use super::units::Wei;
use crate::transaction::SignedTransaction;

/// Status of a withdrawal request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    /// Funds reserved, waiting for a signature
    Unapproved,
    /// Signed transaction stored, not yet accepted by the foreign chain
    Signed,
    /// Accepted by the foreign chain, waiting for finality
    Sent,
    /// Receipt observed in a finalized block
    Finalized,
    /// Definitively rejected; reserved funds await manual reconciliation
    Invalid,
}

impl WithdrawalStatus {
    /// Unapproved and signed requests block the requests behind them
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unapproved | Self::Signed)
    }
}

impl std::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unapproved => write!(f, "unapproved"),
            Self::Signed => write!(f, "signed"),
            Self::Sent => write!(f, "sent"),
            Self::Finalized => write!(f, "finalized"),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}

/// Outcome of a mined transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Success,
    Failure,
}

/// Receipt data kept once a withdrawal is finalized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedReceipt {
    pub block_number: u64,
    pub gas_used: u128,
    pub effective_gas_price: Wei,
    pub status: ReceiptStatus,
}

impl FinalizedReceipt {
    pub fn effective_transaction_fee(&self) -> Wei {
        self.gas_used.saturating_mul(self.effective_gas_price)
    }
}

/// Data fixed when a withdrawal is accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWithdrawal {
    pub sequence_number: u64,
    pub caller: HostIdentity,
    pub destination: Address,
    pub amount: Wei,
    pub created_at: u64,
}

/// A withdrawal request and everything known about it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub sequence_number: u64,
    pub caller: HostIdentity,
    pub destination: Address,
    pub amount: Wei,
    pub created_at: u64,
    pub status: WithdrawalStatus,
    /// Set once signed; never replaced afterwards
    pub transaction: Option<SignedTransaction>,
    pub receipt: Option<FinalizedReceipt>,
    /// Rejection reason if invalid
    pub failure: Option<String>,
}

impl WithdrawalRequest {
    pub fn new(accepted: NewWithdrawal) -> Self {
        Self {
            sequence_number: accepted.sequence_number,
            caller: accepted.caller,
            destination: accepted.destination,
            amount: accepted.amount,
            created_at: accepted.created_at,
            status: WithdrawalStatus::Unapproved,
            transaction: None,
            receipt: None,
            failure: None,
        }
    }

    pub fn transaction_hash(&self) -> Option<Hash> {
        self.transaction.as_ref().map(|tx| tx.hash)
    }

    /// Status as reported to callers
    pub fn retrieve_status(&self) -> RetrieveEthStatus {
        match (self.status, self.transaction_hash()) {
            (WithdrawalStatus::Sent | WithdrawalStatus::Finalized, Some(transaction_hash)) => {
                RetrieveEthStatus::Found { transaction_hash }
            }
            (WithdrawalStatus::Invalid, Some(transaction_hash)) => {
                RetrieveEthStatus::Invalid { transaction_hash }
            }
            _ => RetrieveEthStatus::PendingSigning,
        }
    }
}

/// Answer to `retrieve_eth_status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RetrieveEthStatus {
    NotFound,
    PendingSigning,
    Found { transaction_hash: Hash },
    Invalid { transaction_hash: Hash },
}

/// Returned to the caller of `withdraw`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    pub sequence_number: u64,
}

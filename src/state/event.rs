//! Audit Events
//!
//! Every mutation of the minter state is recorded as one of these events.
//! Replaying the log over the initial state reproduces the state exactly.

use serde::{Deserialize, Serialize};

use crate::transaction::SignedTransaction;
use crate::types::{FinalizedReceipt, InvalidDeposit, MintedDeposit, NewWithdrawal};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinterEvent {
    /// Deposit credited to its beneficiary
    AcceptedDeposit(MintedDeposit),

    /// Deposit log rejected, nothing credited
    InvalidDeposit(InvalidDeposit),

    /// Scan cursor moved to `block_number`
    SyncedToBlock { block_number: u64 },

    /// Withdrawal created and its amount debited
    AcceptedWithdrawal(NewWithdrawal),

    SignedTransaction {
        sequence_number: u64,
        transaction: SignedTransaction,
    },

    SentTransaction { sequence_number: u64 },

    FinalizedTransaction {
        sequence_number: u64,
        receipt: FinalizedReceipt,
    },

    /// Transaction definitively rejected by the foreign chain
    InvalidatedTransaction { sequence_number: u64, reason: String },
}

impl MinterEvent {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AcceptedDeposit(_) => "accepted_deposit",
            Self::InvalidDeposit(_) => "invalid_deposit",
            Self::SyncedToBlock { .. } => "synced_to_block",
            Self::AcceptedWithdrawal(_) => "accepted_withdrawal",
            Self::SignedTransaction { .. } => "signed_transaction",
            Self::SentTransaction { .. } => "sent_transaction",
            Self::FinalizedTransaction { .. } => "finalized_transaction",
            Self::InvalidatedTransaction { .. } => "invalidated_transaction",
        }
    }
}

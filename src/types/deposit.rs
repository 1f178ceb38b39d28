//! Deposit Types
//!
//! A deposit log observed on the foreign chain is classified exactly once:
//! either minted (credited to the beneficiary) or invalid.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::address::Address;
use super::hash::Hash;
use super::identity::HostIdentity;
use super::units::Wei;

/// Stable identifier of a deposit log: transaction hash plus log index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventSource {
    pub transaction_hash: Hash,
    pub log_index: u64,
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.transaction_hash, self.log_index)
    }
}

/// Parsed content of a `ReceivedEth` log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositEvent {
    pub source_address: Address,
    pub beneficiary: HostIdentity,
    pub amount: Wei,
}

/// A deposit that was credited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintedDeposit {
    pub source: EventSource,
    pub block_number: u64,
    pub event: DepositEvent,
}

/// Why a deposit log was not credited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidDepositReason {
    /// Log emitted by a contract other than the helper contract
    UnexpectedEmitter(Address),
    /// First topic is not the deposit event signature
    UnexpectedTopic,
    /// Wrong number of topics
    TopicCount(usize),
    /// Sender topic is not a left-padded address
    MalformedSender,
    /// Beneficiary topic does not decode
    MalformedBeneficiary(String),
    /// Data is not a single 32-byte word
    MalformedData(usize),
    /// Value does not fit in 128 bits
    ValueOverflow,
    /// Value is zero
    ZeroValue,
    /// Log was removed by a reorganization
    Removed,
    /// Log lies outside the block range that was requested
    OutOfRange(Option<u64>),
}

impl fmt::Display for InvalidDepositReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEmitter(address) => write!(f, "unexpected emitter {}", address),
            Self::UnexpectedTopic => write!(f, "unexpected event topic"),
            Self::TopicCount(n) => write!(f, "expected 3 topics, got {}", n),
            Self::MalformedSender => write!(f, "malformed sender topic"),
            Self::MalformedBeneficiary(e) => write!(f, "malformed beneficiary: {}", e),
            Self::MalformedData(len) => write!(f, "expected 32 data bytes, got {}", len),
            Self::ValueOverflow => write!(f, "value exceeds 128 bits"),
            Self::ZeroValue => write!(f, "zero value"),
            Self::Removed => write!(f, "log removed by reorganization"),
            Self::OutOfRange(Some(block)) => write!(f, "block {} outside requested range", block),
            Self::OutOfRange(None) => write!(f, "log has no block number"),
        }
    }
}

/// A deposit log that was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidDeposit {
    pub source: EventSource,
    pub block_number: Option<u64>,
    pub reason: InvalidDepositReason,
}

/// Result of classifying one log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositClassification {
    Minted(MintedDeposit),
    Invalid(InvalidDeposit),
}

impl DepositClassification {
    pub fn source(&self) -> &EventSource {
        match self {
            Self::Minted(deposit) => &deposit.source,
            Self::Invalid(deposit) => &deposit.source,
        }
    }
}

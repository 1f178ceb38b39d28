//! Normalized JSON-RPC Response Types
//!
//! Nodes answer with hex strings everywhere. Responses are decoded into
//! `Raw*` structs first and then converted into typed values; any malformed
//! quantity, hash or address makes the whole response malformed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::hash::decode_fixed;
use crate::types::{Address, Hash, ReceiptStatus, Wei};

/// Block selector for `eth_getBlockByNumber`, `eth_feeHistory`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Safe,
    Finalized,
    Pending,
    Number(u64),
}

impl BlockTag {
    pub fn to_param(&self) -> Value {
        match self {
            Self::Latest => Value::from("latest"),
            Self::Safe => Value::from("safe"),
            Self::Finalized => Value::from("finalized"),
            Self::Pending => Value::from("pending"),
            Self::Number(n) => Value::from(format!("{:#x}", n)),
        }
    }
}

/// Filter for `eth_getLogs`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetLogsParam {
    pub from_block: u64,
    pub to_block: u64,
    pub address: Address,
    pub topic0: [u8; 32],
}

impl GetLogsParam {
    pub fn to_param(&self) -> Value {
        serde_json::json!({
            "fromBlock": format!("{:#x}", self.from_block),
            "toBlock": format!("{:#x}", self.to_block),
            "address": [format!("0x{}", hex::encode(self.address.as_bytes()))],
            "topics": [format!("0x{}", hex::encode(self.topic0))],
        })
    }
}

/// One log entry
///
/// Identifiers are optional because pending logs carry none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<[u8; 32]>,
    pub data: Vec<u8>,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<Hash>,
    pub log_index: Option<u64>,
    pub removed: bool,
}

/// Block header fields the minter uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    pub base_fee_per_gas: Option<Wei>,
}

/// Answer to `eth_feeHistory`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeHistory {
    pub oldest_block: u64,
    /// One entry per block plus the next one
    pub base_fee_per_gas: Vec<Wei>,
    /// One row per block, one column per requested percentile
    pub reward: Vec<Vec<Wei>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: Hash,
    pub block_number: u64,
    pub gas_used: u128,
    pub effective_gas_price: Wei,
    pub status: ReceiptStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionInfo {
    pub hash: Hash,
    pub nonce: u64,
    pub from: Address,
    pub to: Option<Address>,
    pub value: Wei,
    /// `None` while pending
    pub block_number: Option<u64>,
}

/// Reconciled answer of `eth_sendRawTransaction`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum SendRawTransactionResult {
    Ok,
    AlreadyKnown,
    NonceTooLow,
    NonceTooHigh,
    InsufficientFunds,
    /// Nothing definitive; send the same bytes again later
    Retryable(String),
    /// Definitively refused
    Rejected(String),
}

impl SendRawTransactionResult {
    /// Reconcile the error message of a `-32000` style answer
    pub fn from_error_message(message: &str) -> Option<Self> {
        let lower = message.to_lowercase();

        if lower.contains("already known") || lower.contains("known transaction") {
            Some(Self::AlreadyKnown)
        } else if lower.contains("nonce too low") || lower.contains("nonce is too low") {
            Some(Self::NonceTooLow)
        } else if lower.contains("nonce too high") || lower.contains("nonce gap") {
            Some(Self::NonceTooHigh)
        } else if lower.contains("insufficient funds") {
            Some(Self::InsufficientFunds)
        } else {
            None
        }
    }
}

// =============================================================================
// Raw wire shapes
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawLogEntry {
    address: String,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    data: String,
    block_number: Option<String>,
    transaction_hash: Option<String>,
    log_index: Option<String>,
    #[serde(default)]
    removed: bool,
}

impl TryFrom<RawLogEntry> for LogEntry {
    type Error = String;

    fn try_from(raw: RawLogEntry) -> Result<Self, Self::Error> {
        let topics = raw
            .topics
            .iter()
            .map(|t| decode_fixed::<32>(t))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            address: parse_address(&raw.address)?,
            topics,
            data: parse_bytes(&raw.data)?,
            block_number: raw.block_number.as_deref().map(parse_u64).transpose()?,
            transaction_hash: raw
                .transaction_hash
                .as_deref()
                .map(str::parse::<Hash>)
                .transpose()?,
            log_index: raw.log_index.as_deref().map(parse_u64).transpose()?,
            removed: raw.removed,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawBlockHeader {
    number: String,
    base_fee_per_gas: Option<String>,
}

impl TryFrom<RawBlockHeader> for BlockHeader {
    type Error = String;

    fn try_from(raw: RawBlockHeader) -> Result<Self, Self::Error> {
        Ok(Self {
            number: parse_u64(&raw.number)?,
            base_fee_per_gas: raw.base_fee_per_gas.as_deref().map(parse_quantity).transpose()?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawFeeHistory {
    oldest_block: String,
    #[serde(default)]
    base_fee_per_gas: Vec<String>,
    #[serde(default)]
    reward: Vec<Vec<String>>,
}

impl TryFrom<RawFeeHistory> for FeeHistory {
    type Error = String;

    fn try_from(raw: RawFeeHistory) -> Result<Self, Self::Error> {
        let base_fee_per_gas = raw
            .base_fee_per_gas
            .iter()
            .map(|v| parse_quantity(v))
            .collect::<Result<Vec<_>, _>>()?;

        let reward = raw
            .reward
            .iter()
            .map(|row| row.iter().map(|v| parse_quantity(v)).collect::<Result<Vec<_>, _>>())
            .collect::<Result<Vec<Vec<_>>, _>>()?;

        Ok(Self {
            oldest_block: parse_u64(&raw.oldest_block)?,
            base_fee_per_gas,
            reward,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawTransactionReceipt {
    transaction_hash: String,
    block_number: Option<String>,
    gas_used: String,
    effective_gas_price: String,
    status: Option<String>,
}

impl TryFrom<RawTransactionReceipt> for TransactionReceipt {
    type Error = String;

    fn try_from(raw: RawTransactionReceipt) -> Result<Self, Self::Error> {
        let block_number = raw
            .block_number
            .as_deref()
            .ok_or_else(|| "receipt without block number".to_string())?;

        let status = match raw.status.as_deref().map(parse_u64).transpose()? {
            Some(1) => ReceiptStatus::Success,
            Some(0) => ReceiptStatus::Failure,
            other => return Err(format!("unexpected receipt status {:?}", other)),
        };

        Ok(Self {
            transaction_hash: raw.transaction_hash.parse()?,
            block_number: parse_u64(block_number)?,
            gas_used: parse_quantity(&raw.gas_used)?,
            effective_gas_price: parse_quantity(&raw.effective_gas_price)?,
            status,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawTransactionInfo {
    hash: String,
    nonce: String,
    from: String,
    to: Option<String>,
    value: String,
    block_number: Option<String>,
}

impl TryFrom<RawTransactionInfo> for TransactionInfo {
    type Error = String;

    fn try_from(raw: RawTransactionInfo) -> Result<Self, Self::Error> {
        Ok(Self {
            hash: raw.hash.parse()?,
            nonce: parse_u64(&raw.nonce)?,
            from: parse_address(&raw.from)?,
            to: raw.to.as_deref().map(parse_address).transpose()?,
            value: parse_quantity(&raw.value)?,
            block_number: raw.block_number.as_deref().map(parse_u64).transpose()?,
        })
    }
}

// =============================================================================
// Hex helpers
// =============================================================================

/// Parse a hex quantity (`0x`-prefixed, no leading zeros required)
pub fn parse_quantity(s: &str) -> Result<u128, String> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| format!("quantity without 0x prefix: {}", s))?;

    if digits.is_empty() {
        return Err("empty quantity".to_string());
    }

    u128::from_str_radix(digits, 16).map_err(|e| format!("invalid quantity {}: {}", s, e))
}

pub fn parse_u64(s: &str) -> Result<u64, String> {
    let value = parse_quantity(s)?;
    u64::try_from(value).map_err(|_| format!("quantity {} exceeds 64 bits", s))
}

fn parse_bytes(s: &str) -> Result<Vec<u8>, String> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| format!("data without 0x prefix: {}", s))?;
    hex::decode(digits).map_err(|e| format!("invalid data: {}", e))
}

/// Node-reported addresses are not required to be checksummed
fn parse_address(s: &str) -> Result<Address, String> {
    decode_fixed::<20>(&s.to_lowercase()).map(Address::new)
}

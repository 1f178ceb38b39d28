//! Deposit Log Parser
//!
//! Turns `ReceivedEth(address indexed from, uint256 value, bytes32 indexed
//! principal)` logs emitted by the helper contract into deposit
//! classifications.

use crate::rpc::LogEntry;
use crate::types::{
    keccak256, Address, DepositClassification, DepositEvent, EventSource, HostIdentity,
    InvalidDeposit, InvalidDepositReason, MintedDeposit,
};

/// Solidity signature of the deposit event
pub const DEPOSIT_EVENT_SIGNATURE: &str = "ReceivedEth(address,uint256,bytes32)";

/// Topic 0 of every deposit log
pub fn deposit_event_topic() -> [u8; 32] {
    keccak256(DEPOSIT_EVENT_SIGNATURE.as_bytes())
}

/// Classify one log returned for the block range `[from_block, to_block]`
///
/// Returns `None` when the log carries no transaction hash or log index:
/// such a log has no stable source to record and is skipped.
pub fn classify_log(
    log: &LogEntry,
    helper_contract: &Address,
    from_block: u64,
    to_block: u64,
) -> Option<DepositClassification> {
    let source = EventSource {
        transaction_hash: log.transaction_hash?,
        log_index: log.log_index?,
    };

    let classification = match parse_deposit(log, helper_contract, from_block, to_block) {
        Ok((block_number, event)) => DepositClassification::Minted(MintedDeposit {
            source,
            block_number,
            event,
        }),
        Err(reason) => DepositClassification::Invalid(InvalidDeposit {
            source,
            block_number: log.block_number,
            reason,
        }),
    };

    Some(classification)
}

fn parse_deposit(
    log: &LogEntry,
    helper_contract: &Address,
    from_block: u64,
    to_block: u64,
) -> Result<(u64, DepositEvent), InvalidDepositReason> {
    if log.removed {
        return Err(InvalidDepositReason::Removed);
    }

    let block_number = match log.block_number {
        Some(n) if (from_block..=to_block).contains(&n) => n,
        other => return Err(InvalidDepositReason::OutOfRange(other)),
    };

    if log.address != *helper_contract {
        return Err(InvalidDepositReason::UnexpectedEmitter(log.address));
    }

    if log.topics.first() != Some(&deposit_event_topic()) {
        return Err(InvalidDepositReason::UnexpectedTopic);
    }

    if log.topics.len() != 3 {
        return Err(InvalidDepositReason::TopicCount(log.topics.len()));
    }

    let source_address =
        Address::from_topic(&log.topics[1]).map_err(|_| InvalidDepositReason::MalformedSender)?;

    let beneficiary = HostIdentity::from_topic(&log.topics[2])
        .map_err(|e| InvalidDepositReason::MalformedBeneficiary(e.to_string()))?;

    let amount = parse_value(&log.data)?;

    Ok((
        block_number,
        DepositEvent {
            source_address,
            beneficiary,
            amount,
        },
    ))
}

/// Decode the 32-byte big-endian `uint256` value
fn parse_value(data: &[u8]) -> Result<u128, InvalidDepositReason> {
    if data.len() != 32 {
        return Err(InvalidDepositReason::MalformedData(data.len()));
    }

    let (high, low) = data.split_at(16);
    if high.iter().any(|b| *b != 0) {
        return Err(InvalidDepositReason::ValueOverflow);
    }

    let mut word = [0u8; 16];
    word.copy_from_slice(low);
    let amount = u128::from_be_bytes(word);

    if amount == 0 {
        return Err(InvalidDepositReason::ZeroValue);
    }

    Ok(amount)
}

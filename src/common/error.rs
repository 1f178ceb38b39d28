//! Common Error Types for the ETH Minter
//!
//! Module errors converge here. Four families matter to callers:
//! validation errors surface to the API, infrastructure errors (RPC, signing,
//! fees, storage) are retried by the driver, terminal transaction errors only
//! show up in the debug snapshot, and invariant violations abort the unit of
//! work.

use thiserror::Error;

use crate::fees::FeeError;
use crate::rpc::RpcError;
use crate::signing::SigningError;
use crate::state::{InvariantViolation, StateError};
use crate::storage::StorageError;
use crate::types::Wei;

/// Caller mistakes, reported back unchanged
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("insufficient funds: balance {balance} wei, requested {requested} wei")]
    InsufficientFunds { balance: Wei, requested: Wei },

    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    #[error("amount too low: minimum {minimum} wei, requested {requested} wei")]
    AmountTooLow { minimum: Wei, requested: Wei },

    /// The amount would not pay for its own transaction
    #[error("amount below fee: maximum fee {max_fee} wei, requested {requested} wei")]
    AmountBelowFee { max_fee: Wei, requested: Wei },

    /// Nonces from the first sequence number on belong to withdrawals
    #[error("nonce {nonce} is reserved for withdrawals (first sequence number {first_sequence_number})")]
    ReservedNonce { nonce: u64, first_sequence_number: u64 },

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ValidationError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            ValidationError::InvalidDestination(_) => "INVALID_DESTINATION",
            ValidationError::AmountTooLow { .. } => "AMOUNT_TOO_LOW",
            ValidationError::AmountBelowFee { .. } => "AMOUNT_BELOW_FEE",
            ValidationError::ReservedNonce { .. } => "RESERVED_NONCE",
            ValidationError::InvalidIdentity(_) => "INVALID_IDENTITY",
            ValidationError::InvalidRange(_) => "INVALID_RANGE",
            ValidationError::InvalidParameter(_) => "INVALID_PARAMETER",
        }
    }
}

/// Root error type for the minter
#[derive(Debug, Error)]
pub enum MinterError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),

    #[error("signing error: {0}")]
    Signing(#[from] SigningError),

    #[error("fee error: {0}")]
    Fee(#[from] FeeError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    /// Logging errors
    #[error("logging error: {0}")]
    Logging(#[from] super::logging::LoggingError),

    /// A signed transaction was definitively rejected by the network
    #[error("withdrawal {sequence_number} failed terminally: {reason}")]
    TerminalTransaction { sequence_number: u64, reason: String },

    #[error("invariant violation: {0}")]
    InvariantViolation(#[from] InvariantViolation),

    /// Operation switched off by configuration
    #[error("operation disabled: {0}")]
    Disabled(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StateError> for MinterError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::Invariant(violation) => MinterError::InvariantViolation(violation),
            StateError::Storage(storage) => MinterError::Storage(storage),
        }
    }
}

impl MinterError {
    /// Create a validation error for a bad parameter
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::Validation(ValidationError::InvalidParameter(msg.into()))
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, MinterError::Validation(_))
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        match self {
            MinterError::Rpc(e) => e.is_retryable(),
            MinterError::Signing(e) => e.is_retryable(),
            MinterError::Fee(_) | MinterError::Storage(_) => true,
            _ => false,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            MinterError::Validation(e) => e.error_code(),
            MinterError::Rpc(_) => "RPC_ERROR",
            MinterError::Signing(_) => "SIGNING_ERROR",
            MinterError::Fee(_) => "FEE_ERROR",
            MinterError::Storage(_) => "STORAGE_ERROR",
            MinterError::Config(_) => "CONFIG_ERROR",
            MinterError::Logging(_) => "LOGGING_ERROR",
            MinterError::TerminalTransaction { .. } => "TERMINAL_TRANSACTION",
            MinterError::InvariantViolation(_) => "INVARIANT_VIOLATION",
            MinterError::Disabled(_) => "DISABLED",
            MinterError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Result type alias using MinterError
pub type Result<T> = std::result::Result<T, MinterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = MinterError::from(ValidationError::InsufficientFunds {
            balance: 5,
            requested: 10,
        });
        assert!(err.to_string().contains("balance 5 wei"));
        assert_eq!(err.error_code(), "INSUFFICIENT_FUNDS");
        assert!(err.is_validation());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(MinterError::from(RpcError::Transport {
            method: "eth_blockNumber".to_string(),
            reason: "timeout".to_string(),
        })
        .is_retryable());
        assert!(MinterError::from(SigningError::Unavailable("down".to_string())).is_retryable());
        assert!(MinterError::from(FeeError::PriceUnavailable("empty".to_string())).is_retryable());
        assert!(!MinterError::invalid_parameter("bad").is_retryable());
        assert!(!MinterError::TerminalTransaction {
            sequence_number: 0,
            reason: "rejected".to_string(),
        }
        .is_retryable());
    }

    #[test]
    fn test_terminal_rpc_code_is_not_retryable() {
        let err = MinterError::from(RpcError::Rpc {
            method: "eth_getLogs".to_string(),
            code: -32602,
            message: "invalid params".to_string(),
        });
        assert!(!err.is_retryable());
        assert_eq!(err.error_code(), "RPC_ERROR");
    }

    #[test]
    fn test_state_error_conversion() {
        let err = MinterError::from(StateError::Invariant(InvariantViolation::UnknownWithdrawal(7)));
        assert_eq!(err.error_code(), "INVARIANT_VIOLATION");

        let err = MinterError::from(StateError::Storage(StorageError::Database("locked".into())));
        assert!(err.is_retryable());
    }
}

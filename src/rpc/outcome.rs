//! JSON-RPC Outcomes and Error Classification
//!
//! Every call to the foreign chain ends in exactly one of three shapes: a
//! result, a JSON-RPC error object, or a transport failure. Error objects are
//! classified by code through a fixed table.

use serde::{Deserialize, Serialize};

/// Normalized answer of a JSON-RPC call
#[derive(Debug, Clone, PartialEq)]
pub enum RpcOutcome<T> {
    Result(T),
    Error { code: i64, message: String },
    TransportFailure(String),
}

impl<T> RpcOutcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RpcOutcome<U> {
        match self {
            Self::Result(value) => RpcOutcome::Result(f(value)),
            Self::Error { code, message } => RpcOutcome::Error { code, message },
            Self::TransportFailure(reason) => RpcOutcome::TransportFailure(reason),
        }
    }

    pub fn into_result(self, method: &str) -> Result<T, RpcError> {
        match self {
            Self::Result(value) => Ok(value),
            Self::Error { code, message } => Err(RpcError::Rpc {
                method: method.to_string(),
                code,
                message,
            }),
            Self::TransportFailure(reason) => Err(RpcError::Transport {
                method: method.to_string(),
                reason,
            }),
        }
    }
}

/// Whether a failed call may be retried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Try again on a later cycle, nothing changes
    Retryable,
    /// The request itself is wrong; retrying cannot help
    Terminal,
}

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const SERVER_ERROR: i64 = -32000;
pub const RESOURCE_NOT_FOUND: i64 = -32001;
pub const RESOURCE_UNAVAILABLE: i64 = -32002;
pub const TRANSACTION_REJECTED: i64 = -32003;
pub const METHOD_NOT_SUPPORTED: i64 = -32004;
pub const LIMIT_EXCEEDED: i64 = -32005;
pub const VERSION_NOT_SUPPORTED: i64 = -32006;

/// Classification table for JSON-RPC error codes
///
/// Unknown codes are retryable: a retry never changes state.
pub fn classify_error_code(code: i64) -> ErrorClass {
    match code {
        PARSE_ERROR | INVALID_REQUEST | METHOD_NOT_FOUND | INVALID_PARAMS => ErrorClass::Terminal,
        TRANSACTION_REJECTED | METHOD_NOT_SUPPORTED | VERSION_NOT_SUPPORTED => {
            ErrorClass::Terminal
        }
        INTERNAL_ERROR | SERVER_ERROR | RESOURCE_NOT_FOUND | RESOURCE_UNAVAILABLE
        | LIMIT_EXCEEDED => ErrorClass::Retryable,
        _ => ErrorClass::Retryable,
    }
}

/// RPC layer errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RpcError {
    #[error("{method}: transport failure: {reason}")]
    Transport { method: String, reason: String },

    #[error("{method}: JSON-RPC error {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("{method}: malformed response: {reason}")]
    Malformed { method: String, reason: String },
}

impl RpcError {
    pub fn malformed(method: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Transport { .. } | Self::Malformed { .. } => ErrorClass::Retryable,
            Self::Rpc { code, .. } => classify_error_code(*code),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }

    /// Provider refused because the response would be too large
    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, Self::Rpc { code, .. } if *code == LIMIT_EXCEEDED)
    }
}

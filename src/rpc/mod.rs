//! Foreign-chain RPC Module
//!
//! Transport, response normalization and error classification for the
//! Ethereum JSON-RPC endpoint.

pub mod client;
pub mod outcome;
pub mod transport;
pub mod types;

pub use client::EthRpcClient;
pub use outcome::{classify_error_code, ErrorClass, RpcError, RpcOutcome};
pub use transport::{HttpTransport, RpcTransport};
pub use types::{
    BlockHeader, BlockTag, FeeHistory, GetLogsParam, LogEntry, SendRawTransactionResult,
    TransactionInfo, TransactionReceipt,
};

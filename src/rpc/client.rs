//! Typed Ethereum JSON-RPC Client
//!
//! Wraps an [`RpcTransport`] and turns raw JSON into the normalized types of
//! [`super::types`]. Only the methods the minter needs are implemented.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;

use super::outcome::{classify_error_code, ErrorClass, RpcError, RpcOutcome};
use super::transport::RpcTransport;
use super::types::{
    parse_u64, BlockHeader, BlockTag, FeeHistory, GetLogsParam, LogEntry, RawBlockHeader,
    RawFeeHistory, RawLogEntry, RawTransactionInfo, RawTransactionReceipt,
    SendRawTransactionResult, TransactionInfo, TransactionReceipt,
};
use crate::types::{Address, Hash};

/// Ethereum JSON-RPC client over a single endpoint
#[derive(Clone)]
pub struct EthRpcClient {
    transport: Arc<dyn RpcTransport>,
}

impl EthRpcClient {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self { transport }
    }

    /// Issue a call and decode the result
    async fn request<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R, RpcError> {
        tracing::debug!(method, "JSON-RPC call");

        let value = self
            .transport
            .call(method, params)
            .await
            .into_result(method)?;

        serde_json::from_value(value).map_err(|e| RpcError::malformed(method, e.to_string()))
    }

    /// Issue a call, decode the raw shape and normalize it
    async fn request_converted<Raw, T>(&self, method: &str, params: Value) -> Result<T, RpcError>
    where
        Raw: DeserializeOwned,
        T: TryFrom<Raw, Error = String>,
    {
        let raw: Raw = self.request(method, params).await?;
        T::try_from(raw).map_err(|e| RpcError::malformed(method, e))
    }

    pub async fn block_number(&self) -> Result<u64, RpcError> {
        let raw: String = self.request("eth_blockNumber", json!([])).await?;
        parse_u64(&raw).map_err(|e| RpcError::malformed("eth_blockNumber", e))
    }

    pub async fn get_block_by_number(&self, block: BlockTag) -> Result<BlockHeader, RpcError> {
        let method = "eth_getBlockByNumber";
        let raw: Option<RawBlockHeader> = self
            .request(method, json!([block.to_param(), false]))
            .await?;

        let raw = raw.ok_or_else(|| RpcError::malformed(method, "block not found"))?;
        BlockHeader::try_from(raw).map_err(|e| RpcError::malformed(method, e))
    }

    pub async fn get_logs(&self, filter: &GetLogsParam) -> Result<Vec<LogEntry>, RpcError> {
        let method = "eth_getLogs";
        let raw: Vec<RawLogEntry> = self.request(method, json!([filter.to_param()])).await?;

        raw.into_iter()
            .map(|log| LogEntry::try_from(log).map_err(|e| RpcError::malformed(method, e)))
            .collect()
    }

    pub async fn fee_history(
        &self,
        block_count: u64,
        newest_block: BlockTag,
        reward_percentiles: &[f64],
    ) -> Result<FeeHistory, RpcError> {
        self.request_converted::<RawFeeHistory, _>(
            "eth_feeHistory",
            json!([
                format!("{:#x}", block_count),
                newest_block.to_param(),
                reward_percentiles
            ]),
        )
        .await
    }

    /// Submit a signed transaction
    ///
    /// Never fails: every answer is reconciled into a
    /// [`SendRawTransactionResult`].
    pub async fn send_raw_transaction(&self, raw_transaction: &str) -> SendRawTransactionResult {
        let method = "eth_sendRawTransaction";
        let outcome = self.transport.call(method, json!([raw_transaction])).await;
        let result = reconcile_send_outcome(outcome);

        tracing::debug!(method, result = ?result, "send outcome");
        result
    }

    pub async fn get_transaction_by_hash(
        &self,
        hash: &Hash,
    ) -> Result<Option<TransactionInfo>, RpcError> {
        let method = "eth_getTransactionByHash";
        let raw: Option<RawTransactionInfo> =
            self.request(method, json!([hash.to_string()])).await?;

        raw.map(TransactionInfo::try_from)
            .transpose()
            .map_err(|e| RpcError::malformed(method, e))
    }

    pub async fn get_transaction_receipt(
        &self,
        hash: &Hash,
    ) -> Result<Option<TransactionReceipt>, RpcError> {
        let method = "eth_getTransactionReceipt";
        let raw: Option<RawTransactionReceipt> =
            self.request(method, json!([hash.to_string()])).await?;

        raw.map(TransactionReceipt::try_from)
            .transpose()
            .map_err(|e| RpcError::malformed(method, e))
    }

    pub async fn get_transaction_count(
        &self,
        address: &Address,
        block: BlockTag,
    ) -> Result<u64, RpcError> {
        let method = "eth_getTransactionCount";
        let raw: String = self
            .request(
                method,
                json!([format!("0x{}", hex::encode(address.as_bytes())), block.to_param()]),
            )
            .await?;

        parse_u64(&raw).map_err(|e| RpcError::malformed(method, e))
    }
}

/// Map a send answer onto the reconciliation table
pub fn reconcile_send_outcome(outcome: RpcOutcome<Value>) -> SendRawTransactionResult {
    match outcome {
        RpcOutcome::Result(_) => SendRawTransactionResult::Ok,
        RpcOutcome::TransportFailure(reason) => SendRawTransactionResult::Retryable(reason),
        RpcOutcome::Error { code, message } => {
            if let Some(known) = SendRawTransactionResult::from_error_message(&message) {
                return known;
            }
            match classify_error_code(code) {
                ErrorClass::Retryable => {
                    SendRawTransactionResult::Retryable(format!("{}: {}", code, message))
                }
                ErrorClass::Terminal => {
                    SendRawTransactionResult::Rejected(format!("{}: {}", code, message))
                }
            }
        }
    }
}

//! Fee Estimator
//!
//! Prices withdrawal transactions from `eth_feeHistory` data anchored at the
//! last finalized block. Nothing is cached: each call fetches a fresh
//! history.

use crate::rpc::{BlockTag, EthRpcClient, FeeHistory, RpcError};
use crate::types::{
    Eip1559FeeSnapshot, Eip2930FeeSnapshot, FeeMarket, FeeSnapshot, Wei, TRANSFER_GAS_LIMIT,
    WEI_PER_GWEI,
};

/// Fee estimation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum FeeError {
    #[error("fee history unavailable: {0}")]
    Rpc(#[from] RpcError),

    #[error("price unavailable: {0}")]
    PriceUnavailable(String),

    /// The network price is above what the minter is willing to pay
    #[error("fee per gas {fee_per_gas} wei above cap {cap} wei")]
    AboveCap { fee_per_gas: Wei, cap: Wei },

    /// The amount would not even pay for the transaction
    #[error("maximum fee {max_fee} wei exceeds amount {amount} wei")]
    FeeExceedsAmount { max_fee: Wei, amount: Wei },
}

impl FeeError {
    fn unavailable(msg: impl Into<String>) -> Self {
        Self::PriceUnavailable(msg.into())
    }
}

/// Tunable fee parameters
#[derive(Debug, Clone, PartialEq)]
pub struct FeeEstimatorConfig {
    /// Number of blocks requested from `eth_feeHistory`
    pub history_block_count: u64,
    /// Reward percentile requested per block
    pub reward_percentile: f64,
    /// Percentile of effective gas prices used for the flat gas price
    pub gas_price_percentile: f64,
    pub min_priority_fee: Wei,
    pub max_fee_multiplier: u128,
    /// Highest max fee (or gas price) per gas ever signed
    pub max_fee_per_gas_cap: Wei,
    pub gas_limit: u64,
}

impl FeeEstimatorConfig {
    /// Most a withdrawal transaction can cost under the cap
    pub fn max_transaction_fee_bound(&self) -> Option<Wei> {
        self.max_fee_per_gas_cap.checked_mul(self.gas_limit as Wei)
    }
}

impl Default for FeeEstimatorConfig {
    fn default() -> Self {
        Self {
            history_block_count: 5,
            reward_percentile: 20.0,
            gas_price_percentile: 50.0,
            min_priority_fee: 1_500_000_000,
            max_fee_multiplier: 2,
            max_fee_per_gas_cap: 100 * WEI_PER_GWEI,
            gas_limit: TRANSFER_GAS_LIMIT,
        }
    }
}

/// Computes fee snapshots for both fee markets
#[derive(Clone)]
pub struct FeeEstimator {
    client: EthRpcClient,
    config: FeeEstimatorConfig,
}

impl FeeEstimator {
    pub fn new(client: EthRpcClient, config: FeeEstimatorConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &FeeEstimatorConfig {
        &self.config
    }

    async fn history(&self) -> Result<FeeHistory, FeeError> {
        let history = self
            .client
            .fee_history(
                self.config.history_block_count,
                BlockTag::Finalized,
                &[self.config.reward_percentile],
            )
            .await?;
        Ok(history)
    }

    pub async fn eip_1559_transaction_price(&self) -> Result<Eip1559FeeSnapshot, FeeError> {
        let history = self.history().await?;
        let snapshot = estimate_eip1559(&history, &self.config)?;

        tracing::debug!(
            base_fee = %snapshot.base_fee_last_finalized,
            max_fee = %snapshot.max_fee,
            priority_fee = %snapshot.priority_fee,
            "EIP-1559 price"
        );
        Ok(snapshot)
    }

    pub async fn eip_2930_transaction_price(&self) -> Result<Eip2930FeeSnapshot, FeeError> {
        let history = self.history().await?;
        let snapshot = estimate_eip2930(&history, &self.config)?;

        tracing::debug!(gas_price = %snapshot.gas_price, "EIP-2930 price");
        Ok(snapshot)
    }

    /// Snapshot for the given market
    pub async fn estimate(&self, market: FeeMarket) -> Result<FeeSnapshot, FeeError> {
        match market {
            FeeMarket::Eip1559 => self.eip_1559_transaction_price().await.map(FeeSnapshot::Eip1559),
            FeeMarket::Eip2930 => self.eip_2930_transaction_price().await.map(FeeSnapshot::Eip2930),
        }
    }
}

/// Protocol bound for the next base fee: at most 12.5% higher, rounded up
pub fn next_base_fee(base_fee: Wei) -> Option<Wei> {
    base_fee.checked_mul(9)?.checked_add(7).map(|v| v / 8)
}

/// Base fee of the newest block in the history
///
/// The node appends the base fee of the block after the newest one, so the
/// newest block is the second to last entry.
fn newest_base_fee(history: &FeeHistory) -> Result<Wei, FeeError> {
    let len = history.base_fee_per_gas.len();
    if len < 2 {
        return Err(FeeError::unavailable(format!(
            "expected at least 2 base fees, got {}",
            len
        )));
    }
    Ok(history.base_fee_per_gas[len - 2])
}

/// First reward column of every block
fn rewards(history: &FeeHistory) -> Result<Vec<Wei>, FeeError> {
    if history.reward.is_empty() {
        return Err(FeeError::unavailable("no reward data"));
    }

    history
        .reward
        .iter()
        .map(|row| {
            row.first()
                .copied()
                .ok_or_else(|| FeeError::unavailable("empty reward row"))
        })
        .collect()
}

fn median(values: &[Wei]) -> Wei {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    sorted[sorted.len() / 2]
}

/// Nearest-rank percentile of a non-empty slice
fn percentile(values: &[Wei], p: f64) -> Wei {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let rank = ((p.clamp(0.0, 100.0) / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

fn check_cap(fee_per_gas: Wei, config: &FeeEstimatorConfig) -> Result<(), FeeError> {
    if fee_per_gas > config.max_fee_per_gas_cap {
        return Err(FeeError::AboveCap {
            fee_per_gas,
            cap: config.max_fee_per_gas_cap,
        });
    }
    Ok(())
}

pub fn estimate_eip1559(
    history: &FeeHistory,
    config: &FeeEstimatorConfig,
) -> Result<Eip1559FeeSnapshot, FeeError> {
    let base_fee_last_finalized = newest_base_fee(history)?;
    let base_fee_next_estimate = next_base_fee(base_fee_last_finalized)
        .ok_or_else(|| FeeError::unavailable("base fee overflow"))?;

    let priority_fee = median(&rewards(history)?).max(config.min_priority_fee);

    let max_fee = base_fee_next_estimate
        .checked_mul(config.max_fee_multiplier)
        .and_then(|v| v.checked_add(priority_fee))
        .ok_or_else(|| FeeError::unavailable("max fee overflow"))?;
    check_cap(max_fee, config)?;

    Ok(Eip1559FeeSnapshot {
        base_fee_last_finalized,
        base_fee_next_estimate,
        priority_fee,
        max_fee,
        gas_limit: config.gas_limit,
    })
}

pub fn estimate_eip2930(
    history: &FeeHistory,
    config: &FeeEstimatorConfig,
) -> Result<Eip2930FeeSnapshot, FeeError> {
    let rewards = rewards(history)?;
    if history.base_fee_per_gas.len() < rewards.len() {
        return Err(FeeError::unavailable("fewer base fees than reward rows"));
    }

    let effective = history
        .base_fee_per_gas
        .iter()
        .zip(rewards.iter())
        .map(|(base, reward)| base.checked_add(*reward))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| FeeError::unavailable("gas price overflow"))?;

    let floor = next_base_fee(newest_base_fee(history)?)
        .and_then(|v| v.checked_add(config.min_priority_fee))
        .ok_or_else(|| FeeError::unavailable("gas price overflow"))?;

    let gas_price = percentile(&effective, config.gas_price_percentile).max(floor);
    check_cap(gas_price, config)?;

    Ok(Eip2930FeeSnapshot {
        gas_price,
        gas_limit: config.gas_limit,
    })
}

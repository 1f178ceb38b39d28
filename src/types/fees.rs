//! Fee Snapshot Types
//!
//! Fee parameters for the two supported fee markets. Snapshots are computed
//! fresh for every call and never cached.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::units::Wei;

/// Gas needed by a plain value transfer
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Fee market used to price withdrawal transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeMarket {
    /// Base fee + priority fee (type-2 transactions)
    Eip1559,
    /// Flat gas price (type-1 transactions)
    Eip2930,
}

impl Default for FeeMarket {
    fn default() -> Self {
        Self::Eip1559
    }
}

impl fmt::Display for FeeMarket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eip1559 => write!(f, "eip1559"),
            Self::Eip2930 => write!(f, "eip2930"),
        }
    }
}

impl FromStr for FeeMarket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "eip1559" | "eip-1559" | "1559" => Ok(Self::Eip1559),
            "eip2930" | "eip-2930" | "2930" | "legacy" => Ok(Self::Eip2930),
            _ => Err(format!("unknown fee market: {}", s)),
        }
    }
}

/// EIP-1559 fee parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip1559FeeSnapshot {
    pub base_fee_last_finalized: Wei,
    pub base_fee_next_estimate: Wei,
    pub priority_fee: Wei,
    pub max_fee: Wei,
    pub gas_limit: u64,
}

impl Eip1559FeeSnapshot {
    /// Upper bound on what the transaction can cost
    pub fn max_transaction_fee(&self) -> Option<Wei> {
        self.max_fee.checked_mul(self.gas_limit as Wei)
    }
}

/// EIP-2930 (flat gas price) fee parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip2930FeeSnapshot {
    pub gas_price: Wei,
    pub gas_limit: u64,
}

impl Eip2930FeeSnapshot {
    pub fn max_transaction_fee(&self) -> Option<Wei> {
        self.gas_price.checked_mul(self.gas_limit as Wei)
    }
}

/// Fee parameters for either market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeSnapshot {
    Eip1559(Eip1559FeeSnapshot),
    Eip2930(Eip2930FeeSnapshot),
}

impl FeeSnapshot {
    pub fn max_transaction_fee(&self) -> Option<Wei> {
        match self {
            Self::Eip1559(fee) => fee.max_transaction_fee(),
            Self::Eip2930(fee) => fee.max_transaction_fee(),
        }
    }

    pub fn market(&self) -> FeeMarket {
        match self {
            Self::Eip1559(_) => FeeMarket::Eip1559,
            Self::Eip2930(_) => FeeMarket::Eip2930,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_transaction_fee() {
        let fee = Eip1559FeeSnapshot {
            base_fee_last_finalized: 10,
            base_fee_next_estimate: 12,
            priority_fee: 2,
            max_fee: 26,
            gas_limit: TRANSFER_GAS_LIMIT,
        };
        assert_eq!(fee.max_transaction_fee(), Some(26 * 21_000));

        let legacy = FeeSnapshot::Eip2930(Eip2930FeeSnapshot {
            gas_price: Wei::MAX,
            gas_limit: 2,
        });
        assert_eq!(legacy.max_transaction_fee(), None);
    }

    #[test]
    fn test_fee_market_parsing() {
        assert_eq!("EIP1559".parse::<FeeMarket>(), Ok(FeeMarket::Eip1559));
        assert_eq!("legacy".parse::<FeeMarket>(), Ok(FeeMarket::Eip2930));
        assert!("bogus".parse::<FeeMarket>().is_err());
    }
}

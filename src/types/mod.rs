//! Shared Types Module
//!
//! Data types shared across the minter.

pub mod address;
pub mod deposit;
pub mod fees;
pub mod hash;
pub mod identity;
pub mod units;
pub mod withdrawal;

// Re-exports for convenience
pub use address::{Address, AddressError};
pub use deposit::{
    DepositClassification, DepositEvent, EventSource, InvalidDeposit, InvalidDepositReason,
    MintedDeposit,
};
pub use fees::{
    Eip1559FeeSnapshot, Eip2930FeeSnapshot, FeeMarket, FeeSnapshot, TRANSFER_GAS_LIMIT,
};
pub use hash::{keccak256, Hash};
pub use identity::{HostIdentity, IdentityError};
pub use units::{parse_wei, wei_to_display, wei_to_eth_string, Wei, WEI_PER_ETH, WEI_PER_GWEI};
pub use withdrawal::{
    FinalizedReceipt, NewWithdrawal, ReceiptStatus, RetrieveEthStatus, WithdrawalReceipt,
    WithdrawalRequest, WithdrawalStatus,
};

//! Withdrawal Module
//!
//! Accepts withdrawal requests and drives them to a finalized transaction
//! on the foreign chain.

pub mod machine;

pub use machine::{DriveReport, TestTransferResult, WithdrawalDriver};

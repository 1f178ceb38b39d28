//! Deposit Module
//!
//! Discovers `ReceivedEth` logs of the helper contract and credits the
//! beneficiaries.
//!
//! # Components
//! - `parser` - Decodes and validates deposit logs
//! - `scanner` - Scans confirmed block ranges and commits classifications

pub mod parser;
pub mod scanner;

pub use parser::{classify_log, deposit_event_topic, DEPOSIT_EVENT_SIGNATURE};
pub use scanner::{DepositScanner, ScanReport, ScannerConfig};

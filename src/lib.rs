//! ETH Minter
//!
//! Credits a host ledger for ETH deposited through a helper contract and
//! pays withdrawals back out with transactions signed by a threshold key.
//!
//! ## Services
//!
//! 1. **Deposit Scanner** - Reads confirmed `ReceivedEth` logs and mints
//! 2. **Withdrawal Driver** - Signs, sends and finalizes withdrawals
//! 3. **REST API** - Exposes every minter operation over HTTP
//!
//! All state transitions are recorded as events and replayed on start.

pub mod api;
pub mod common;
pub mod deposit;
pub mod fees;
pub mod minter;
pub mod rpc;
pub mod signing;
pub mod state;
pub mod storage;
pub mod transaction;
pub mod types;
pub mod withdrawal;

// Re-exports: Minter facade
pub use minter::{Minter, MinterSettings, TickResult};

// Re-exports: Infrastructure
pub use common::{MinterConfig, MinterError, Network, Result, SigningMode, ValidationError};

// Re-exports: Services
pub use deposit::{DepositScanner, ScanReport, ScannerConfig};
pub use fees::{FeeError, FeeEstimator, FeeEstimatorConfig};
pub use withdrawal::{DriveReport, TestTransferResult, WithdrawalDriver};

// Re-exports: State
pub use state::{DebugSnapshot, MinterEvent, MinterInit, MinterState, StateHandle};
pub use storage::{EventStore, MemoryEventStore, SqliteEventStore};

// Re-exports: Foreign chain
pub use rpc::{EthRpcClient, HttpTransport, RpcOutcome, RpcTransport};
pub use signing::{LocalKeySigner, RemoteSigner, SigningError, SigningOrchestrator, ThresholdSigner};

//! Minter Service
//!
//! Wires the ledger, the deposit scanner, the withdrawal driver and the
//! foreign-chain clients together and exposes every minter operation.
//! Scanner and driver run as independent loops.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::common::{
    generate_correlation_id, log_retryable_failure, EventCategory, LogEvent, LogLevel,
    MinterConfig, MinterError, SigningMode, ValidationError,
};
use crate::deposit::{DepositScanner, ScanReport, ScannerConfig};
use crate::fees::{FeeEstimator, FeeEstimatorConfig};
use crate::rpc::{EthRpcClient, HttpTransport, RpcTransport, TransactionInfo};
use crate::signing::{LocalKeySigner, RemoteSigner, SigningOrchestrator, ThresholdSigner};
use crate::state::{DebugSnapshot, StateHandle};
use crate::storage::{EventStore, SqliteEventStore};
use crate::types::{
    Address, Eip1559FeeSnapshot, Eip2930FeeSnapshot, FeeMarket, Hash, HostIdentity,
    MintedDeposit, RetrieveEthStatus, Wei, WithdrawalReceipt,
};
use crate::withdrawal::{DriveReport, TestTransferResult, WithdrawalDriver};

/// Runtime knobs of the minter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinterSettings {
    /// Fee market used for withdrawal transactions
    pub fee_market: FeeMarket,
    pub min_withdrawal_amount: Wei,
    /// Pause between two cycles of each loop
    pub poll_interval: Duration,
    /// Whether `test_transfer` may sign anything
    pub test_transfer_enabled: bool,
}

impl Default for MinterSettings {
    fn default() -> Self {
        Self {
            fee_market: FeeMarket::Eip1559,
            min_withdrawal_amount: 5_000_000_000_000_000,
            poll_interval: Duration::from_secs(30),
            test_transfer_enabled: false,
        }
    }
}

/// Result of one scanner and driver pass
#[derive(Debug, Clone, Default)]
pub struct TickResult {
    /// `None` if a scan was already running
    pub scan: Option<ScanReport>,
    /// `None` if a driver cycle was already running
    pub drive: Option<DriveReport>,
}

impl TickResult {
    pub fn has_activity(&self) -> bool {
        self.scan.as_ref().map_or(false, ScanReport::has_activity)
            || self.drive.as_ref().map_or(false, DriveReport::has_activity)
    }
}

impl fmt::Display for TickResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scan {
            Some(scan) => write!(f, "deposits: {}", scan)?,
            None => write!(f, "deposits: skipped")?,
        }
        match &self.drive {
            Some(drive) => write!(f, "; withdrawals: {}", drive),
            None => write!(f, "; withdrawals: skipped"),
        }
    }
}

/// The ETH minter
pub struct Minter {
    state: Arc<StateHandle>,
    client: EthRpcClient,
    fees: FeeEstimator,
    signer: Arc<SigningOrchestrator>,
    scanner: DepositScanner,
    driver: WithdrawalDriver,
    settings: MinterSettings,
    /// Running flag
    running: RwLock<bool>,
}

impl Minter {
    pub fn new(
        state: Arc<StateHandle>,
        transport: Arc<dyn RpcTransport>,
        signer: Arc<SigningOrchestrator>,
        scanner_config: ScannerConfig,
        fee_config: FeeEstimatorConfig,
        settings: MinterSettings,
    ) -> Self {
        let client = EthRpcClient::new(transport);
        let fees = FeeEstimator::new(client.clone(), fee_config);
        let scanner = DepositScanner::new(client.clone(), state.clone(), scanner_config);
        let driver = WithdrawalDriver::new(
            client.clone(),
            fees.clone(),
            signer.clone(),
            state.clone(),
            settings.fee_market,
            settings.min_withdrawal_amount,
        );

        Self {
            state,
            client,
            fees,
            signer,
            scanner,
            driver,
            settings,
            running: RwLock::new(false),
        }
    }

    /// Build a minter from configuration, replaying the SQLite audit log
    pub async fn from_config(config: &MinterConfig) -> Result<Self, MinterError> {
        let store: Arc<dyn EventStore> = Arc::new(SqliteEventStore::new(&config.db_path)?);
        let state = Arc::new(StateHandle::restore(config.minter_init(), store).await?);

        let transport = HttpTransport::new(&config.rpc_url)
            .map_err(|e| MinterError::internal(format!("failed to build RPC client: {}", e)))?;

        let signer: Arc<dyn ThresholdSigner> = match &config.signing {
            SigningMode::Remote { url } => Arc::new(RemoteSigner::new(url)?),
            SigningMode::Local { key: Some(key) } => {
                Arc::new(LocalKeySigner::from_hex(config.key_id.clone(), key)?)
            }
            SigningMode::Local { key: None } => {
                Arc::new(LocalKeySigner::generate(config.key_id.clone()))
            }
        };

        Ok(Self::new(
            state,
            Arc::new(transport),
            Arc::new(SigningOrchestrator::new(signer, config.key_id.clone())),
            config.scanner_config(),
            config.fee_config(),
            config.settings(),
        ))
    }

    pub fn settings(&self) -> &MinterSettings {
        &self.settings
    }

    pub fn signer_type(&self) -> &'static str {
        self.signer.signer_type()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Minted deposits with block in `[from, to]`
    ///
    /// The range is clamped to the scanned blocks; empty before the first scan
    /// reaches it.
    pub async fn display_logs(
        &self,
        from: u64,
        to: u64,
        source_address: Option<Address>,
    ) -> Result<Vec<MintedDeposit>, MinterError> {
        if from > to {
            return Err(ValidationError::InvalidRange(format!("{} > {}", from, to)).into());
        }
        Ok(self
            .state
            .read(|s| s.minted_in_range(from, to, source_address))
            .await)
    }

    /// Foreign-chain address controlled by the minter key
    pub async fn minter_address(&self) -> Result<Address, MinterError> {
        Ok(self.signer.minter_address().await?)
    }

    pub async fn withdraw(
        &self,
        caller: HostIdentity,
        amount: Wei,
        destination: &str,
    ) -> Result<WithdrawalReceipt, MinterError> {
        self.driver.withdraw(caller, amount, destination).await
    }

    pub async fn retrieve_eth_status(&self, sequence_number: u64) -> RetrieveEthStatus {
        self.driver.retrieve_eth_status(sequence_number).await
    }

    pub async fn eip_1559_transaction_price(&self) -> Result<Eip1559FeeSnapshot, MinterError> {
        Ok(self.fees.eip_1559_transaction_price().await?)
    }

    pub async fn eip_2930_transaction_price(&self) -> Result<Eip2930FeeSnapshot, MinterError> {
        Ok(self.fees.eip_2930_transaction_price().await?)
    }

    /// Sign and submit a transfer outside the withdrawal queue
    ///
    /// Refused unless enabled in the settings.
    pub async fn test_transfer(
        &self,
        destination: &str,
        amount: Wei,
        nonce: Option<u64>,
    ) -> Result<TestTransferResult, MinterError> {
        if !self.settings.test_transfer_enabled {
            return Err(MinterError::Disabled("test_transfer".to_string()));
        }
        self.driver.test_transfer(destination, amount, nonce).await
    }

    /// `eth_getTransactionByHash` passthrough
    pub async fn test_get_transaction_by_hash(
        &self,
        hash: &Hash,
    ) -> Result<Option<TransactionInfo>, MinterError> {
        Ok(self.client.get_transaction_by_hash(hash).await?)
    }

    pub async fn dump_state_for_debugging(&self) -> DebugSnapshot {
        self.state.read(|s| s.snapshot()).await
    }

    pub async fn balance_of(&self, identity: &HostIdentity) -> Wei {
        self.state.read(|s| s.balance_of(identity)).await
    }

    // =========================================================================
    // Loops
    // =========================================================================

    /// Run one scan cycle and one driver cycle
    pub async fn tick(&self) -> TickResult {
        TickResult {
            scan: self.scan_once().await,
            drive: self.driver.drive().await,
        }
    }

    async fn scan_once(&self) -> Option<ScanReport> {
        match self.scanner.scan().await {
            Ok(report) => report,
            Err(e) => {
                if e.is_retryable() {
                    log_retryable_failure(
                        EventCategory::Deposit,
                        "deposit scan",
                        e.error_code(),
                        &e.to_string(),
                    );
                } else {
                    tracing::error!(code = e.error_code(), error = %e, "deposit scan failed");
                }
                None
            }
        }
    }

    /// Run scanner and driver loops until [`Minter::stop`] is called
    pub async fn run(&self) {
        *self.running.write().await = true;

        println!("=== ETH Minter Started ===");
        println!("Poll interval: {} seconds", self.settings.poll_interval.as_secs());
        println!("Signer type: {}", self.signer.signer_type());
        match self.signer.minter_address().await {
            Ok(address) => println!("Minter address: {}", address),
            Err(e) => println!("Minter address: unavailable ({})", e),
        }
        println!();

        tokio::join!(self.scan_loop(), self.drive_loop());

        println!("=== ETH Minter Stopped ===");
    }

    async fn scan_loop(&self) {
        while self.is_running().await {
            let started = Instant::now();
            if let Some(report) = self.scan_once().await {
                if report.has_activity() {
                    log_cycle(format!("deposit scan: {}", report), started);
                }
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    async fn drive_loop(&self) {
        while self.is_running().await {
            let started = Instant::now();
            if let Some(report) = self.driver.drive().await {
                if report.has_activity() || report.stalled.is_some() {
                    log_cycle(format!("withdrawal cycle: {}", report), started);
                }
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Stop both loops after their current cycle
    pub async fn stop(&self) {
        *self.running.write().await = false;
    }
}

fn log_cycle(message: String, started: Instant) {
    let event = LogEvent::new(LogLevel::Info, EventCategory::System, message)
        .with_correlation_id(generate_correlation_id())
        .with_duration(started.elapsed().as_millis() as u64);
    tracing::info!(target: "eth_minter::driver", "{}", event.to_json());
}

//! Environment-based Configuration for the ETH Minter
//!
//! All sensitive values (signing keys, signer endpoints) come from
//! environment variables, never from hardcoded values. A `.env` file in the
//! working directory is loaded first when present.
//!
//! # Environment Variables
//!
//! ## Network
//! - `ETH_MINTER_NETWORK` - "mainnet" or "sepolia" (default: "sepolia")
//! - `ETH_MINTER_RPC_URL` - JSON-RPC endpoint of an Ethereum node
//!
//! ## Contract and Ledger
//! - `ETH_MINTER_HELPER_CONTRACT` - helper contract emitting `ReceivedEth`
//! - `ETH_MINTER_LAST_SCRAPED_BLOCK` - blocks up to this one are never scanned
//! - `ETH_MINTER_FIRST_SEQUENCE_NUMBER` - nonce of the first withdrawal (default: 0)
//!
//! ## Signing
//! - `ETH_MINTER_SIGNER_URL` - remote threshold signing service
//! - `ETH_MINTER_SIGNING_KEY` - hex-encoded local key (sepolia only)
//! - `ETH_MINTER_KEY_ID` - key identifier passed to the signer (default: "minter")
//!
//! ## Scanning and Fees
//! - `ETH_MINTER_CONFIRMATION_DEPTH` - blocks below the tip that are never scanned
//! - `ETH_MINTER_MAX_BLOCK_SPREAD` - largest `eth_getLogs` range
//! - `ETH_MINTER_MIN_WITHDRAWAL` - smallest accepted withdrawal in wei
//! - `ETH_MINTER_FEE_MARKET` - "eip1559" or "eip2930"
//! - `ETH_MINTER_MIN_PRIORITY_FEE` - priority fee floor in wei
//! - `ETH_MINTER_MAX_FEE_MULTIPLIER` - base fee headroom multiplier
//! - `ETH_MINTER_MAX_FEE_PER_GAS` - highest fee per gas ever signed, in wei
//!
//! The minimum withdrawal must be at least twice the cost of a transfer at
//! the fee cap.
//!
//! ## Diagnostics
//! - `ETH_MINTER_ENABLE_TEST_TRANSFER` - "true" exposes `test_transfer` (never on mainnet)
//!
//! ## Service
//! - `ETH_MINTER_POLL_INTERVAL_SECS` - driver cycle interval
//! - `ETH_MINTER_DB_PATH` - SQLite audit log path
//! - `ETH_MINTER_API_PORT` - HTTP API port
//! - `ETH_MINTER_LOG_LEVEL` - logging level (debug, info, warn, error)

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::deposit::ScannerConfig;
use crate::fees::FeeEstimatorConfig;
use crate::minter::MinterSettings;
use crate::state::MinterInit;
use crate::types::{parse_wei, Address, FeeMarket, Wei, WEI_PER_GWEI};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("network mismatch: expected {0}, got {1}")]
    NetworkMismatch(String, String),

    #[error("local signing key not allowed on {0}")]
    LocalKeyNotAllowed(String),
}

/// Ethereum network the minter is deployed against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Sepolia,
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "sepolia" | "testnet" => Ok(Network::Sepolia),
            _ => Err(ConfigError::InvalidValue(
                "ETH_MINTER_NETWORK".to_string(),
                format!("unknown network: {}", s),
            )),
        }
    }
}

impl Network {
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Mainnet => 1,
            Network::Sepolia => 11_155_111,
        }
    }

    /// Get default JSON-RPC endpoint for this network
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://ethereum-rpc.publicnode.com",
            Network::Sepolia => "https://ethereum-sepolia-rpc.publicnode.com",
        }
    }

    /// Blocks below the tip that are treated as reorganizable
    pub fn default_confirmation_depth(&self) -> u64 {
        match self {
            Network::Mainnet => 64,
            Network::Sepolia => 12,
        }
    }

    pub fn default_min_withdrawal(&self) -> Wei {
        match self {
            // 0.03 ETH
            Network::Mainnet => 30_000_000_000_000_000,
            // 0.005 ETH
            Network::Sepolia => 5_000_000_000_000_000,
        }
    }

    pub fn default_max_fee_per_gas(&self) -> Wei {
        match self {
            Network::Mainnet => 500 * WEI_PER_GWEI,
            Network::Sepolia => 100 * WEI_PER_GWEI,
        }
    }

    /// Local keys are a development convenience only
    pub fn allows_local_key(&self) -> bool {
        matches!(self, Network::Sepolia)
    }
}

/// Signing mode configuration
#[derive(Clone)]
pub enum SigningMode {
    /// Remote threshold signing service (production)
    Remote {
        url: String,
    },
    /// In-process key (development only)
    Local {
        /// Hex-encoded secp256k1 key; `None` generates an ephemeral one
        key: Option<String>,
    },
}

impl fmt::Debug for SigningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningMode::Remote { url } => f.debug_struct("Remote").field("url", url).finish(),
            SigningMode::Local { key } => f
                .debug_struct("Local")
                .field("key", &key.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct MinterConfig {
    /// Network environment
    pub network: Network,

    /// JSON-RPC endpoint
    pub rpc_url: String,

    /// Signing configuration
    pub signing: SigningMode,

    /// Key identifier passed to the signer
    pub key_id: String,

    pub helper_contract: Address,

    pub last_scraped_block: u64,

    pub first_sequence_number: u64,

    pub confirmation_depth: u64,

    pub max_block_spread: u64,

    /// Smallest accepted withdrawal in wei
    pub min_withdrawal_amount: Wei,

    pub fee_market: FeeMarket,

    pub min_priority_fee: Wei,

    pub max_fee_multiplier: u128,

    /// Fee per gas the minter never signs above
    pub max_fee_per_gas: Wei,

    /// Expose the diagnostic transfer
    pub enable_test_transfer: bool,

    /// Driver cycle interval
    pub poll_interval_secs: u64,

    /// SQLite audit log path
    pub db_path: String,

    pub api_port: u16,

    /// Log level
    pub log_level: String,
}

impl MinterConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let network: Network = lookup("ETH_MINTER_NETWORK")
            .unwrap_or_else(|| "sepolia".to_string())
            .parse()?;

        let rpc_url = lookup("ETH_MINTER_RPC_URL")
            .unwrap_or_else(|| network.default_rpc_url().to_string());

        let signing = load_signing_config(&lookup, network)?;

        let key_id = lookup("ETH_MINTER_KEY_ID").unwrap_or_else(|| "minter".to_string());

        // Deployment parameters (required on mainnet)
        let helper_contract = get_required_or_sepolia_default(
            &lookup,
            "ETH_MINTER_HELPER_CONTRACT",
            "0x907b6efc1a398fd88a8161b3ca02eec8eaf72ca1",
            network,
        )?;
        let helper_contract: Address = helper_contract.parse().map_err(|e| {
            ConfigError::InvalidValue("ETH_MINTER_HELPER_CONTRACT".to_string(), format!("{}", e))
        })?;
        if helper_contract.is_zero() {
            return Err(ConfigError::InvalidValue(
                "ETH_MINTER_HELPER_CONTRACT".to_string(),
                "zero address".to_string(),
            ));
        }

        let last_scraped_block = parse_number(
            "ETH_MINTER_LAST_SCRAPED_BLOCK",
            &get_required_or_sepolia_default(
                &lookup,
                "ETH_MINTER_LAST_SCRAPED_BLOCK",
                "3956206",
                network,
            )?,
        )?;

        let first_sequence_number =
            parse_or_default(&lookup, "ETH_MINTER_FIRST_SEQUENCE_NUMBER", 0)?;

        let confirmation_depth = parse_or_default(
            &lookup,
            "ETH_MINTER_CONFIRMATION_DEPTH",
            network.default_confirmation_depth(),
        )?;

        let max_block_spread = parse_or_default(&lookup, "ETH_MINTER_MAX_BLOCK_SPREAD", 500)?;

        let min_withdrawal_amount = match lookup("ETH_MINTER_MIN_WITHDRAWAL") {
            Some(value) => parse_wei(&value).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "ETH_MINTER_MIN_WITHDRAWAL".to_string(),
                    "must be an amount in wei".to_string(),
                )
            })?,
            None => network.default_min_withdrawal(),
        };

        let fee_market = match lookup("ETH_MINTER_FEE_MARKET") {
            Some(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidValue("ETH_MINTER_FEE_MARKET".to_string(), e))?,
            None => FeeMarket::default(),
        };

        let min_priority_fee = match lookup("ETH_MINTER_MIN_PRIORITY_FEE") {
            Some(value) => parse_wei(&value).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "ETH_MINTER_MIN_PRIORITY_FEE".to_string(),
                    "must be an amount in wei".to_string(),
                )
            })?,
            None => FeeEstimatorConfig::default().min_priority_fee,
        };

        let max_fee_multiplier = parse_or_default(
            &lookup,
            "ETH_MINTER_MAX_FEE_MULTIPLIER",
            FeeEstimatorConfig::default().max_fee_multiplier,
        )?;

        let max_fee_per_gas = match lookup("ETH_MINTER_MAX_FEE_PER_GAS") {
            Some(value) => parse_wei(&value).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "ETH_MINTER_MAX_FEE_PER_GAS".to_string(),
                    "must be an amount in wei".to_string(),
                )
            })?,
            None => network.default_max_fee_per_gas(),
        };

        let enable_test_transfer =
            parse_or_default(&lookup, "ETH_MINTER_ENABLE_TEST_TRANSFER", false)?;

        let poll_interval_secs = parse_or_default(&lookup, "ETH_MINTER_POLL_INTERVAL_SECS", 30)?;

        let db_path =
            lookup("ETH_MINTER_DB_PATH").unwrap_or_else(|| "data/eth-minter.db".to_string());

        let api_port = parse_or_default(&lookup, "ETH_MINTER_API_PORT", 8080)?;

        let log_level = lookup("ETH_MINTER_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let config = Self {
            network,
            rpc_url,
            signing,
            key_id,
            helper_contract,
            last_scraped_block,
            first_sequence_number,
            confirmation_depth,
            max_block_spread,
            min_withdrawal_amount,
            fee_market,
            min_priority_fee,
            max_fee_multiplier,
            max_fee_per_gas,
            enable_test_transfer,
            poll_interval_secs,
            db_path,
            api_port,
            log_level,
        };
        config.validate()?;

        Ok(config)
    }

    /// Reject values that would stall the driver
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_block_spread == 0 {
            return Err(ConfigError::InvalidValue(
                "ETH_MINTER_MAX_BLOCK_SPREAD".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        if self.max_fee_multiplier == 0 {
            return Err(ConfigError::InvalidValue(
                "ETH_MINTER_MAX_FEE_MULTIPLIER".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "ETH_MINTER_POLL_INTERVAL_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        if self.max_fee_per_gas == 0 {
            return Err(ConfigError::InvalidValue(
                "ETH_MINTER_MAX_FEE_PER_GAS".to_string(),
                "must be at least 1 wei".to_string(),
            ));
        }
        let required = self
            .fee_config()
            .max_transaction_fee_bound()
            .and_then(|bound| bound.checked_mul(2))
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "ETH_MINTER_MAX_FEE_PER_GAS".to_string(),
                    "overflows the transaction fee".to_string(),
                )
            })?;
        if self.min_withdrawal_amount < required {
            return Err(ConfigError::InvalidValue(
                "ETH_MINTER_MIN_WITHDRAWAL".to_string(),
                format!(
                    "must be at least {} wei, twice the transfer cost at the fee cap",
                    required
                ),
            ));
        }
        if self.enable_test_transfer && self.network == Network::Mainnet {
            return Err(ConfigError::InvalidValue(
                "ETH_MINTER_ENABLE_TEST_TRANSFER".to_string(),
                "not allowed on mainnet".to_string(),
            ));
        }
        if matches!(self.signing, SigningMode::Local { .. }) && !self.network.allows_local_key() {
            return Err(ConfigError::LocalKeyNotAllowed(format!("{:?}", self.network)));
        }
        Ok(())
    }

    /// Validate configuration for production readiness
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        if self.network != Network::Mainnet {
            return Err(ConfigError::NetworkMismatch(
                "mainnet".to_string(),
                format!("{:?}", self.network),
            ));
        }

        if !matches!(self.signing, SigningMode::Remote { .. }) {
            return Err(ConfigError::LocalKeyNotAllowed("mainnet".to_string()));
        }

        Ok(())
    }

    /// Installation parameters of the ledger
    pub fn minter_init(&self) -> MinterInit {
        MinterInit {
            key_id: self.key_id.clone(),
            chain_id: self.network.chain_id(),
            helper_contract: self.helper_contract,
            last_scraped_block: self.last_scraped_block,
            first_sequence_number: self.first_sequence_number,
        }
    }

    pub fn fee_config(&self) -> FeeEstimatorConfig {
        FeeEstimatorConfig {
            min_priority_fee: self.min_priority_fee,
            max_fee_multiplier: self.max_fee_multiplier,
            max_fee_per_gas_cap: self.max_fee_per_gas,
            ..FeeEstimatorConfig::default()
        }
    }

    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            confirmation_depth: self.confirmation_depth,
            max_block_spread: self.max_block_spread,
        }
    }

    pub fn settings(&self) -> MinterSettings {
        MinterSettings {
            fee_market: self.fee_market,
            min_withdrawal_amount: self.min_withdrawal_amount,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            test_transfer_enabled: self.enable_test_transfer
                && self.network != Network::Mainnet,
        }
    }

    /// Print configuration summary (hiding sensitive values)
    pub fn print_summary(&self) {
        println!("=== ETH Minter Configuration ===");
        println!("Network: {:?} (chain {})", self.network, self.network.chain_id());
        println!("RPC URL: {}", self.rpc_url);
        println!(
            "Signing Mode: {}",
            match &self.signing {
                SigningMode::Remote { url } => format!("Remote ({})", url),
                SigningMode::Local { key: Some(_) } => "Local Key (DEV)".to_string(),
                SigningMode::Local { key: None } => "Ephemeral Local Key (DEV)".to_string(),
            }
        );
        println!("Key ID: {}", self.key_id);
        println!("Helper Contract: {}", self.helper_contract);
        println!("Last Scraped Block: {}", self.last_scraped_block);
        println!("Confirmation Depth: {}", self.confirmation_depth);
        println!("Max Block Spread: {}", self.max_block_spread);
        println!("Fee Market: {}", self.fee_market);
        println!(
            "Min Withdrawal: {} wei ({} gwei)",
            self.min_withdrawal_amount,
            self.min_withdrawal_amount / WEI_PER_GWEI
        );
        println!("Max Fee Per Gas: {} gwei", self.max_fee_per_gas / WEI_PER_GWEI);
        println!(
            "Test Transfer: {}",
            if self.enable_test_transfer { "enabled" } else { "disabled" }
        );
        println!("Poll Interval: {}s", self.poll_interval_secs);
        println!("Database: {}", self.db_path);
        println!("Log Level: {}", self.log_level);
        println!("================================");
    }
}

/// Get required variable, or use default for sepolia only
fn get_required_or_sepolia_default<F>(
    lookup: &F,
    var_name: &str,
    sepolia_default: &str,
    network: Network,
) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var_name) {
        Some(value) => Ok(value),
        None => {
            if network == Network::Sepolia {
                Ok(sepolia_default.to_string())
            } else {
                Err(ConfigError::MissingEnvVar(var_name.to_string()))
            }
        }
    }
}

fn parse_number<T: FromStr>(var_name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| {
        ConfigError::InvalidValue(var_name.to_string(), "must be a number".to_string())
    })
}

fn parse_or_default<F, T>(lookup: &F, var_name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var_name) {
        Some(value) => parse_number(var_name, &value),
        None => Ok(default),
    }
}

/// Load signing configuration
fn load_signing_config<F>(lookup: &F, network: Network) -> Result<SigningMode, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("ETH_MINTER_SIGNER_URL") {
        return Ok(SigningMode::Remote { url });
    }

    match lookup("ETH_MINTER_SIGNING_KEY") {
        Some(_) if !network.allows_local_key() => {
            Err(ConfigError::LocalKeyNotAllowed(format!("{:?}", network)))
        }
        Some(key) => Ok(SigningMode::Local { key: Some(key) }),
        None if network.allows_local_key() => {
            eprintln!("WARNING: No signer configured, using an ephemeral key - DO NOT USE WITH REAL FUNDS");
            Ok(SigningMode::Local { key: None })
        }
        None => Err(ConfigError::MissingEnvVar("ETH_MINTER_SIGNER_URL".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_network_parsing() {
        assert_eq!("mainnet".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("SEPOLIA".parse::<Network>().unwrap(), Network::Sepolia);
        assert!("goerli".parse::<Network>().is_err());
        assert_eq!(Network::Sepolia.chain_id(), 11_155_111);
    }

    #[test]
    fn test_sepolia_defaults() {
        let config = MinterConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.network, Network::Sepolia);
        assert_eq!(config.key_id, "minter");
        assert_eq!(config.fee_market, FeeMarket::Eip1559);
        assert_eq!(config.confirmation_depth, 12);
        assert!(matches!(config.signing, SigningMode::Local { key: None }));
        assert_eq!(config.minter_init().chain_id, 11_155_111);
    }

    #[test]
    fn test_mainnet_requires_deployment_parameters() {
        let result = MinterConfig::from_lookup(lookup_from(&[
            ("ETH_MINTER_NETWORK", "mainnet"),
            ("ETH_MINTER_SIGNER_URL", "http://signer:9000"),
        ]));

        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "ETH_MINTER_HELPER_CONTRACT"));
    }

    #[test]
    fn test_mainnet_rejects_local_key() {
        let result = MinterConfig::from_lookup(lookup_from(&[
            ("ETH_MINTER_NETWORK", "mainnet"),
            ("ETH_MINTER_SIGNING_KEY", "0x01"),
        ]));

        assert!(matches!(result, Err(ConfigError::LocalKeyNotAllowed(_))));
    }

    #[test]
    fn test_mainnet_production_config() {
        let config = MinterConfig::from_lookup(lookup_from(&[
            ("ETH_MINTER_NETWORK", "mainnet"),
            ("ETH_MINTER_SIGNER_URL", "http://signer:9000"),
            ("ETH_MINTER_HELPER_CONTRACT", "0x7574eb42ca208a4f6960eccafdf186d627dcc175"),
            ("ETH_MINTER_LAST_SCRAPED_BLOCK", "18500000"),
            ("ETH_MINTER_FEE_MARKET", "eip2930"),
            ("ETH_MINTER_MIN_PRIORITY_FEE", "2_000_000_000"),
        ]))
        .unwrap();

        assert!(config.validate_for_production().is_ok());
        assert_eq!(config.last_scraped_block, 18_500_000);
        assert_eq!(config.fee_market, FeeMarket::Eip2930);
        assert_eq!(config.fee_config().min_priority_fee, 2_000_000_000);
        assert_eq!(config.scanner_config().confirmation_depth, 64);
    }

    #[test]
    fn test_invalid_numbers_are_reported() {
        let result = MinterConfig::from_lookup(lookup_from(&[(
            "ETH_MINTER_MAX_BLOCK_SPREAD",
            "lots",
        )]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(v, _)) if v == "ETH_MINTER_MAX_BLOCK_SPREAD"));

        let result = MinterConfig::from_lookup(lookup_from(&[("ETH_MINTER_MAX_BLOCK_SPREAD", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_min_withdrawal_must_cover_fee_cap() {
        // 100 gwei * 21000 gas = 0.0021 ETH, so 0.0042 ETH is the floor
        let result = MinterConfig::from_lookup(lookup_from(&[(
            "ETH_MINTER_MIN_WITHDRAWAL",
            "10000000000000",
        )]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(v, _)) if v == "ETH_MINTER_MIN_WITHDRAWAL"));

        let config = MinterConfig::from_lookup(lookup_from(&[(
            "ETH_MINTER_MIN_WITHDRAWAL",
            "4200000000000000",
        )]))
        .unwrap();
        assert_eq!(config.fee_config().max_fee_per_gas_cap, 100 * WEI_PER_GWEI);

        let result = MinterConfig::from_lookup(lookup_from(&[
            ("ETH_MINTER_MIN_WITHDRAWAL", "4200000000000000"),
            ("ETH_MINTER_MAX_FEE_PER_GAS", "200000000000"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_transfer_switch() {
        let config = MinterConfig::from_lookup(lookup_from(&[])).unwrap();
        assert!(!config.settings().test_transfer_enabled);

        let config = MinterConfig::from_lookup(lookup_from(&[(
            "ETH_MINTER_ENABLE_TEST_TRANSFER",
            "true",
        )]))
        .unwrap();
        assert!(config.settings().test_transfer_enabled);

        let result = MinterConfig::from_lookup(lookup_from(&[
            ("ETH_MINTER_NETWORK", "mainnet"),
            ("ETH_MINTER_SIGNER_URL", "http://signer:9000"),
            ("ETH_MINTER_HELPER_CONTRACT", "0x7574eb42ca208a4f6960eccafdf186d627dcc175"),
            ("ETH_MINTER_LAST_SCRAPED_BLOCK", "18500000"),
            ("ETH_MINTER_ENABLE_TEST_TRANSFER", "true"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(v, _)) if v == "ETH_MINTER_ENABLE_TEST_TRANSFER"));
    }

    #[test]
    fn test_signing_key_is_redacted() {
        let mode = SigningMode::Local {
            key: Some("deadbeef".to_string()),
        };
        assert!(!format!("{:?}", mode).contains("deadbeef"));
    }
}

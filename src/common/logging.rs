//! Structured Logging for the ETH Minter
//!
//! Provides structured logging with:
//! - JSON output for log aggregation on mainnet
//! - Correlation IDs tying together the log lines of one driver cycle
//! - Typed deposit and withdrawal events
//!
//! # Usage
//!
//! ```rust,ignore
//! use eth_minter::common::logging::{init_logging, LogLevel};
//!
//! init_logging(LogLevel::Info, true)?; // JSON mode for mainnet
//! ```

use serde::Serialize;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::types::{Address, Hash, Wei};

// ============================================================================
// Log Levels
// ============================================================================

/// Application log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

// ============================================================================
// Structured Event Types
// ============================================================================

/// Event categories for structured logging
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Deposit scanning and crediting
    Deposit,
    /// Withdrawal lifecycle
    Withdrawal,
    /// Signing service calls
    Signing,
    /// Foreign-chain RPC failures
    Rpc,
    /// Driver cycles, startup, shutdown
    System,
}

/// Structured log event
#[derive(Debug, Serialize)]
pub struct LogEvent {
    /// Event timestamp (ISO 8601)
    pub timestamp: String,
    pub level: String,
    pub category: EventCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

/// Error details for error events
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl LogEvent {
    /// Create a new log event
    pub fn new(level: LogLevel, category: EventCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: level.as_filter().to_uppercase(),
            category,
            message: message.into(),
            correlation_id: None,
            data: None,
            duration_ms: None,
            error: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Add structured data
    ///
    /// Wei amounts go in as strings; JSON values cannot hold 128-bit numbers.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error = Some(ErrorDetails {
            code: code.into(),
            message: message.into(),
        });
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"error\": \"failed to serialize log\", \"message\": \"{}\"}}",
                self.message
            )
        })
    }
}

// ============================================================================
// Domain Event Logging
// ============================================================================

/// Log a deposit classification
pub fn log_deposit_event(
    event_type: &str,
    source: &str,
    beneficiary: &str,
    amount: Wei,
    block_number: Option<u64>,
    error: Option<&str>,
) {
    let success = error.is_none();
    let level = if success { LogLevel::Info } else { LogLevel::Warn };
    let mut event = LogEvent::new(level, EventCategory::Deposit, event_type)
        .with_correlation_id(source)
        .with_data(serde_json::json!({
            "source": source,
            "beneficiary": beneficiary,
            "amount_wei": amount.to_string(),
            "block_number": block_number,
        }));

    if let Some(err) = error {
        event = event.with_error("INVALID_DEPOSIT", err);
    }

    if success {
        tracing::info!(target: "eth_minter::deposit", "{}", event.to_json());
    } else {
        tracing::warn!(target: "eth_minter::deposit", "{}", event.to_json());
    }
}

/// Log a withdrawal transition
pub fn log_withdrawal_event(
    event_type: &str,
    sequence_number: u64,
    amount: Wei,
    destination: &Address,
    transaction_hash: Option<&Hash>,
    error: Option<&str>,
) {
    let success = error.is_none();
    let level = if success { LogLevel::Info } else { LogLevel::Error };
    let mut event = LogEvent::new(level, EventCategory::Withdrawal, event_type)
        .with_correlation_id(sequence_number.to_string())
        .with_data(serde_json::json!({
            "sequence_number": sequence_number,
            "amount_wei": amount.to_string(),
            "destination": destination.to_string(),
            "transaction_hash": transaction_hash.map(|h| h.to_string()),
        }));

    if let Some(err) = error {
        event = event.with_error("WITHDRAWAL_ERROR", err);
    }

    if success {
        tracing::info!(target: "eth_minter::withdrawal", "{}", event.to_json());
    } else {
        tracing::error!(target: "eth_minter::withdrawal", "{}", event.to_json());
    }
}

/// Log a failed outbound call that will be retried next cycle
pub fn log_retryable_failure(category: EventCategory, operation: &str, code: &str, error: &str) {
    let event = LogEvent::new(LogLevel::Warn, category, operation).with_error(code, error);
    tracing::warn!(target: "eth_minter::driver", "{}", event.to_json());
}

// ============================================================================
// Initialization
// ============================================================================

/// Initialize the logging system
///
/// `RUST_LOG` overrides `level` when set.
pub fn init_logging(level: LogLevel, json_format: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = level.as_filter();
        EnvFilter::new(format!(
            "eth_minter={},tower_http={},axum={}",
            level, level, level
        ))
    });

    if json_format {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE),
        );

        subscriber
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    } else {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .pretty()
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        );

        subscriber
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    }

    Ok(())
}

/// Initialize logging from MinterConfig
pub fn init_from_config(config: &super::config::MinterConfig) -> Result<(), LoggingError> {
    let level = LogLevel::from(config.log_level.as_str());
    let json_format = config.network == super::config::Network::Mainnet;

    init_logging(level, json_format)
}

/// Logging errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),
}

/// Generate a correlation ID for one driver cycle
pub fn generate_correlation_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis() as u64;
    format!("{:x}-{:04x}", millis & 0xFFFF_FFFF, rand::random::<u16>())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_serialization() {
        let event = LogEvent::new(LogLevel::Info, EventCategory::System, "cycle finished")
            .with_correlation_id("test-123")
            .with_data(serde_json::json!({ "amount_wei": u128::MAX.to_string() }))
            .with_duration(42);

        let json = event.to_json();
        assert!(json.contains("cycle finished"));
        assert!(json.contains("test-123"));
        assert!(json.contains("\"duration_ms\":42"));
        assert!(json.contains(&u128::MAX.to_string()));
        assert!(json.contains("\"category\":\"system\""));
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::from("INFO"), LogLevel::Info);
        assert_eq!(LogLevel::from("warning"), LogLevel::Warn);
        assert_eq!(LogLevel::from("unknown"), LogLevel::Info);
    }

    #[test]
    fn test_correlation_id_format() {
        let id = generate_correlation_id();
        let (time, suffix) = id.split_once('-').unwrap();
        assert!(!time.is_empty());
        assert_eq!(suffix.len(), 4);
    }
}

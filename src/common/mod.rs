//! Common Infrastructure Module
//!
//! Shared utilities and configuration for the minter.
//!
//! This module contains:
//! - Configuration loading from environment variables
//! - Structured logging setup
//! - Common error types

pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use config::{ConfigError, MinterConfig, Network, SigningMode};
pub use error::{MinterError, Result, ValidationError};
pub use logging::{
    generate_correlation_id, init_from_config, init_logging, log_deposit_event,
    log_retryable_failure, log_withdrawal_event, ErrorDetails, EventCategory, LogEvent, LogLevel,
    LoggingError,
};

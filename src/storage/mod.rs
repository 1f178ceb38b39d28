//! Storage Layer Module
//!
//! Provides persistence for the minter audit log.
//!
//! This module contains:
//! - Storage trait definitions for abstraction
//! - SQLite implementation for production
//! - In-memory implementation for testing

pub mod memory;
pub mod sqlite;
pub mod traits;

// Re-exports for convenience
pub use memory::MemoryEventStore;
pub use sqlite::SqliteEventStore;
pub use traits::{EventStore, StorageError, StorageResult};

//! Storage Trait Definitions
//!
//! The minter persists its audit log and nothing else; state is rebuilt by
//! replaying the log. Implementations can use SQLite (production) or memory
//! (testing).

use async_trait::async_trait;
use thiserror::Error;

use crate::state::MinterEvent;

/// Storage errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Append-only audit event log
///
/// Implementations:
/// - `SqliteEventStore` - Production storage with SQLite
/// - `MemoryEventStore` - In-memory storage for testing
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append a batch atomically: either every event is stored or none
    async fn append(&self, events: &[MinterEvent]) -> StorageResult<()>;

    /// All events in append order
    async fn load(&self) -> StorageResult<Vec<MinterEvent>>;

    /// Number of stored events
    async fn count(&self) -> StorageResult<u64>;
}

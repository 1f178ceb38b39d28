//! SQLite Persistent Event Store
//!
//! Provides durable storage for the audit log that survives service restarts.
//! Each event is one JSON row; batches are written in a single transaction.
//! Uses connection pooling via r2d2 for concurrent access.

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

use super::traits::{EventStore, StorageError, StorageResult};
use crate::state::MinterEvent;

/// SQLite-backed audit log with connection pooling
pub struct SqliteEventStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteEventStore {
    /// Create a new store with the given database path
    ///
    /// Creates the database file and runs migrations if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StorageError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    /// Get a connection from the pool
    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool
            .get()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                recorded_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_kind ON events(kind);
            "#,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    // Synchronous helper methods for the trait implementations

    fn append_sync(&self, events: &[MinterEvent]) -> Result<(), StorageError> {
        let mut conn = self.conn()?;
        let now = chrono::Utc::now().timestamp();

        let tx = conn
            .transaction()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        for event in events {
            let payload = serde_json::to_string(event)
                .map_err(|e| StorageError::InvalidData(e.to_string()))?;

            tx.execute(
                "INSERT INTO events (kind, payload, recorded_at) VALUES (?1, ?2, ?3)",
                params![event.kind(), payload, now],
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;
        }

        tx.commit()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    fn load_sync(&self) -> Result<Vec<MinterEvent>, StorageError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT id, payload FROM events ORDER BY id ASC")
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let mut events = Vec::new();
        for row in rows {
            let (id, payload) = row.map_err(|e| StorageError::Database(e.to_string()))?;
            let event = serde_json::from_str(&payload)
                .map_err(|e| StorageError::InvalidData(format!("event {}: {}", id, e)))?;
            events.push(event);
        }

        Ok(events)
    }

    fn count_sync(&self) -> Result<u64, StorageError> {
        let conn = self.conn()?;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(count as u64)
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn append(&self, events: &[MinterEvent]) -> StorageResult<()> {
        self.append_sync(events)
    }

    async fn load(&self) -> StorageResult<Vec<MinterEvent>> {
        self.load_sync()
    }

    async fn count(&self) -> StorageResult<u64> {
        self.count_sync()
    }
}

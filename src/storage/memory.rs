//! In-Memory Event Store
//!
//! Provides in-memory storage for testing and development.
//! Data is lost when the service restarts.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::{EventStore, StorageResult};
use crate::state::MinterEvent;

/// In-memory audit log
///
/// Clones share the same log.
#[derive(Clone, Default)]
pub struct MemoryEventStore {
    events: Arc<RwLock<Vec<MinterEvent>>>,
}

impl MemoryEventStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn append(&self, events: &[MinterEvent]) -> StorageResult<()> {
        self.events.write().await.extend_from_slice(events);
        Ok(())
    }

    async fn load(&self) -> StorageResult<Vec<MinterEvent>> {
        Ok(self.events.read().await.clone())
    }

    async fn count(&self) -> StorageResult<u64> {
        Ok(self.events.read().await.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_load() {
        let store = MemoryEventStore::new();
        let shared = store.clone();

        store
            .append(&[
                MinterEvent::SyncedToBlock { block_number: 5 },
                MinterEvent::SentTransaction { sequence_number: 0 },
            ])
            .await
            .unwrap();

        assert_eq!(shared.count().await.unwrap(), 2);
        assert_eq!(
            shared.load().await.unwrap()[0],
            MinterEvent::SyncedToBlock { block_number: 5 }
        );
    }
}

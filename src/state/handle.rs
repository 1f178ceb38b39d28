//! Shared State Handle
//!
//! Owns the minter state behind a tokio `RwLock` together with the event
//! store. A commit validates its events against a copy of the state,
//! persists them, and only then swaps the copy in, so observers never see a
//! half-applied batch.

use std::sync::Arc;
use tokio::sync::RwLock;

use super::{InvariantViolation, MinterEvent, MinterInit, MinterState};
use crate::storage::{EventStore, StorageError};

#[derive(Debug, Clone, thiserror::Error)]
pub enum StateError {
    #[error("invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("storage: {0}")]
    Storage(#[from] StorageError),
}

pub struct StateHandle {
    state: RwLock<MinterState>,
    store: Arc<dyn EventStore>,
}

impl StateHandle {
    /// Rebuild the state by replaying the stored audit log
    pub async fn restore(init: MinterInit, store: Arc<dyn EventStore>) -> Result<Self, StateError> {
        let mut state = MinterState::new(init);
        let events = store.load().await?;

        for event in &events {
            state.apply(event)?;
        }

        tracing::info!(
            events = events.len(),
            last_scraped_block = state.last_scraped_block(),
            next_sequence_number = state.next_sequence_number(),
            "state restored"
        );

        Ok(Self {
            state: RwLock::new(state),
            store,
        })
    }

    /// Run `f` against the committed state
    pub async fn read<T>(&self, f: impl FnOnce(&MinterState) -> T) -> T {
        let state = self.state.read().await;
        f(&state)
    }

    /// Commit a batch of events atomically
    pub async fn commit(&self, events: Vec<MinterEvent>) -> Result<(), StateError> {
        self.commit_with(|_| Ok::<_, StateError>((events, ()))).await
    }

    /// Derive a batch from the current state and commit it under one lock
    ///
    /// `f` sees the state exactly as the batch will be applied to it, which
    /// makes check-then-act sequences atomic.
    pub async fn commit_with<T, E>(
        &self,
        f: impl FnOnce(&MinterState) -> Result<(Vec<MinterEvent>, T), E>,
    ) -> Result<T, E>
    where
        E: From<StateError>,
    {
        let mut state = self.state.write().await;
        let (events, value) = f(&state)?;

        if events.is_empty() {
            return Ok(value);
        }

        let mut next = state.clone();
        for event in &events {
            next.apply(event).map_err(StateError::from)?;
        }

        self.store
            .append(&events)
            .await
            .map_err(StateError::from)?;

        *state = next;
        Ok(value)
    }
}

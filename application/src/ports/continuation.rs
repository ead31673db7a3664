//! Continuation ports: loop-end hooks and persisted continuation state.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tether_domain::{ContinuationDecision, PendingContinuation, SessionId};
use thiserror::Error;

/// Read-only view handed to hooks when a turn completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopEndContext {
    pub session_id: SessionId,
    /// Last finalized assistant text of the turn
    pub final_message: Option<String>,
    /// Continuations fired so far in this chain
    pub iteration: u32,
    pub max_iterations: u32,
}

/// Policy deciding whether a completed turn is followed by another prompt.
#[async_trait]
pub trait ContinuationHook: Send + Sync {
    fn name(&self) -> &str;

    async fn on_loop_end(&self, context: &LoopEndContext) -> ContinuationDecision;
}

/// Errors from a continuation store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Persistence for the per-session continuation counter.
///
/// Calls are synchronous so a save has completed before the continuation
/// decision it records is acted upon.
pub trait ContinuationStore: Send + Sync {
    fn load(&self, session: &SessionId) -> Result<Option<PendingContinuation>, StoreError>;

    fn save(&self, session: &SessionId, state: &PendingContinuation) -> Result<(), StoreError>;

    fn clear(&self, session: &SessionId) -> Result<(), StoreError>;
}

/// Store that keeps state in memory only.
#[derive(Debug, Default)]
pub struct InMemoryContinuationStore {
    states: Mutex<HashMap<SessionId, PendingContinuation>>,
}

impl InMemoryContinuationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContinuationStore for InMemoryContinuationStore {
    fn load(&self, session: &SessionId) -> Result<Option<PendingContinuation>, StoreError> {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        Ok(states.get(session).cloned())
    }

    fn save(&self, session: &SessionId, state: &PendingContinuation) -> Result<(), StoreError> {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.insert(session.clone(), state.clone());
        Ok(())
    }

    fn clear(&self, session: &SessionId) -> Result<(), StoreError> {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.remove(session);
        Ok(())
    }
}

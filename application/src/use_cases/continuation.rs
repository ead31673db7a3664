//! Continuation engine.
//!
//! Runs the registered loop-end hooks after a completed turn and decides
//! whether another prompt is injected. The iteration counter is persisted
//! before a decision is returned, so an interrupted chain can resume.

use crate::ports::continuation::{ContinuationHook, ContinuationStore, LoopEndContext, StoreError};
use std::sync::Arc;
use tether_domain::{ContinuationDecision, PendingContinuation, SessionId, StopReason};
use tracing::{debug, info};

/// Result of evaluating the hooks for one completed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContinuationOutcome {
    /// Start another turn with this prompt.
    Continue { prompt: String, iteration: u32 },
    Stop { reason: StopReason, iteration: u32 },
}

pub struct ContinuationEngine {
    hooks: Vec<Arc<dyn ContinuationHook>>,
    store: Arc<dyn ContinuationStore>,
    max_iterations: u32,
}

impl ContinuationEngine {
    pub fn new(store: Arc<dyn ContinuationStore>, max_iterations: u32) -> Self {
        Self {
            hooks: Vec::new(),
            store,
            max_iterations,
        }
    }

    /// Register a hook. Hooks run in registration order.
    pub fn with_hook(mut self, hook: Arc<dyn ContinuationHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn has_hooks(&self) -> bool {
        !self.hooks.is_empty()
    }

    /// Persisted state for `session`, or a fresh chain.
    pub fn state(&self, session: &SessionId) -> Result<PendingContinuation, StoreError> {
        Ok(self
            .store
            .load(session)?
            .unwrap_or_else(|| PendingContinuation::new(self.max_iterations)))
    }

    /// Start a fresh chain, as after a human prompt.
    pub fn reset(&self, session: &SessionId) -> Result<(), StoreError> {
        let state = PendingContinuation::new(self.max_iterations);
        self.store.save(session, &state)
    }

    /// Decide what follows a completed turn.
    pub async fn on_turn_completed(
        &self,
        session: &SessionId,
        final_message: Option<&str>,
    ) -> Result<ContinuationOutcome, StoreError> {
        let mut state = self.state(session)?;
        // Configuration wins over a ceiling persisted by an older run.
        state.max_iterations = self.max_iterations;

        let context = LoopEndContext {
            session_id: session.clone(),
            final_message: final_message.map(str::to_string),
            iteration: state.iteration,
            max_iterations: state.max_iterations,
        };

        let mut prompt = None;
        for hook in &self.hooks {
            match hook.on_loop_end(&context).await {
                ContinuationDecision::Continue(next) => {
                    debug!(hook = hook.name(), "Hook requested continuation");
                    prompt = Some(next);
                    break;
                }
                ContinuationDecision::Stop => {
                    debug!(hook = hook.name(), "Hook declined continuation");
                }
            }
        }

        let Some(prompt) = prompt else {
            info!(session = %session, iteration = state.iteration, "Continuation chain stopped");
            self.store.clear(session)?;
            return Ok(ContinuationOutcome::Stop {
                reason: StopReason::HooksDeclined,
                iteration: state.iteration,
            });
        };

        if state.limit_reached() {
            info!(
                session = %session,
                iteration = state.iteration,
                max_iterations = state.max_iterations,
                "Continuation limit reached"
            );
            self.store.clear(session)?;
            return Ok(ContinuationOutcome::Stop {
                reason: StopReason::ContinuationLimitExceeded,
                iteration: state.iteration,
            });
        }

        state.advance(prompt.clone());
        self.store.save(session, &state)?;
        info!(
            session = %session,
            iteration = state.iteration,
            max_iterations = state.max_iterations,
            "Continuing"
        );
        Ok(ContinuationOutcome::Continue {
            prompt,
            iteration: state.iteration,
        })
    }
}

//! Session use case.
//!
//! A session owns the backend session id, one [`TurnController`] and the
//! continuation chain. Exactly one turn is open at a time: a second
//! concurrent submit fails with [`SessionError::TurnInProgress`].

use crate::config::SessionParams;
use crate::ports::agent_backend::{AgentBackend, BackendError};
use crate::ports::continuation::{
    ContinuationHook, ContinuationStore, InMemoryContinuationStore, StoreError,
};
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::lifecycle_hook::{LifecycleHook, MessageContext, PromptContext};
use crate::ports::notification::{NoNotifications, Notification, NotificationSink};
use crate::ports::tool_registry::ToolRegistryPort;
use crate::use_cases::continuation::{ContinuationEngine, ContinuationOutcome};
use crate::use_cases::dispatch::ToolCallDispatcher;
use crate::use_cases::lifecycle::{LifecycleHooks, PromptGate};
use crate::use_cases::run_turn::{TurnController, TurnHandle, TurnOutcome};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tether_domain::{SessionId, StopReason, TurnId};
use thiserror::Error;
use tracing::{info, warn};

/// Errors surfaced by [`Session`]
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("A turn is already in progress")]
    TurnInProgress,

    #[error("transport disconnected")]
    Disconnected,

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Continuation store error: {0}")]
    Store(#[from] StoreError),
}

/// What one submit produced: the human turn plus any continuation turns.
#[derive(Debug, Clone, Default)]
pub struct SessionReport {
    pub outcomes: Vec<TurnOutcome>,
    /// Why the continuation chain stopped, when hooks were consulted
    pub stop_reason: Option<StopReason>,
    /// Set when a prompt hook refused the prompt that would have run next
    pub blocked: Option<String>,
}

impl SessionReport {
    pub fn last(&self) -> Option<&TurnOutcome> {
        self.outcomes.last()
    }

    /// Number of turns started by continuation hooks.
    pub fn continuations(&self) -> usize {
        self.outcomes.len().saturating_sub(1)
    }
}

/// Collects a session's collaborators.
pub struct SessionBuilder {
    backend: Arc<dyn AgentBackend>,
    registry: Arc<dyn ToolRegistryPort>,
    store: Arc<dyn ContinuationStore>,
    notifier: Arc<dyn NotificationSink>,
    logger: Arc<dyn ConversationLogger>,
    hooks: Vec<Arc<dyn ContinuationHook>>,
    lifecycle: LifecycleHooks,
    params: SessionParams,
}

impl SessionBuilder {
    pub fn with_store(mut self, store: Arc<dyn ContinuationStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn ContinuationHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_lifecycle_hook(mut self, hook: Arc<dyn LifecycleHook>) -> Self {
        self.lifecycle.push(hook);
        self
    }

    pub fn with_params(mut self, params: SessionParams) -> Self {
        self.params = params;
        self
    }

    /// Create a new backend session.
    pub async fn create(self) -> Result<Session, SessionError> {
        ensure_connected(self.backend.as_ref())?;
        let definitions = self.registry.definitions();
        let id = self
            .backend
            .create_session(&self.params.cwd, &definitions)
            .await?;
        info!(session = %id, tools = definitions.len(), "Session created");
        Ok(self.build(id))
    }

    /// Re-attach to an existing backend session.
    pub async fn resume(self, id: SessionId) -> Result<Session, SessionError> {
        ensure_connected(self.backend.as_ref())?;
        self.backend.resume_session(&id, &self.params.cwd).await?;
        info!(session = %id, "Session resumed");
        Ok(self.build(id))
    }

    fn build(self, id: SessionId) -> Session {
        let dispatcher = Arc::new(ToolCallDispatcher::new(self.registry));
        let controller = TurnController::new(
            Arc::clone(&self.backend),
            dispatcher,
            Arc::clone(&self.notifier),
            Arc::clone(&self.logger),
            id.clone(),
        )
        .with_approval_timeout(self.params.approval_timeout)
        .with_hooks(self.lifecycle.clone());

        let continuation = self.hooks.into_iter().fold(
            ContinuationEngine::new(self.store, self.params.max_iterations),
            |engine, hook| engine.with_hook(hook),
        );

        Session {
            id,
            backend: self.backend,
            controller,
            continuation,
            lifecycle: self.lifecycle,
            notifier: self.notifier,
            logger: self.logger,
            next_turn: AtomicU64::new(1),
            turn_lock: tokio::sync::Mutex::new(()),
            current: Mutex::new(None),
        }
    }
}

/// One conversation with the remote agent.
pub struct Session {
    id: SessionId,
    backend: Arc<dyn AgentBackend>,
    controller: TurnController,
    continuation: ContinuationEngine,
    lifecycle: LifecycleHooks,
    notifier: Arc<dyn NotificationSink>,
    logger: Arc<dyn ConversationLogger>,
    next_turn: AtomicU64,
    turn_lock: tokio::sync::Mutex<()>,
    current: Mutex<Option<TurnHandle>>,
}

impl Session {
    pub fn builder(
        backend: Arc<dyn AgentBackend>,
        registry: Arc<dyn ToolRegistryPort>,
    ) -> SessionBuilder {
        SessionBuilder {
            backend,
            registry,
            store: Arc::new(InMemoryContinuationStore::new()),
            notifier: Arc::new(NoNotifications),
            logger: Arc::new(NoConversationLogger),
            hooks: Vec::new(),
            lifecycle: LifecycleHooks::new(),
            params: SessionParams::default(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Whether a turn is currently running.
    pub fn is_busy(&self) -> bool {
        self.turn_lock.try_lock().is_err()
    }

    /// Submit a human prompt and run the continuation chain that follows.
    ///
    /// A human prompt always starts a fresh chain at iteration 0.
    pub async fn submit(&self, prompt: &str) -> Result<SessionReport, SessionError> {
        let _guard = self
            .turn_lock
            .try_lock()
            .map_err(|_| SessionError::TurnInProgress)?;
        ensure_connected(self.backend.as_ref())?;

        self.continuation.reset(&self.id)?;
        self.run_chain(prompt.to_string(), 0).await
    }

    /// Restart an interrupted continuation chain from persisted state.
    ///
    /// Returns `None` when no continuation was pending.
    pub async fn resume_continuation(&self) -> Result<Option<SessionReport>, SessionError> {
        let _guard = self
            .turn_lock
            .try_lock()
            .map_err(|_| SessionError::TurnInProgress)?;
        ensure_connected(self.backend.as_ref())?;

        let state = self.continuation.state(&self.id)?;
        let Some(prompt) = state.last_prompt.clone() else {
            return Ok(None);
        };
        info!(
            session = %self.id,
            iteration = state.iteration,
            "Resuming continuation chain"
        );
        self.run_chain(prompt, state.iteration).await.map(Some)
    }

    /// Cancel the running turn, if any. Idempotent.
    pub fn cancel(&self) {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = current.as_ref() {
            handle.cancel();
        }
    }

    async fn run_chain(
        &self,
        first_prompt: String,
        first_iteration: u32,
    ) -> Result<SessionReport, SessionError> {
        let mut report = SessionReport::default();
        let mut prompt = first_prompt;
        let mut iteration = first_iteration;

        loop {
            let context = PromptContext {
                session_id: self.id.clone(),
                prompt: prompt.clone(),
                iteration,
            };
            self.lifecycle.loop_started(&context).await;
            let submitted = match self.lifecycle.prompt_submitted(&context).await {
                PromptGate::Submit(submitted) => submitted,
                PromptGate::Blocked(reason) => {
                    self.block_prompt(&reason)?;
                    report.blocked = Some(reason);
                    return Ok(report);
                }
            };

            let outcome = self.run_turn(&submitted).await;
            let completed = outcome.is_completed();
            let final_message = outcome.final_message.clone();
            report.outcomes.push(outcome);

            if completed && let Some(text) = &final_message {
                self.lifecycle
                    .message_finalized(&MessageContext {
                        session_id: self.id.clone(),
                        text: text.clone(),
                    })
                    .await;
            }

            if !completed || !self.continuation.has_hooks() {
                return Ok(report);
            }

            match self
                .continuation
                .on_turn_completed(&self.id, final_message.as_deref())
                .await?
            {
                ContinuationOutcome::Continue {
                    prompt: next,
                    iteration: fired,
                } => {
                    iteration = fired;
                    self.notifier.notify(Notification::ContinuationFired {
                        iteration,
                        max_iterations: self.continuation.max_iterations(),
                        prompt: next.clone(),
                    });
                    self.logger.log(ConversationEvent::new(
                        "continuation",
                        json!({
                            "session_id": self.id.as_str(),
                            "iteration": iteration,
                            "prompt": next,
                        }),
                    ));
                    if self.backend.connection_state().is_disconnected() {
                        warn!(session = %self.id, "Backend disconnected, stopping continuation");
                        return Err(SessionError::Disconnected);
                    }
                    prompt = next;
                }
                ContinuationOutcome::Stop { reason, iteration } => {
                    self.notifier
                        .notify(Notification::ContinuationStopped { reason, iteration });
                    self.logger.log(ConversationEvent::new(
                        "continuation_stopped",
                        json!({
                            "session_id": self.id.as_str(),
                            "iteration": iteration,
                            "reason": reason.as_str(),
                        }),
                    ));
                    report.stop_reason = Some(reason);
                    return Ok(report);
                }
            }
        }
    }

    /// A blocked prompt ends the chain: nothing is left to resume.
    fn block_prompt(&self, reason: &str) -> Result<(), SessionError> {
        self.continuation.reset(&self.id)?;
        self.notifier.notify(Notification::PromptBlocked {
            reason: reason.to_string(),
        });
        self.logger.log(ConversationEvent::new(
            "prompt_blocked",
            json!({
                "session_id": self.id.as_str(),
                "reason": reason,
            }),
        ));
        Ok(())
    }

    async fn run_turn(&self, prompt: &str) -> TurnOutcome {
        let id = TurnId::new(self.next_turn.fetch_add(1, Ordering::SeqCst));
        let handle = TurnHandle::new();
        {
            let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
            *current = Some(handle.clone());
        }

        let outcome = self.controller.run(id, prompt, &handle).await;

        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = None;
        outcome
    }
}

fn ensure_connected(backend: &dyn AgentBackend) -> Result<(), SessionError> {
    if backend.connection_state().is_disconnected() {
        return Err(SessionError::Disconnected);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::agent_backend::{ConnectionState, EventStream};
    use crate::ports::continuation::LoopEndContext;
    use crate::ports::lifecycle_hook::PromptVerdict;
    use crate::testing::{RecordingBackend, StaticRegistry, simple_turn};
    use crate::use_cases::hotl::HotlHook;
    use async_trait::async_trait;
    use std::time::Duration;
    use tether_domain::{ContinuationDecision, PendingContinuation, TerminalState};
    use tokio::sync::mpsc;

    struct AlwaysContinue;

    #[async_trait]
    impl ContinuationHook for AlwaysContinue {
        fn name(&self) -> &str {
            "always"
        }

        async fn on_loop_end(&self, _context: &LoopEndContext) -> ContinuationDecision {
            ContinuationDecision::Continue("again".into())
        }
    }

    async fn session_with(
        backend: Arc<RecordingBackend>,
        configure: impl FnOnce(SessionBuilder) -> SessionBuilder,
    ) -> Session {
        configure(Session::builder(backend, Arc::new(StaticRegistry::echo())))
            .create()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_submit_without_hooks_runs_one_turn() {
        let backend = Arc::new(RecordingBackend::new());
        backend.push_events(simple_turn("hello"));
        let session = session_with(backend.clone(), |b| b).await;

        let report = session.submit("hi").await.unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.last().unwrap().final_message.as_deref(), Some("hello"));
        assert!(report.stop_reason.is_none());
        assert_eq!(session.id().as_str(), "test-session");
    }

    #[tokio::test]
    async fn test_continuation_limit_with_always_continue() {
        let backend = Arc::new(RecordingBackend::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = session_with(backend.clone(), |b| {
            b.with_hook(Arc::new(AlwaysContinue))
                .with_params(SessionParams::default().with_max_iterations(3))
                .with_notifier(Arc::new(tx))
        })
        .await;

        let report = session.submit("start").await.unwrap();
        assert_eq!(report.continuations(), 3);
        assert_eq!(
            report.stop_reason,
            Some(StopReason::ContinuationLimitExceeded)
        );
        assert_eq!(
            backend.prompts(),
            vec!["start", "again", "again", "again"]
        );
        drop(session);

        let mut fired = 0;
        let mut stopped = Vec::new();
        while let Ok(notification) = rx.try_recv() {
            match notification {
                Notification::ContinuationFired { .. } => fired += 1,
                Notification::ContinuationStopped { reason, .. } => stopped.push(reason),
                _ => {}
            }
        }
        assert_eq!(fired, 3);
        assert_eq!(stopped, vec![StopReason::ContinuationLimitExceeded]);
    }

    #[tokio::test]
    async fn test_human_prompt_resets_chain() {
        let backend = Arc::new(RecordingBackend::new());
        let session = session_with(backend.clone(), |b| {
            b.with_hook(Arc::new(AlwaysContinue))
                .with_params(SessionParams::default().with_max_iterations(1))
        })
        .await;

        let first = session.submit("one").await.unwrap();
        let second = session.submit("two").await.unwrap();
        assert_eq!(first.continuations(), 1);
        assert_eq!(second.continuations(), 1);
    }

    #[tokio::test]
    async fn test_hotl_stops_on_promise() {
        let backend = Arc::new(RecordingBackend::new());
        backend.push_events(simple_turn("working on it"));
        backend.push_events(simple_turn("done <promise>SHIPPED</promise>"));
        let session = session_with(backend.clone(), |b| {
            b.with_hook(Arc::new(HotlHook::new("ship it").with_promise("SHIPPED")))
        })
        .await;

        let report = session.submit("ship it").await.unwrap();
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.stop_reason, Some(StopReason::HooksDeclined));
        assert!(backend.prompts()[1].starts_with("<system-reminder>\nHOTL iteration 1/10"));
    }

    #[tokio::test]
    async fn test_concurrent_submit_is_rejected() {
        let backend = Arc::new(RecordingBackend::new());
        let (tx, stream) = EventStream::channel(4);
        backend.push_stream(stream);
        let session = Arc::new(session_with(backend.clone(), |b| b).await);

        let running = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.submit("first").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(session.is_busy());
        assert!(matches!(
            session.submit("second").await,
            Err(SessionError::TurnInProgress)
        ));

        for event in simple_turn("ok") {
            tx.send(Ok(event)).await.unwrap();
        }
        let report = running.await.unwrap().unwrap();
        assert_eq!(report.last().unwrap().state, TerminalState::Completed);
    }

    #[tokio::test]
    async fn test_cancel_stops_chain() {
        let backend = Arc::new(RecordingBackend::new());
        let (_tx, stream) = EventStream::channel(4);
        backend.push_stream(stream);
        let session = Arc::new(
            session_with(backend.clone(), |b| b.with_hook(Arc::new(AlwaysContinue))).await,
        );

        let running = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.submit("first").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.cancel();
        session.cancel();

        let report = running.await.unwrap().unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.last().unwrap().state, TerminalState::Cancelled);
        assert_eq!(backend.cancel_count(), 1);
    }

    #[tokio::test]
    async fn test_disconnected_backend_refuses_submit() {
        let backend = Arc::new(RecordingBackend::new());
        let session = session_with(backend.clone(), |b| b).await;
        backend.set_state(ConnectionState::Disconnected);

        assert!(matches!(
            session.submit("hi").await,
            Err(SessionError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_resume_continuation_from_store() {
        let backend = Arc::new(RecordingBackend::new());
        let store = Arc::new(InMemoryContinuationStore::new());
        let session_id = SessionId::parse("test-session").unwrap();
        let mut state = PendingContinuation::new(3);
        state.advance("pick up where you left off");
        state.advance("pick up where you left off");
        store.save(&session_id, &state).unwrap();

        let session = Session::builder(backend.clone(), Arc::new(StaticRegistry::echo()))
            .with_store(store)
            .with_hook(Arc::new(AlwaysContinue))
            .with_params(SessionParams::default().with_max_iterations(3))
            .resume(session_id.clone())
            .await
            .unwrap();

        let report = session.resume_continuation().await.unwrap().unwrap();
        // Iterations 2 of 3 were used: one more continuation, then the limit.
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(
            report.stop_reason,
            Some(StopReason::ContinuationLimitExceeded)
        );
        assert_eq!(backend.prompts()[0], "pick up where you left off");
        assert_eq!(backend.resumed(), vec![session_id]);
    }

    #[tokio::test]
    async fn test_resume_continuation_without_state() {
        let backend = Arc::new(RecordingBackend::new());
        let session = session_with(backend, |b| b).await;
        assert!(session.resume_continuation().await.unwrap().is_none());
    }

    /// Blocks prompts containing "deploy", tags every other one and records
    /// the events it sees.
    struct PromptPolicy {
        seen: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LifecycleHook for PromptPolicy {
        fn name(&self) -> &str {
            "prompt-policy"
        }

        async fn on_loop_start(&self, context: &PromptContext) {
            self.seen
                .lock()
                .unwrap()
                .push(format!("start:{}", context.iteration));
        }

        async fn on_prompt_submit(&self, context: &PromptContext) -> PromptVerdict {
            if context.prompt.contains("deploy") {
                PromptVerdict::Block("deploys need a human".into())
            } else {
                PromptVerdict::Inject("cwd is clean".into())
            }
        }

        async fn on_message(&self, context: &MessageContext) {
            self.seen
                .lock()
                .unwrap()
                .push(format!("message:{}", context.text));
        }
    }

    fn prompt_policy() -> Arc<PromptPolicy> {
        Arc::new(PromptPolicy {
            seen: std::sync::Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_prompt_hook_injects_message() {
        let backend = Arc::new(RecordingBackend::new());
        backend.push_events(simple_turn("sure"));
        let policy = prompt_policy();
        let session = session_with(backend.clone(), |b| b.with_lifecycle_hook(policy.clone())).await;

        let report = session.submit("tidy up").await.unwrap();
        assert!(report.blocked.is_none());
        assert_eq!(
            backend.prompts(),
            vec!["tidy up\n\n<user-prompt-submit-hook>\ncwd is clean\n</user-prompt-submit-hook>"]
        );
        assert_eq!(
            *policy.seen.lock().unwrap(),
            vec!["start:0".to_string(), "message:sure".to_string()]
        );
    }

    #[tokio::test]
    async fn test_blocked_prompt_runs_no_turn() {
        let backend = Arc::new(RecordingBackend::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = session_with(backend.clone(), |b| {
            b.with_lifecycle_hook(prompt_policy())
                .with_notifier(Arc::new(tx))
        })
        .await;

        let report = session.submit("deploy to prod").await.unwrap();
        assert!(report.outcomes.is_empty());
        assert_eq!(report.blocked.as_deref(), Some("deploys need a human"));
        assert!(backend.prompts().is_empty());
        drop(session);

        let mut blocked = Vec::new();
        while let Ok(notification) = rx.try_recv() {
            if let Notification::PromptBlocked { reason } = notification {
                blocked.push(reason);
            }
        }
        assert_eq!(blocked, vec!["deploys need a human".to_string()]);
    }

    /// Continues once with a prompt the policy refuses.
    struct DeployNext;

    #[async_trait]
    impl ContinuationHook for DeployNext {
        fn name(&self) -> &str {
            "deploy-next"
        }

        async fn on_loop_end(&self, _context: &LoopEndContext) -> ContinuationDecision {
            ContinuationDecision::Continue("now deploy".into())
        }
    }

    #[tokio::test]
    async fn test_blocked_continuation_prompt_ends_chain() {
        let backend = Arc::new(RecordingBackend::new());
        let store = Arc::new(InMemoryContinuationStore::new());
        let policy = prompt_policy();
        let session = session_with(backend.clone(), |b| {
            b.with_hook(Arc::new(DeployNext))
                .with_lifecycle_hook(policy.clone())
                .with_store(store.clone())
        })
        .await;

        let report = session.submit("build it").await.unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.blocked.as_deref(), Some("deploys need a human"));
        assert_eq!(backend.prompts().len(), 1);
        assert!(session.resume_continuation().await.unwrap().is_none());
        assert_eq!(policy.seen.lock().unwrap()[..2], ["start:0", "message:done"]);
        assert_eq!(policy.seen.lock().unwrap()[2], "start:1");
    }
}

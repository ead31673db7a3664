//! Tool call dispatch.
//!
//! [`ToolCallDispatcher`] runs one materialized call against the registry.
//! [`DispatchQueue`] is the turn-scoped FIFO in front of it: calls execute
//! one at a time on a spawned task so the event loop keeps draining the
//! stream while a tool runs. Lifecycle hooks, when set, run on that same
//! task: `on_tool_start` can block a call before it reaches the registry.

use crate::ports::lifecycle_hook::{ToolEndContext, ToolStartContext};
use crate::ports::notification::{Notification, NotificationSink};
use crate::ports::tool_registry::ToolRegistryPort;
use crate::use_cases::lifecycle::LifecycleHooks;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tether_domain::util::preview;
use tether_domain::{SessionId, ToolCall, ToolError, ToolExecution, ToolResult};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Executes tool calls against a [`ToolRegistryPort`].
pub struct ToolCallDispatcher {
    registry: Arc<dyn ToolRegistryPort>,
}

impl ToolCallDispatcher {
    pub fn new(registry: Arc<dyn ToolRegistryPort>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<dyn ToolRegistryPort> {
        &self.registry
    }

    /// Run `call`, honoring `cancel`.
    ///
    /// Never fails: an unknown tool, a handler error and cancellation all
    /// come back as a failed [`ToolResult`].
    pub async fn dispatch(&self, call: &ToolCall, cancel: CancellationToken) -> ToolResult {
        let Some(handler) = self.registry.lookup(&call.tool_name) else {
            warn!(tool = %call.tool_name, call_id = %call.id, "Unknown tool requested");
            return ToolResult::failure(&call.tool_name, ToolError::not_found(&call.tool_name));
        };

        if cancel.is_cancelled() {
            return ToolResult::failure(&call.tool_name, ToolError::cancelled());
        }

        let started = Instant::now();
        debug!(tool = %call.tool_name, call_id = %call.id, "Executing tool");
        let result = handler.execute(call, cancel.clone()).await;
        let elapsed = started.elapsed().as_millis() as u64;

        // A handler that ignored the token still reports Cancelled.
        if cancel.is_cancelled() && !result.error().is_some_and(ToolError::is_cancelled) {
            return ToolResult::failure(&call.tool_name, ToolError::cancelled())
                .with_duration(elapsed);
        }

        let duration_ms = result.metadata.duration_ms.unwrap_or(elapsed);
        result.with_duration(duration_ms)
    }
}

/// A finished dispatch, delivered back to the event loop.
#[derive(Debug, Clone)]
pub struct DispatchCompletion {
    pub call_id: String,
    pub result: ToolResult,
}

/// Turn-scoped FIFO of materialized tool calls.
///
/// At most one call runs at a time. Each runs with a child of the queue's
/// token, and results are cached by call id for the approval correlator.
pub struct DispatchQueue {
    dispatcher: Arc<ToolCallDispatcher>,
    notifier: Arc<dyn NotificationSink>,
    token: CancellationToken,
    pending: VecDeque<ToolCall>,
    running: Option<String>,
    executions: HashMap<String, ToolExecution>,
    results: HashMap<String, ToolResult>,
    completion_tx: mpsc::UnboundedSender<DispatchCompletion>,
    completion_rx: mpsc::UnboundedReceiver<DispatchCompletion>,
    hooks: Option<(SessionId, LifecycleHooks)>,
}

impl DispatchQueue {
    pub fn new(
        dispatcher: Arc<ToolCallDispatcher>,
        notifier: Arc<dyn NotificationSink>,
        token: CancellationToken,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            dispatcher,
            notifier,
            token,
            pending: VecDeque::new(),
            running: None,
            executions: HashMap::new(),
            results: HashMap::new(),
            completion_tx,
            completion_rx,
            hooks: None,
        }
    }

    /// Run `hooks` around every call of `session`.
    pub fn with_hooks(mut self, session: SessionId, hooks: LifecycleHooks) -> Self {
        if !hooks.is_empty() {
            self.hooks = Some((session, hooks));
        }
        self
    }

    /// Queue a call. Returns `false` if a call with the same id was
    /// already queued, run or finished.
    pub fn enqueue(&mut self, call: ToolCall) -> bool {
        if self.executions.contains_key(&call.id) {
            warn!(call_id = %call.id, "Tool call already dispatched, ignoring");
            return false;
        }
        self.executions
            .insert(call.id.clone(), ToolExecution::new(call.clone()));
        self.pending.push_back(call);
        self.start_next();
        true
    }

    /// Whether the call id has ever been queued.
    pub fn is_known(&self, call_id: &str) -> bool {
        self.executions.contains_key(call_id)
    }

    /// Whether a call is currently executing.
    pub fn is_busy(&self) -> bool {
        self.running.is_some()
    }

    pub fn result(&self, call_id: &str) -> Option<&ToolResult> {
        self.results.get(call_id)
    }

    pub fn execution(&self, call_id: &str) -> Option<&ToolExecution> {
        self.executions.get(call_id)
    }

    /// Wait for the running call to finish.
    ///
    /// Pends forever when nothing is running; guard with [`is_busy`].
    ///
    /// [`is_busy`]: DispatchQueue::is_busy
    pub async fn next_completion(&mut self) -> Option<DispatchCompletion> {
        self.completion_rx.recv().await
    }

    /// Record a finished call and start the next queued one.
    pub fn complete(&mut self, completion: DispatchCompletion) {
        if self.running.as_deref() == Some(completion.call_id.as_str()) {
            self.running = None;
        }

        if let Some(execution) = self.executions.get_mut(&completion.call_id) {
            execution.finish(completion.result.clone());
            self.notifier.notify(Notification::ToolCompleted {
                id: completion.call_id.clone(),
                name: execution.tool_name().to_string(),
                success: completion.result.is_success(),
                preview: preview(&completion.result.wire_output(), 200),
                duration_ms: completion.result.metadata.duration_ms,
            });
        }
        info!(
            call_id = %completion.call_id,
            success = completion.result.is_success(),
            "Tool call finished"
        );
        self.results
            .insert(completion.call_id, completion.result);
        self.start_next();
    }

    /// Cancel the running call and drop everything still queued.
    pub fn shutdown(&mut self) {
        self.token.cancel();
        for call in self.pending.drain(..) {
            if let Some(execution) = self.executions.get_mut(&call.id) {
                execution.finish(ToolResult::failure(&call.tool_name, ToolError::cancelled()));
            }
        }
    }

    fn start_next(&mut self) {
        if self.running.is_some() || self.token.is_cancelled() {
            return;
        }
        let Some(call) = self.pending.pop_front() else {
            return;
        };

        if let Some(execution) = self.executions.get_mut(&call.id) {
            execution.mark_running();
        }
        self.notifier.notify(Notification::ToolRunning {
            id: call.id.clone(),
            name: call.tool_name.clone(),
        });
        self.running = Some(call.id.clone());

        let dispatcher = Arc::clone(&self.dispatcher);
        let token = self.token.child_token();
        let call_id = call.id.clone();
        let tool_name = call.tool_name.clone();
        let tx = self.completion_tx.clone();
        let hooks = self.hooks.clone();

        let task = tokio::spawn(async move {
            let Some((session, hooks)) = hooks else {
                return dispatcher.dispatch(&call, token).await;
            };
            let start = ToolStartContext::new(session.clone(), &call);
            let result = match hooks.tool_starting(&start).await {
                Some(reason) => ToolResult::failure(&call.tool_name, ToolError::blocked(reason)),
                None => dispatcher.dispatch(&call, token).await,
            };
            hooks
                .tool_ended(&ToolEndContext::new(session, &call, &result))
                .await;
            result
        });
        tokio::spawn(async move {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(call_id = %call_id, error = %e, "Tool task failed");
                    ToolResult::failure(
                        &tool_name,
                        ToolError::execution_failed(format!("Tool task failed: {}", e)),
                    )
                }
            };
            // The queue is gone once its turn ended; nothing left to tell.
            let _ = tx.send(DispatchCompletion { call_id, result });
        });
    }
}

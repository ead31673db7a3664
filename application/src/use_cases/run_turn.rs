//! Turn controller.
//!
//! Drives one conversational turn end to end: submits the prompt, consumes
//! the event stream in arrival order, assembles tool calls, dispatches them
//! and answers approval requests, until the turn reaches a terminal state.
//!
//! ```text
//! Idle ─▶ Submitting ─▶ Streaming ⇄ AwaitingApproval ─▶ Completing ─▶ Terminal
//! ```
//!
//! The loop is a single `tokio::select!` over, in priority order:
//! cancellation, tool completions, approval deadlines and stream events.
//! Only the loop touches the assembler and the turn, so events are never
//! processed concurrently.

use crate::ports::agent_backend::{AgentBackend, BackendError, EventStream};
use crate::ports::conversation_logger::{ConversationEvent, ConversationLogger};
use crate::ports::notification::{Notification, NotificationSink};
use crate::use_cases::approval::{ApprovalCorrelator, CANCELLED_OUTPUT};
use crate::use_cases::dispatch::{DispatchQueue, ToolCallDispatcher};
use crate::use_cases::lifecycle::LifecycleHooks;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tether_domain::{
    ApprovalRequest, AssemblyOutput, MessageAssembler, ProtocolEvent, SessionId, TerminalState,
    Turn, TurnEndReason, TurnId, TurnState,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Reason recorded when the transport goes away mid-turn.
pub const DISCONNECTED_REASON: &str = "transport disconnected";

/// Cancels a running turn from any task.
///
/// Cancelling is idempotent; the controller observes it exactly once.
#[derive(Debug, Clone, Default)]
pub struct TurnHandle {
    token: CancellationToken,
}

impl TurnHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// How a turn ended.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub state: TerminalState,
    /// Human-readable reason
    pub reason: String,
    /// Last finalized assistant text, if any
    pub final_message: Option<String>,
    pub turn: Turn,
}

impl TurnOutcome {
    pub fn is_completed(&self) -> bool {
        self.state == TerminalState::Completed
    }
}

/// Runs turns for one session.
pub struct TurnController {
    backend: Arc<dyn AgentBackend>,
    dispatcher: Arc<ToolCallDispatcher>,
    notifier: Arc<dyn NotificationSink>,
    logger: Arc<dyn ConversationLogger>,
    session: SessionId,
    approval_timeout: Option<Duration>,
    hooks: LifecycleHooks,
}

/// Mutable state of the turn being driven.
struct TurnRun {
    turn: Turn,
    assembler: MessageAssembler,
    queue: DispatchQueue,
    correlator: ApprovalCorrelator,
    end_reason: Option<TurnEndReason>,
}

impl TurnController {
    pub fn new(
        backend: Arc<dyn AgentBackend>,
        dispatcher: Arc<ToolCallDispatcher>,
        notifier: Arc<dyn NotificationSink>,
        logger: Arc<dyn ConversationLogger>,
        session: SessionId,
    ) -> Self {
        Self {
            backend,
            dispatcher,
            notifier,
            logger,
            session,
            approval_timeout: None,
            hooks: LifecycleHooks::new(),
        }
    }

    /// Hooks run around every tool call of every turn.
    pub fn with_hooks(mut self, hooks: LifecycleHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_approval_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.approval_timeout = timeout;
        self
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Drive a turn for `prompt` to completion.
    pub async fn run(&self, id: TurnId, prompt: &str, handle: &TurnHandle) -> TurnOutcome {
        let cancel = handle.token().clone();
        let mut run = TurnRun {
            turn: Turn::new(id, prompt),
            assembler: MessageAssembler::new(),
            queue: DispatchQueue::new(
                Arc::clone(&self.dispatcher),
                Arc::clone(&self.notifier),
                cancel.child_token(),
            )
            .with_hooks(self.session.clone(), self.hooks.clone()),
            correlator: ApprovalCorrelator::new(
                Arc::clone(&self.backend),
                self.session.clone(),
                Arc::clone(&self.notifier),
                Arc::clone(&self.logger),
                self.approval_timeout,
            ),
            end_reason: None,
        };

        info!(session = %self.session, turn = %id, "Starting turn");
        self.transition(&mut run.turn, TurnState::Submitting);

        let submitted = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.backend.submit_prompt(&self.session, prompt) => Some(result),
        };

        let mut stream = match submitted {
            None => return self.finish_cancelled(run).await,
            Some(Ok(stream)) => stream,
            Some(Err(e)) => {
                warn!(error = %e, "Prompt submission failed");
                if e.is_disconnected() {
                    self.notifier.notify(Notification::Disconnected {
                        reason: e.to_string(),
                    });
                }
                let reason = if e.is_disconnected() {
                    DISCONNECTED_REASON.to_string()
                } else {
                    format!("submit failed: {}", e)
                };
                return self.finish(run, TerminalState::Failed, reason).await;
            }
        };

        self.drive(run, &mut stream, &cancel).await
    }

    async fn drive(
        &self,
        mut run: TurnRun,
        stream: &mut EventStream,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let mut stream_done = false;

        loop {
            if run.turn.state() == TurnState::Completing && !run.turn.has_pending_approvals() {
                return match run.end_reason {
                    Some(TurnEndReason::Cancelled) => {
                        self.finish(run, TerminalState::Cancelled, "cancelled by backend")
                            .await
                    }
                    reason => {
                        let reason = reason.unwrap_or(TurnEndReason::EndTurn).to_string();
                        self.finish(run, TerminalState::Completed, reason).await
                    }
                };
            }

            let deadline = run.correlator.next_deadline();
            if stream_done
                && !run.queue.is_busy()
                && deadline.is_none()
                && run.turn.has_pending_approvals()
            {
                // Nothing left that could satisfy the remaining approvals.
                warn!(
                    pending = run.turn.pending_approvals().len(),
                    "Approvals left without a tool result"
                );
                run.correlator
                    .flush(&mut run.turn, "Tool result unavailable")
                    .await;
                continue;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return self.finish_cancelled(run).await;
                }
                Some(completion) = run.queue.next_completion(), if run.queue.is_busy() => {
                    run.queue.complete(completion.clone());
                    run.correlator
                        .on_result(&mut run.turn, &completion.call_id, &completion.result)
                        .await;
                    self.settle_approval_state(&mut run.turn);
                }
                _ = sleep_until(deadline), if deadline.is_some() => {
                    run.correlator
                        .expire(&mut run.turn, tokio::time::Instant::now())
                        .await;
                    self.settle_approval_state(&mut run.turn);
                }
                item = stream.next(), if !stream_done => match item {
                    Some(Ok(event)) => {
                        if self.handle_event(&mut run, event).await {
                            stream_done = true;
                        }
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "Event stream failed");
                        return self.fail_transport(run, e).await;
                    }
                    None => {
                        warn!("Event stream ended before turn_end");
                        return self.fail_transport(run, BackendError::Disconnected).await;
                    }
                },
            }
        }
    }

    /// Process one event. Returns `true` on `turn_end`.
    async fn handle_event(&self, run: &mut TurnRun, event: ProtocolEvent) -> bool {
        run.turn.record_event(&event);
        self.logger.log(ConversationEvent::new(
            "protocol_event",
            serde_json::to_value(&event).unwrap_or_else(|_| json!({ "type": event.type_name() })),
        ));

        if run.turn.state() == TurnState::Submitting {
            self.transition(&mut run.turn, TurnState::Streaming);
        }

        for output in run.assembler.push(&event) {
            self.handle_output(run, output).await;
        }

        match event {
            ProtocolEvent::ApprovalRequest {
                id,
                tool_call_id,
                name,
                arguments,
            } => {
                let call_streaming = run.assembler.is_open(&tool_call_id);
                let request = ApprovalRequest::new(id, tool_call_id).with_tool(name, arguments);
                self.transition(&mut run.turn, TurnState::AwaitingApproval);
                run.correlator
                    .on_request(&mut run.turn, request, &mut run.queue, call_streaming)
                    .await;
                self.settle_approval_state(&mut run.turn);
                false
            }
            ProtocolEvent::TurnEnd { reason } => {
                info!(reason = %reason, "Backend ended turn");
                run.end_reason = Some(reason);
                self.transition(&mut run.turn, TurnState::Completing);
                true
            }
            ProtocolEvent::Error { detail } => {
                warn!(detail = %detail, "Backend reported an error");
                self.notifier
                    .notify(Notification::BackendError { detail });
                false
            }
            ProtocolEvent::Unknown { raw } => {
                debug!(event = %raw, "Ignoring unknown event");
                false
            }
            _ => false,
        }
    }

    async fn handle_output(&self, run: &mut TurnRun, output: AssemblyOutput) {
        match output {
            AssemblyOutput::Chunk { kind, text } => {
                self.notifier.notify(Notification::Chunk { kind, text });
            }
            AssemblyOutput::MessageFinalized(message) => {
                self.notifier
                    .notify(Notification::MessageFinalized(message));
            }
            AssemblyOutput::ToolCallStarted { id, name } => {
                self.notifier
                    .notify(Notification::ToolCallStarted { id, name });
            }
            AssemblyOutput::ToolCallReady(call) => {
                debug!(call_id = %call.id, tool = %call.tool_name, "Tool call assembled");
                self.notifier.notify(Notification::ToolCallReady {
                    id: call.id.clone(),
                    name: call.tool_name.clone(),
                });
                run.queue.enqueue(call);
            }
            AssemblyOutput::ToolCallFailed { id, name, error } => {
                warn!(call_id = %id, tool = %name, error = %error, "Tool call failed to assemble");
                let message = error.to_string();
                self.notifier.notify(Notification::ToolCallFailed {
                    id: id.clone(),
                    name,
                    message: message.clone(),
                });
                run.turn.record_rejection(message.clone());
                run.correlator
                    .on_call_failed(&mut run.turn, &id, message)
                    .await;
                self.settle_approval_state(&mut run.turn);
            }
            AssemblyOutput::Rejected(error) => {
                warn!(error = %error, "Rejected out-of-order event");
                run.turn.record_rejection(error.to_string());
            }
        }
    }

    /// Leave `AwaitingApproval` once nothing is pending.
    fn settle_approval_state(&self, turn: &mut Turn) {
        if turn.state() == TurnState::AwaitingApproval && !turn.has_pending_approvals() {
            self.transition(turn, TurnState::Streaming);
        }
    }

    fn transition(&self, turn: &mut Turn, next: TurnState) {
        let from = turn.state();
        match turn.transition(next) {
            Ok(()) if from != next => {
                debug!(turn = %turn.id(), from = %from, to = %next, "Turn state changed");
                self.notifier.notify(Notification::StateChanged {
                    turn: turn.id(),
                    from,
                    to: next,
                });
            }
            Ok(()) => {}
            Err(e) => error!(error = %e, "Illegal turn transition ignored"),
        }
    }

    async fn finish_cancelled(&self, mut run: TurnRun) -> TurnOutcome {
        info!(turn = %run.turn.id(), "Turn cancelled");
        run.queue.shutdown();
        run.correlator
            .flush(&mut run.turn, CANCELLED_OUTPUT)
            .await;
        if let Err(e) = self.backend.cancel_turn(&self.session).await {
            warn!(error = %e, "Failed to send cancel to backend");
        }
        self.finish(run, TerminalState::Cancelled, CANCELLED_OUTPUT)
            .await
    }

    async fn fail_transport(&self, run: TurnRun, error: BackendError) -> TurnOutcome {
        let reason = if error.is_disconnected() {
            self.notifier.notify(Notification::Disconnected {
                reason: error.to_string(),
            });
            DISCONNECTED_REASON.to_string()
        } else {
            error.to_string()
        };
        self.finish(run, TerminalState::Failed, reason).await
    }

    async fn finish(
        &self,
        mut run: TurnRun,
        state: TerminalState,
        reason: impl Into<String>,
    ) -> TurnOutcome {
        let reason = reason.into();
        run.queue.shutdown();

        // Nothing may stay pending once the turn is terminal.
        if run.turn.has_pending_approvals() {
            run.correlator.flush(&mut run.turn, &reason).await;
        }
        if state != TerminalState::Completed {
            // A failed turn still reports what was said before it broke.
            for output in run.assembler.finish() {
                if let AssemblyOutput::MessageFinalized(message) = output {
                    self.notifier
                        .notify(Notification::MessageFinalized(message));
                }
            }
        }

        let from = run.turn.state();
        match run.turn.terminate(state, reason.clone()) {
            Ok(()) => self.notifier.notify(Notification::StateChanged {
                turn: run.turn.id(),
                from,
                to: TurnState::Terminal(state),
            }),
            Err(e) => error!(error = %e, "Illegal turn transition ignored"),
        }

        info!(turn = %run.turn.id(), outcome = %state, reason = %reason, "Turn finished");
        self.notifier.notify(Notification::TurnFinished {
            turn: run.turn.id(),
            outcome: state,
            reason: reason.clone(),
        });
        self.logger.log(ConversationEvent::new(
            "turn_finished",
            json!({
                "session_id": self.session.as_str(),
                "turn": run.turn.id().value(),
                "outcome": state.as_str(),
                "reason": reason,
                "final_message": run.assembler.final_message(),
            }),
        ));

        TurnOutcome {
            state,
            reason,
            final_message: run.assembler.final_message().map(str::to_string),
            turn: run.turn,
        }
    }
}

/// Sleep until `deadline`, or forever when there is none.
async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

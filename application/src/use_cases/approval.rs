//! Approval correlation.
//!
//! The backend asks for approval of a tool call it streamed earlier. The
//! correlator waits for the dispatcher's result for that call, whether it is
//! already cached or still running, and answers with an approval response
//! carrying the output. Several approvals may be pending at once; tool
//! execution itself stays serialized in the [`DispatchQueue`].

use crate::ports::agent_backend::AgentBackend;
use crate::ports::conversation_logger::{ConversationEvent, ConversationLogger};
use crate::ports::notification::{Notification, NotificationSink};
use crate::use_cases::dispatch::DispatchQueue;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tether_domain::{ApprovalRequest, ApprovalResponse, SessionId, ToolCall, ToolResult, Turn};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Output sent for every approval still pending when a turn is cancelled.
pub const CANCELLED_OUTPUT: &str = "Cancelled by user";

/// Turn-scoped approval correlator.
///
/// Pending approvals themselves live on the [`Turn`], so every response is
/// recorded in the turn log and no request is answered twice.
pub struct ApprovalCorrelator {
    backend: Arc<dyn AgentBackend>,
    session: SessionId,
    notifier: Arc<dyn NotificationSink>,
    logger: Arc<dyn ConversationLogger>,
    timeout: Option<Duration>,
    /// Calls that can never run, with the reason
    failed: HashMap<String, String>,
    deadlines: HashMap<String, Instant>,
}

impl ApprovalCorrelator {
    pub fn new(
        backend: Arc<dyn AgentBackend>,
        session: SessionId,
        notifier: Arc<dyn NotificationSink>,
        logger: Arc<dyn ConversationLogger>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            backend,
            session,
            notifier,
            logger,
            timeout,
            failed: HashMap::new(),
            deadlines: HashMap::new(),
        }
    }

    /// Handle an `approval_request`.
    ///
    /// `call_streaming` is true while the assembler still holds an open
    /// accumulator for the request's tool call. The approval then waits for
    /// the assembled call to be dispatched instead of running the request's
    /// own, possibly partial, name and arguments.
    pub async fn on_request(
        &mut self,
        turn: &mut Turn,
        request: ApprovalRequest,
        queue: &mut DispatchQueue,
        call_streaming: bool,
    ) {
        if turn.is_pending(&request.id) {
            warn!(approval_id = %request.id, "Duplicate approval request ignored");
            return;
        }

        self.notifier.notify(Notification::PermissionRequested {
            id: request.id.clone(),
            tool_call_id: request.tool_call_id.clone(),
            tool_name: request.tool_name.clone(),
        });
        turn.add_pending_approval(request.clone());

        if let Some(result) = queue.result(&request.tool_call_id) {
            let response = ApprovalResponse::from_result(&request, result);
            self.respond(turn, response).await;
            return;
        }

        if let Some(message) = self.failed.get(&request.tool_call_id) {
            let response = ApprovalResponse::error(&request, message.clone());
            self.respond(turn, response).await;
            return;
        }

        if call_streaming {
            debug!(
                approval_id = %request.id,
                call_id = %request.tool_call_id,
                "Tool call still streaming, approval waits for its dispatch"
            );
        } else if !queue.is_known(&request.tool_call_id) {
            match materialize(&request) {
                Ok(call) => {
                    debug!(
                        approval_id = %request.id,
                        call_id = %call.id,
                        "Dispatching tool call carried by approval request"
                    );
                    queue.enqueue(call);
                }
                Err(message) => {
                    let response = ApprovalResponse::error(&request, message);
                    self.respond(turn, response).await;
                    return;
                }
            }
        }

        if let Some(timeout) = self.timeout {
            self.deadlines
                .insert(request.id.clone(), Instant::now() + timeout);
        }
    }

    /// A dispatched call finished: answer every approval waiting on it.
    pub async fn on_result(&mut self, turn: &mut Turn, call_id: &str, result: &ToolResult) {
        let waiting: Vec<ApprovalRequest> = turn
            .pending_approvals()
            .iter()
            .filter(|r| r.tool_call_id == call_id)
            .cloned()
            .collect();
        for request in waiting {
            let response = ApprovalResponse::from_result(&request, result);
            self.respond(turn, response).await;
        }
    }

    /// A streamed call failed to assemble and will never run.
    pub async fn on_call_failed(&mut self, turn: &mut Turn, call_id: &str, message: String) {
        self.failed.insert(call_id.to_string(), message.clone());
        let waiting: Vec<ApprovalRequest> = turn
            .pending_approvals()
            .iter()
            .filter(|r| r.tool_call_id == call_id)
            .cloned()
            .collect();
        for request in waiting {
            let response = ApprovalResponse::error(&request, message.clone());
            self.respond(turn, response).await;
        }
    }

    /// Answer every pending approval with an error.
    ///
    /// Returns the number of responses sent.
    pub async fn flush(&mut self, turn: &mut Turn, message: &str) -> usize {
        let pending: Vec<ApprovalRequest> = turn.pending_approvals().to_vec();
        let count = pending.len();
        for request in pending {
            let response = ApprovalResponse::error(&request, message);
            self.respond(turn, response).await;
        }
        count
    }

    /// Earliest approval deadline, if a timeout is configured.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Answer every approval whose deadline has passed.
    pub async fn expire(&mut self, turn: &mut Turn, now: Instant) {
        let Some(timeout) = self.timeout else {
            return;
        };
        let expired: Vec<String> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();

        for approval_id in expired {
            self.deadlines.remove(&approval_id);
            let request = turn
                .pending_approvals()
                .iter()
                .find(|r| r.id == approval_id)
                .cloned();
            if let Some(request) = request {
                warn!(approval_id = %approval_id, "Approval timed out");
                let response = ApprovalResponse::error(
                    &request,
                    format!("Approval timed out after {}s", timeout.as_secs()),
                );
                self.respond(turn, response).await;
            }
        }
    }

    async fn respond(&mut self, turn: &mut Turn, response: ApprovalResponse) {
        if turn.resolve_approval(&response).is_none() {
            return;
        }
        self.deadlines.remove(&response.id);

        info!(
            approval_id = %response.id,
            call_id = %response.tool_call_id,
            status = response.status.as_str(),
            "Sending approval response"
        );
        self.notifier.notify(Notification::PermissionResponded {
            id: response.id.clone(),
            tool_call_id: response.tool_call_id.clone(),
            status: response.status,
        });
        self.logger.log(ConversationEvent::new(
            "approval_response",
            serde_json::to_value(&response).unwrap_or(Value::Null),
        ));

        if let Err(e) = self
            .backend
            .send_approval_response(&self.session, &response)
            .await
        {
            warn!(approval_id = %response.id, error = %e, "Failed to send approval response");
        }
    }
}

/// Build a call from an approval request's own name and arguments.
fn materialize(request: &ApprovalRequest) -> Result<ToolCall, String> {
    let Some(name) = request.tool_name.as_deref() else {
        return Err(format!(
            "Unknown tool call: {} (no tool name in approval request)",
            request.tool_call_id
        ));
    };
    let arguments = match &request.arguments {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(raw)) => tether_domain::stream::parse_arguments(raw)
            .map_err(|e| format!("Invalid arguments for {}: {}", name, e))?,
        Some(_) => {
            return Err(format!(
                "Invalid arguments for {}: expected a JSON object",
                name
            ));
        }
    };
    Ok(ToolCall::new(request.tool_call_id.clone(), name).with_arguments(arguments))
}

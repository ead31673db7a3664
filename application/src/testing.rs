//! Test doubles shared by the use case tests.

use crate::ports::agent_backend::{AgentBackend, BackendError, ConnectionState, EventStream};
use crate::ports::tool_registry::{ToolHandler, ToolRegistryPort};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tether_domain::{
    ApprovalResponse, ProtocolEvent, SessionId, ToolCall, ToolDefinition, ToolError, ToolResult,
    TurnEndReason,
};
use tokio_util::sync::CancellationToken;

/// Backend that replays scripted turns and records what it was sent.
pub(crate) struct RecordingBackend {
    scripts: Mutex<VecDeque<Result<EventStream, BackendError>>>,
    approvals: Mutex<Vec<ApprovalResponse>>,
    prompts: Mutex<Vec<String>>,
    resumed: Mutex<Vec<SessionId>>,
    cancels: AtomicUsize,
    state: Mutex<ConnectionState>,
}

impl RecordingBackend {
    pub(crate) fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            approvals: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            resumed: Mutex::new(Vec::new()),
            cancels: AtomicUsize::new(0),
            state: Mutex::new(ConnectionState::Connected),
        }
    }

    /// Queue a turn whose stream yields `events` and then closes.
    pub(crate) fn push_events(&self, events: Vec<ProtocolEvent>) {
        let (tx, stream) = EventStream::channel(events.len().max(1));
        for event in events {
            tx.try_send(Ok(event)).unwrap();
        }
        self.scripts.lock().unwrap().push_back(Ok(stream));
    }

    /// Queue a turn driven by the caller through the returned stream's sender.
    pub(crate) fn push_stream(&self, stream: EventStream) {
        self.scripts.lock().unwrap().push_back(Ok(stream));
    }

    pub(crate) fn push_submit_error(&self, error: BackendError) {
        self.scripts.lock().unwrap().push_back(Err(error));
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap() = state;
    }

    pub(crate) fn approvals(&self) -> Vec<ApprovalResponse> {
        self.approvals.lock().unwrap().clone()
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub(crate) fn resumed(&self) -> Vec<SessionId> {
        self.resumed.lock().unwrap().clone()
    }

    pub(crate) fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

/// A turn that says `text` and ends normally.
pub(crate) fn simple_turn(text: &str) -> Vec<ProtocolEvent> {
    vec![
        ProtocolEvent::TextChunk {
            text: text.to_string(),
        },
        ProtocolEvent::TurnEnd {
            reason: TurnEndReason::EndTurn,
        },
    ]
}

#[async_trait]
impl AgentBackend for RecordingBackend {
    async fn create_session(
        &self,
        _cwd: &Path,
        _tools: &[ToolDefinition],
    ) -> Result<SessionId, BackendError> {
        SessionId::parse("test-session").map_err(|e| BackendError::Protocol(e.to_string()))
    }

    async fn resume_session(&self, session: &SessionId, _cwd: &Path) -> Result<(), BackendError> {
        self.resumed.lock().unwrap().push(session.clone());
        Ok(())
    }

    async fn submit_prompt(
        &self,
        _session: &SessionId,
        content: &str,
    ) -> Result<EventStream, BackendError> {
        self.prompts.lock().unwrap().push(content.to_string());
        let next = self.scripts.lock().unwrap().pop_front();
        match next {
            Some(script) => script,
            None => {
                let (tx, stream) = EventStream::channel(4);
                for event in simple_turn("done") {
                    tx.try_send(Ok(event)).unwrap();
                }
                Ok(stream)
            }
        }
    }

    async fn cancel_turn(&self, _session: &SessionId) -> Result<(), BackendError> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_approval_response(
        &self,
        _session: &SessionId,
        response: &ApprovalResponse,
    ) -> Result<(), BackendError> {
        self.approvals.lock().unwrap().push(response.clone());
        Ok(())
    }

    fn connection_state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }
}

struct EchoTool {
    definition: ToolDefinition,
}

#[async_trait]
impl ToolHandler for EchoTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, call: &ToolCall, _cancel: CancellationToken) -> ToolResult {
        ToolResult::success("Echo", call.get_string("text").unwrap_or_default())
    }
}

/// Lists a fixed set of files matching `pattern`'s extension.
struct FakeGlob {
    definition: ToolDefinition,
}

#[async_trait]
impl ToolHandler for FakeGlob {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, call: &ToolCall, _cancel: CancellationToken) -> ToolResult {
        let pattern = match call.require_string("pattern") {
            Ok(p) => p,
            Err(e) => return ToolResult::failure("Glob", ToolError::invalid_argument(e)),
        };
        let ext = pattern.trim_start_matches('*');
        let files: Vec<&str> = ["main.py", "util.py", "README.md"]
            .into_iter()
            .filter(|f| f.ends_with(ext))
            .collect();
        ToolResult::success(
            "Glob",
            format!("Found {} files:\n{}", files.len(), files.join("\n")),
        )
    }
}

/// Waits for cancellation, cooperatively.
struct SlowTool {
    definition: ToolDefinition,
}

#[async_trait]
impl ToolHandler for SlowTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, _call: &ToolCall, cancel: CancellationToken) -> ToolResult {
        tokio::select! {
            _ = cancel.cancelled() => ToolResult::failure("Slow", ToolError::cancelled()),
            _ = tokio::time::sleep(Duration::from_secs(3600)) => ToolResult::success("Slow", "finally"),
        }
    }
}

/// Registry with `Echo`, `Glob` and `Slow`.
pub(crate) struct StaticRegistry {
    tools: Vec<Arc<dyn ToolHandler>>,
}

impl StaticRegistry {
    pub(crate) fn echo() -> Self {
        Self {
            tools: vec![
                Arc::new(EchoTool {
                    definition: ToolDefinition::new("Echo", "Echo text"),
                }),
                Arc::new(FakeGlob {
                    definition: ToolDefinition::new("Glob", "Find files"),
                }),
                Arc::new(SlowTool {
                    definition: ToolDefinition::new("Slow", "Runs until cancelled"),
                }),
            ],
        }
    }
}

impl ToolRegistryPort for StaticRegistry {
    fn lookup(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools
            .iter()
            .find(|t| t.definition().name == name)
            .cloned()
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition().clone()).collect()
    }
}

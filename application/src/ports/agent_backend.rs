//! Agent Backend port
//!
//! Defines the interface for talking to the remote conversational agent.
//! The backend is the source of every [`ProtocolEvent`]; tool execution
//! happens locally and results go back as approval responses.

use async_trait::async_trait;
use std::path::Path;
use tether_domain::{ApprovalResponse, ProtocolEvent, SessionId, ToolDefinition};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur during backend operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("transport disconnected")]
    Disconnected,

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl BackendError {
    /// Whether the transport gave up reconnecting.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, BackendError::Disconnected)
    }
}

/// Connection state as seen by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Reconnecting { attempt: u32 },
    /// Reconnect attempts exhausted. Terminal.
    Disconnected,
}

impl ConnectionState {
    pub fn is_disconnected(&self) -> bool {
        matches!(self, ConnectionState::Disconnected)
    }
}

/// Ordered stream of events for one turn.
///
/// An `Err` item means the transport failed underneath the turn; the stream
/// ends after it. The stream also ends when the sender side is dropped.
pub struct EventStream {
    receiver: mpsc::Receiver<Result<ProtocolEvent, BackendError>>,
}

impl EventStream {
    pub fn new(receiver: mpsc::Receiver<Result<ProtocolEvent, BackendError>>) -> Self {
        Self { receiver }
    }

    /// Create a connected sender/stream pair.
    pub fn channel(
        buffer: usize,
    ) -> (mpsc::Sender<Result<ProtocolEvent, BackendError>>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(rx))
    }

    /// Next event, or `None` once the stream is closed.
    pub async fn next(&mut self) -> Option<Result<ProtocolEvent, BackendError>> {
        self.receiver.recv().await
    }
}

/// Gateway to the remote agent
///
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Create a new session rooted at `cwd`, advertising the local tools.
    async fn create_session(
        &self,
        cwd: &Path,
        tools: &[ToolDefinition],
    ) -> Result<SessionId, BackendError>;

    /// Re-attach to an existing session, e.g. after a restart.
    async fn resume_session(&self, session: &SessionId, cwd: &Path) -> Result<(), BackendError>;

    /// Submit a prompt and receive the turn's event stream.
    async fn submit_prompt(
        &self,
        session: &SessionId,
        content: &str,
    ) -> Result<EventStream, BackendError>;

    /// Ask the backend to stop the current turn.
    async fn cancel_turn(&self, session: &SessionId) -> Result<(), BackendError>;

    /// Answer an approval request.
    async fn send_approval_response(
        &self,
        session: &SessionId,
        response: &ApprovalResponse,
    ) -> Result<(), BackendError>;

    fn connection_state(&self) -> ConnectionState;
}

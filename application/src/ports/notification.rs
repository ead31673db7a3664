//! Consumer notification port
//!
//! The orchestration loop reports what happens to a UI-agnostic sink as a
//! closed set of simplified [`Notification`]s. Rendering is up to the sink.

use tether_domain::{
    ApprovalStatus, ChunkKind, FinalizedMessage, StopReason, TerminalState, TurnId, TurnState,
};
use tokio::sync::mpsc;

/// Everything a consumer may be told about.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    StateChanged {
        turn: TurnId,
        from: TurnState,
        to: TurnState,
    },
    Chunk {
        kind: ChunkKind,
        text: String,
    },
    MessageFinalized(FinalizedMessage),
    ToolCallStarted {
        id: String,
        name: String,
    },
    ToolCallReady {
        id: String,
        name: String,
    },
    ToolCallFailed {
        id: String,
        name: String,
        message: String,
    },
    ToolRunning {
        id: String,
        name: String,
    },
    ToolCompleted {
        id: String,
        name: String,
        success: bool,
        preview: String,
        duration_ms: Option<u64>,
    },
    PermissionRequested {
        id: String,
        tool_call_id: String,
        tool_name: Option<String>,
    },
    PermissionResponded {
        id: String,
        tool_call_id: String,
        status: ApprovalStatus,
    },
    BackendError {
        detail: String,
    },
    TurnFinished {
        turn: TurnId,
        outcome: TerminalState,
        reason: String,
    },
    ContinuationFired {
        iteration: u32,
        max_iterations: u32,
        prompt: String,
    },
    ContinuationStopped {
        reason: StopReason,
        iteration: u32,
    },
    /// A prompt hook refused the prompt; no turn was started
    PromptBlocked {
        reason: String,
    },
    Disconnected {
        reason: String,
    },
}

/// Sink for notifications.
///
/// `notify` is synchronous and infallible so a slow or failed consumer can
/// never stall the event loop.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// No-op sink
pub struct NoNotifications;

impl NotificationSink for NoNotifications {
    fn notify(&self, _notification: Notification) {}
}

impl NotificationSink for mpsc::UnboundedSender<Notification> {
    fn notify(&self, notification: Notification) {
        // Receiver gone means nobody is listening any more.
        let _ = self.send(notification);
    }
}

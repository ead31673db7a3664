//! Domain layer for tether
//!
//! This crate contains the core types and state machines of the tool-call
//! orchestration loop. It performs no I/O and has no dependencies on
//! infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Turn
//!
//! One prompt submitted to the remote agent and everything the agent streams
//! back until its terminal signal. A [`Turn`] moves through [`TurnState`]s
//! and keeps an ordered audit log.
//!
//! ## Assembly
//!
//! [`MessageAssembler`] folds the ordered [`ProtocolEvent`] stream into
//! finalized messages and complete [`ToolCall`]s.
//!
//! ## Approval flow
//!
//! Tools run locally. Their results travel back to the agent as
//! [`ApprovalResponse`]s correlated with the agent's [`ApprovalRequest`]s.
//!
//! ## Continuation
//!
//! After a completed turn, hooks may inject a follow-up prompt
//! ([`ContinuationDecision`]), bounded by [`PendingContinuation`].

pub mod approval;
pub mod continuation;
pub mod core;
pub mod protocol;
pub mod session;
pub mod stream;
pub mod tool;
pub mod turn;
pub mod util;

// Re-export commonly used types
pub use approval::{ApprovalRequest, ApprovalResponse, ApprovalStatus};
pub use continuation::{
    ContinuationDecision, PendingContinuation, StopReason, extract_promise, promise_fulfilled,
};
pub use core::error::DomainError;
pub use protocol::{ChunkKind, ProtocolEvent, TurnEndReason};
pub use session::SessionId;
pub use stream::{AssemblyError, AssemblyOutput, FinalizedMessage, MessageAssembler};
pub use tool::{
    ToolCall, ToolDefinition, ToolError, ToolErrorKind, ToolExecution, ToolExecutionState,
    ToolParameter, ToolResult, ToolResultMetadata,
};
pub use turn::{TerminalState, Turn, TurnId, TurnLogEntry, TurnState};

//! Tool domain module
//!
//! Tools run locally on behalf of the remote agent. A [`ToolDefinition`] is
//! advertised when the session is created; the backend streams a tool call,
//! the assembler materializes it into a [`ToolCall`], and the dispatcher
//! produces a [`ToolResult`] that travels back inside an approval response.
//!
//! ```text
//! ToolDefinition ──advertise──▶ backend
//! tool_call_* events ──assemble──▶ ToolCall ──dispatch──▶ ToolResult
//! ```
//!
//! [`ToolExecution`] tracks each dispatched call through its lifecycle.

pub mod entities;
pub mod execution;
pub mod value_objects;

pub use entities::{ToolCall, ToolDefinition, ToolParameter};
pub use execution::{ToolExecution, ToolExecutionState};
pub use value_objects::{ToolError, ToolErrorKind, ToolResult, ToolResultMetadata};

//! Tool result and error value objects
//!
//! Every dispatch produces a [`ToolResult`]. Failures carry a [`ToolError`]
//! whose [`ToolErrorKind`] is reported back to the remote agent as a failed
//! tool result; none of them abort the turn.

use serde::{Deserialize, Serialize};

/// Closed set of tool failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolErrorKind {
    /// No handler registered under the requested name
    NotFound,
    /// Missing or malformed arguments
    InvalidArgument,
    /// Runtime failure inside the handler (I/O error, panic)
    ExecutionFailed,
    /// The turn was cancelled while the tool was pending or running
    Cancelled,
    /// The operation exceeded its deadline
    Timeout,
    /// A pre-tool hook refused to let the call run
    Blocked,
}

impl ToolErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolErrorKind::NotFound => "NOT_FOUND",
            ToolErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ToolErrorKind::ExecutionFailed => "EXECUTION_FAILED",
            ToolErrorKind::Cancelled => "CANCELLED",
            ToolErrorKind::Timeout => "TIMEOUT",
            ToolErrorKind::Blocked => "BLOCKED",
        }
    }
}

/// Error that occurred during tool dispatch or execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    /// Human-readable error message
    pub message: String,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(tool_name: impl AsRef<str>) -> Self {
        Self::new(
            ToolErrorKind::NotFound,
            format!("Unknown tool: {}", tool_name.as_ref()),
        )
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidArgument, message)
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::ExecutionFailed, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ToolErrorKind::Cancelled, "Cancelled by user")
    }

    pub fn timeout(operation: impl AsRef<str>) -> Self {
        Self::new(
            ToolErrorKind::Timeout,
            format!("Operation timed out: {}", operation.as_ref()),
        )
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Blocked, reason)
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ToolErrorKind::Cancelled
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ToolError {}

/// Result of a tool execution, carrying output or error information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
    #[serde(default)]
    pub metadata: ToolResultMetadata,
}

/// Structured metadata about a tool execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResultMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_count: Option<usize>,
}

impl ToolResult {
    pub fn success(tool_name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: true,
            output: Some(output.into()),
            error: None,
            metadata: ToolResultMetadata::default(),
        }
    }

    pub fn failure(tool_name: impl Into<String>, error: ToolError) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            output: None,
            error: Some(error),
            metadata: ToolResultMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ToolResultMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.metadata.duration_ms = Some(duration_ms);
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn error(&self) -> Option<&ToolError> {
        self.error.as_ref()
    }

    /// Text reported back to the remote agent: the output on success,
    /// otherwise the error message.
    pub fn wire_output(&self) -> String {
        match (&self.output, &self.error) {
            (Some(out), _) if self.success => out.clone(),
            (_, Some(err)) => err.to_string(),
            _ => String::new(),
        }
    }
}

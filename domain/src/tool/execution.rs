//! Tool execution state machine.
//!
//! Tracks one dispatched tool call within a turn:
//!
//! ```text
//! Queued ──> Running ──> Finished
//!    └──────────────────> Finished   (cancelled before it ran)
//! ```
//!
//! Invalid transitions are no-ops so that late completions from a task that
//! outlived its turn cannot rewrite history.

use crate::tool::entities::ToolCall;
use crate::tool::value_objects::ToolResult;
use crate::util::{current_timestamp_ms, preview};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a single tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToolExecutionState {
    /// Materialized and waiting for the single execution slot.
    Queued { queued_at: u64 },
    /// Handler currently running.
    Running { queued_at: u64, started_at: u64 },
    /// Result available (success or failure).
    Finished {
        queued_at: u64,
        started_at: Option<u64>,
        finished_at: u64,
        success: bool,
        output_preview: String,
    },
}

impl ToolExecutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Queued { .. } => "queued",
            Self::Running { .. } => "running",
            Self::Finished { success: true, .. } => "completed",
            Self::Finished { success: false, .. } => "failed",
        }
    }
}

/// A tool call tracked through its execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecution {
    pub call: ToolCall,
    pub state: ToolExecutionState,
    /// Result once finished
    pub result: Option<ToolResult>,
}

impl ToolExecution {
    pub fn new(call: ToolCall) -> Self {
        Self {
            call,
            state: ToolExecutionState::Queued {
                queued_at: current_timestamp_ms(),
            },
            result: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.call.id
    }

    pub fn tool_name(&self) -> &str {
        &self.call.tool_name
    }

    /// Queued -> Running. No-op otherwise.
    pub fn mark_running(&mut self) {
        if let ToolExecutionState::Queued { queued_at } = self.state {
            self.state = ToolExecutionState::Running {
                queued_at,
                started_at: current_timestamp_ms(),
            };
        }
    }

    /// Queued | Running -> Finished. No-op once finished.
    pub fn finish(&mut self, result: ToolResult) {
        let (queued_at, started_at) = match self.state {
            ToolExecutionState::Queued { queued_at } => (queued_at, None),
            ToolExecutionState::Running {
                queued_at,
                started_at,
            } => (queued_at, Some(started_at)),
            ToolExecutionState::Finished { .. } => return,
        };
        self.state = ToolExecutionState::Finished {
            queued_at,
            started_at,
            finished_at: current_timestamp_ms(),
            success: result.is_success(),
            output_preview: preview(&result.wire_output(), 200),
        };
        self.result = Some(result);
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Wall-clock run time, when the handler actually ran.
    pub fn duration_ms(&self) -> Option<u64> {
        match self.state {
            ToolExecutionState::Finished {
                started_at: Some(started_at),
                finished_at,
                ..
            } => Some(finished_at.saturating_sub(started_at)),
            _ => None,
        }
    }
}

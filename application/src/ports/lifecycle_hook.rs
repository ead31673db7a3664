//! Lifecycle hooks around prompts, tool calls and agent messages.
//!
//! Every method has a no-op default, so a hook implements only the events
//! it cares about. Two events can change what happens next:
//! [`LifecycleHook::on_prompt_submit`] may block a prompt or append a
//! message to it, and [`LifecycleHook::on_tool_start`] may block a tool
//! call, which then reports a failed result to the agent.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tether_domain::{SessionId, ToolCall, ToolResult};

/// A prompt about to be submitted, for `on_loop_start` and `on_prompt_submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptContext {
    pub session_id: SessionId,
    pub prompt: String,
    /// Continuations fired so far in this chain; 0 for a human prompt
    pub iteration: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolStartContext {
    pub session_id: SessionId,
    pub tool_call_id: String,
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

impl ToolStartContext {
    pub fn new(session_id: SessionId, call: &ToolCall) -> Self {
        Self {
            session_id,
            tool_call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            arguments: call.arguments.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolEndContext {
    pub session_id: SessionId,
    pub tool_call_id: String,
    pub tool_name: String,
    pub output: String,
    pub is_error: bool,
}

impl ToolEndContext {
    pub fn new(session_id: SessionId, call: &ToolCall, result: &ToolResult) -> Self {
        Self {
            session_id,
            tool_call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            output: result.wire_output(),
            is_error: !result.is_success(),
        }
    }
}

/// The final assistant text of a completed turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageContext {
    pub session_id: SessionId,
    pub text: String,
}

/// Answer to `on_prompt_submit`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PromptVerdict {
    #[default]
    Allow,
    /// Do not submit; the reason is reported instead of a turn
    Block(String),
    /// Submit with this message appended
    Inject(String),
}

/// Answer to `on_tool_start`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ToolVerdict {
    #[default]
    Allow,
    /// Do not run; the reason goes back to the agent as a failed result
    Block(String),
}

#[async_trait]
pub trait LifecycleHook: Send + Sync {
    fn name(&self) -> &str;

    async fn on_loop_start(&self, _context: &PromptContext) {}

    async fn on_prompt_submit(&self, _context: &PromptContext) -> PromptVerdict {
        PromptVerdict::Allow
    }

    async fn on_tool_start(&self, _context: &ToolStartContext) -> ToolVerdict {
        ToolVerdict::Allow
    }

    async fn on_tool_end(&self, _context: &ToolEndContext) {}

    async fn on_message(&self, _context: &MessageContext) {}
}

//! Lifecycle hooks backed by shell commands.
//!
//! Each command is bound to one event and receives that event's context as
//! JSON on stdin, with an `"event"` key naming it. For `prompt_submit` and
//! `tool_start` the command can refuse the action by exiting non-zero
//! (stderr becomes the reason) or by printing `{"block": true}`. A
//! `prompt_submit` command may also print `{"inject_message": "..."}` to
//! append text to the prompt. Output of the other events is ignored.

use super::runner::{HookCommand, HookFailure, HookReply};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tether_application::{
    LifecycleHook, MessageContext, PromptContext, PromptVerdict, ToolEndContext, ToolStartContext,
    ToolVerdict,
};
use tracing::{debug, warn};

const PROMPT_BLOCKED: &str = "Prompt blocked by hook";
const TOOL_BLOCKED: &str = "Tool blocked by hook";

/// Lifecycle point a shell hook is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEvent {
    LoopStart,
    PromptSubmit,
    ToolStart,
    ToolEnd,
    Message,
}

impl HookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::LoopStart => "loop_start",
            HookEvent::PromptSubmit => "prompt_submit",
            HookEvent::ToolStart => "tool_start",
            HookEvent::ToolEnd => "tool_end",
            HookEvent::Message => "message",
        }
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a gating hook answered.
enum Gate {
    Pass(HookReply),
    Block(String),
}

/// Runs `sh -c <command>` on one lifecycle event.
#[derive(Debug, Clone)]
pub struct ShellLifecycleHook {
    event: HookEvent,
    runner: HookCommand,
}

impl ShellLifecycleHook {
    pub fn new(event: HookEvent, command: impl Into<String>) -> Self {
        Self {
            event,
            runner: HookCommand::new(command),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.runner.set_timeout(timeout);
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.runner.set_cwd(cwd.into());
        self
    }

    pub fn event(&self) -> HookEvent {
        self.event
    }

    /// Fire-and-forget events: failures are logged and otherwise ignored.
    async fn notify<T: Serialize + Sync>(&self, event: HookEvent, context: &T) {
        if self.event != event {
            return;
        }
        if let Err(failure) = self.runner.run(event.as_str(), context).await {
            warn!(hook = %self.runner.command(), event = %event, error = %failure, "Hook failed");
        }
    }

    /// Events that may block. Only a non-zero exit or `"block": true`
    /// refuses; a hook that cannot run lets the action through.
    async fn gate<T: Serialize + Sync>(&self, context: &T, default_reason: &str) -> Gate {
        match self.runner.run(self.event.as_str(), context).await {
            Ok(reply) if reply.block => Gate::Block(default_reason.to_string()),
            Ok(reply) => Gate::Pass(reply),
            Err(HookFailure::Exit(detail)) => Gate::Block(detail),
            Err(HookFailure::InvalidOutput(output)) => {
                debug!(hook = %self.runner.command(), output = %output, "Hook printed plain text");
                Gate::Pass(HookReply::default())
            }
            Err(failure) => {
                warn!(
                    hook = %self.runner.command(),
                    event = %self.event,
                    error = %failure,
                    "Hook failed, allowing"
                );
                Gate::Pass(HookReply::default())
            }
        }
    }
}

#[async_trait]
impl LifecycleHook for ShellLifecycleHook {
    fn name(&self) -> &str {
        self.runner.command()
    }

    async fn on_loop_start(&self, context: &PromptContext) {
        self.notify(HookEvent::LoopStart, context).await;
    }

    async fn on_prompt_submit(&self, context: &PromptContext) -> PromptVerdict {
        if self.event != HookEvent::PromptSubmit {
            return PromptVerdict::Allow;
        }
        match self.gate(context, PROMPT_BLOCKED).await {
            Gate::Block(reason) => PromptVerdict::Block(reason),
            Gate::Pass(reply) => match reply.message() {
                Some(message) => PromptVerdict::Inject(message),
                None => PromptVerdict::Allow,
            },
        }
    }

    async fn on_tool_start(&self, context: &ToolStartContext) -> ToolVerdict {
        if self.event != HookEvent::ToolStart {
            return ToolVerdict::Allow;
        }
        match self.gate(context, TOOL_BLOCKED).await {
            Gate::Block(reason) => ToolVerdict::Block(reason),
            Gate::Pass(_) => ToolVerdict::Allow,
        }
    }

    async fn on_tool_end(&self, context: &ToolEndContext) {
        self.notify(HookEvent::ToolEnd, context).await;
    }

    async fn on_message(&self, context: &MessageContext) {
        self.notify(HookEvent::Message, context).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tether_domain::{SessionId, ToolCall};

    fn prompt() -> PromptContext {
        PromptContext {
            session_id: SessionId::parse("s-1").unwrap(),
            prompt: "refactor the parser".to_string(),
            iteration: 0,
        }
    }

    fn tool_start(name: &str) -> ToolStartContext {
        let call = ToolCall::new("tc1", name).with_arg("pattern", "*.rs");
        ToolStartContext::new(SessionId::parse("s-1").unwrap(), &call)
    }

    #[test]
    fn test_event_names() {
        assert_eq!(HookEvent::PromptSubmit.to_string(), "prompt_submit");
        let parsed: HookEvent = serde_json::from_value(json!("tool_start")).unwrap();
        assert_eq!(parsed, HookEvent::ToolStart);
    }

    #[tokio::test]
    async fn test_prompt_hook_injects_message() {
        let hook = ShellLifecycleHook::new(
            HookEvent::PromptSubmit,
            r#"echo '{"inject_message": "branch is dirty"}'"#,
        );
        assert_eq!(
            hook.on_prompt_submit(&prompt()).await,
            PromptVerdict::Inject("branch is dirty".into())
        );
    }

    #[tokio::test]
    async fn test_block_flag_uses_default_reason() {
        let hook = ShellLifecycleHook::new(HookEvent::PromptSubmit, r#"echo '{"block": true}'"#);
        assert_eq!(
            hook.on_prompt_submit(&prompt()).await,
            PromptVerdict::Block("Prompt blocked by hook".into())
        );
    }

    #[tokio::test]
    async fn test_nonzero_exit_blocks_tool_with_stderr() {
        let hook = ShellLifecycleHook::new(
            HookEvent::ToolStart,
            r#"input=$(cat); case "$input" in *'"tool_name":"Grep"'*) echo 'no grep today' >&2; exit 2;; esac"#,
        );
        assert_eq!(
            hook.on_tool_start(&tool_start("Grep")).await,
            ToolVerdict::Block("no grep today".into())
        );
        assert_eq!(hook.on_tool_start(&tool_start("Glob")).await, ToolVerdict::Allow);
    }

    #[tokio::test]
    async fn test_timeout_allows_tool() {
        let hook = ShellLifecycleHook::new(HookEvent::ToolStart, "sleep 5")
            .with_timeout(Duration::from_millis(100));
        assert_eq!(hook.on_tool_start(&tool_start("Read")).await, ToolVerdict::Allow);
    }

    #[tokio::test]
    async fn test_plain_text_output_allows() {
        let hook = ShellLifecycleHook::new(HookEvent::PromptSubmit, "echo looks fine");
        assert_eq!(hook.on_prompt_submit(&prompt()).await, PromptVerdict::Allow);
    }

    #[tokio::test]
    async fn test_hook_ignores_other_events() {
        let hook = ShellLifecycleHook::new(HookEvent::ToolStart, "exit 1");
        assert_eq!(hook.on_prompt_submit(&prompt()).await, PromptVerdict::Allow);
    }

    #[tokio::test]
    async fn test_tool_end_hook_receives_result() {
        let dir = tempfile::tempdir().unwrap();
        let hook = ShellLifecycleHook::new(HookEvent::ToolEnd, "cat > seen.json").with_cwd(dir.path());
        let call = ToolCall::new("tc1", "Read");
        let result = tether_domain::ToolResult::success("Read", "1: fn main() {}");
        hook.on_tool_end(&ToolEndContext::new(
            SessionId::parse("s-1").unwrap(),
            &call,
            &result,
        ))
        .await;

        let seen: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("seen.json")).unwrap())
                .unwrap();
        assert_eq!(seen["event"], "tool_end");
        assert_eq!(seen["tool_call_id"], "tc1");
        assert_eq!(seen["output"], "1: fn main() {}");
        assert_eq!(seen["is_error"], false);
    }
}

//! Ordered set of lifecycle hooks and how their answers combine.

use crate::ports::lifecycle_hook::{
    LifecycleHook, MessageContext, PromptContext, PromptVerdict, ToolEndContext,
    ToolStartContext, ToolVerdict,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of running every `on_prompt_submit` hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptGate {
    /// Submit this prompt (the original plus any injected messages)
    Submit(String),
    Blocked(String),
}

/// Hooks run in registration order.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, hook: Arc<dyn LifecycleHook>) {
        self.hooks.push(hook);
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub async fn loop_started(&self, context: &PromptContext) {
        for hook in &self.hooks {
            hook.on_loop_start(context).await;
        }
    }

    /// The first hook to block wins. Injected messages are appended in
    /// hook order, each in its own `<user-prompt-submit-hook>` block.
    pub async fn prompt_submitted(&self, context: &PromptContext) -> PromptGate {
        let mut prompt = context.prompt.clone();
        for hook in &self.hooks {
            match hook.on_prompt_submit(context).await {
                PromptVerdict::Allow => {}
                PromptVerdict::Block(reason) => {
                    info!(hook = hook.name(), reason = %reason, "Prompt blocked by hook");
                    return PromptGate::Blocked(reason);
                }
                PromptVerdict::Inject(message) => {
                    debug!(hook = hook.name(), "Hook injected a prompt message");
                    prompt = format!(
                        "{}\n\n<user-prompt-submit-hook>\n{}\n</user-prompt-submit-hook>",
                        prompt, message
                    );
                }
            }
        }
        PromptGate::Submit(prompt)
    }

    /// Block reason from the first hook that refuses the call.
    pub async fn tool_starting(&self, context: &ToolStartContext) -> Option<String> {
        for hook in &self.hooks {
            if let ToolVerdict::Block(reason) = hook.on_tool_start(context).await {
                info!(
                    hook = hook.name(),
                    call_id = %context.tool_call_id,
                    tool = %context.tool_name,
                    reason = %reason,
                    "Tool call blocked by hook"
                );
                return Some(reason);
            }
        }
        None
    }

    pub async fn tool_ended(&self, context: &ToolEndContext) {
        for hook in &self.hooks {
            hook.on_tool_end(context).await;
        }
    }

    pub async fn message_finalized(&self, context: &MessageContext) {
        for hook in &self.hooks {
            hook.on_message(context).await;
        }
    }
}

impl std::fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|h| h.name()))
            .finish()
    }
}

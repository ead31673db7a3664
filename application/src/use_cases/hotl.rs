//! Built-in human-out-of-the-loop hook.
//!
//! Re-injects the original task after every completed turn until the agent
//! states the configured completion promise as `<promise>TEXT</promise>`.

use crate::ports::continuation::{ContinuationHook, LoopEndContext};
use async_trait::async_trait;
use tether_domain::{ContinuationDecision, promise_fulfilled};

/// Re-prompts with the original task until the completion promise appears.
#[derive(Debug, Clone)]
pub struct HotlHook {
    prompt: String,
    promise: Option<String>,
    auto_respond: bool,
}

impl HotlHook {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            promise: None,
            auto_respond: false,
        }
    }

    pub fn with_promise(mut self, promise: impl Into<String>) -> Self {
        self.promise = Some(promise.into());
        self
    }

    /// Ask the agent to predict the user's reply instead of repeating the task.
    pub fn with_auto_respond(mut self, auto_respond: bool) -> Self {
        self.auto_respond = auto_respond;
        self
    }

    fn status_line(&self, context: &LoopEndContext) -> String {
        let mut status = format!("HOTL iteration {}", context.iteration + 1);
        if context.max_iterations > 0 {
            status.push_str(&format!("/{}", context.max_iterations));
        }
        if let Some(promise) = &self.promise {
            status.push_str(&format!(" | Complete: <promise>{}</promise>", promise));
        }
        if self.auto_respond {
            status.push_str(" | auto-respond");
        }
        status
    }

    fn next_prompt(&self, context: &LoopEndContext) -> String {
        let body = if self.auto_respond {
            format!(
                "Based on my previous responses and our current task priorities, \
                 predict what I (the user) would respond to continue this task. \
                 Generate my response, then continue working on the task.\n\n\
                 Original task: {}",
                self.prompt
            )
        } else {
            self.prompt.clone()
        };
        format!(
            "<system-reminder>\n{}\n</system-reminder>\n\n{}",
            self.status_line(context),
            body
        )
    }
}

#[async_trait]
impl ContinuationHook for HotlHook {
    fn name(&self) -> &str {
        "hotl"
    }

    async fn on_loop_end(&self, context: &LoopEndContext) -> ContinuationDecision {
        if let (Some(promise), Some(message)) = (&self.promise, &context.final_message)
            && promise_fulfilled(message, promise)
        {
            return ContinuationDecision::Stop;
        }
        ContinuationDecision::Continue(self.next_prompt(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_domain::SessionId;

    fn context(message: Option<&str>, iteration: u32) -> LoopEndContext {
        LoopEndContext {
            session_id: SessionId::parse("s1").unwrap(),
            final_message: message.map(str::to_string),
            iteration,
            max_iterations: 10,
        }
    }

    #[tokio::test]
    async fn test_stops_on_promise() {
        let hook = HotlHook::new("fix the tests").with_promise("ALL GREEN");
        let decision = hook
            .on_loop_end(&context(Some("Done.\n<promise> ALL\n GREEN </promise>"), 2))
            .await;
        assert_eq!(decision, ContinuationDecision::Stop);
    }

    #[tokio::test]
    async fn test_continues_with_status_block() {
        let hook = HotlHook::new("fix the tests").with_promise("ALL GREEN");
        let decision = hook.on_loop_end(&context(Some("still failing"), 2)).await;
        assert_eq!(
            decision.prompt(),
            Some(
                "<system-reminder>\nHOTL iteration 3/10 | Complete: <promise>ALL GREEN</promise>\n</system-reminder>\n\nfix the tests"
            )
        );
    }

    #[tokio::test]
    async fn test_auto_respond_prompt() {
        let hook = HotlHook::new("write docs").with_auto_respond(true);
        let decision = hook.on_loop_end(&context(None, 0)).await;
        let prompt = decision.prompt().unwrap();
        assert!(prompt.contains("HOTL iteration 1/10 | auto-respond"));
        assert!(prompt.contains("predict what I (the user) would respond"));
        assert!(prompt.ends_with("Original task: write docs"));
    }

    #[tokio::test]
    async fn test_without_promise_always_continues() {
        let hook = HotlHook::new("loop");
        let decision = hook
            .on_loop_end(&context(Some("<promise>DONE</promise>"), 0))
            .await;
        assert!(decision.is_continue());
    }
}

//! Continuation hook backed by a user-configured shell command.
//!
//! The command receives the loop-end context as JSON on stdin:
//!
//! ```json
//! {"event": "loop_end", "session_id": "...", "final_message": "...",
//!  "iteration": 0, "max_iterations": 10}
//! ```
//!
//! Printing `{"inject_message": "next prompt"}` on stdout continues the
//! session with that prompt. Anything else stops it.

use super::runner::HookCommand;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tether_application::{ContinuationHook, LoopEndContext};
use tether_domain::ContinuationDecision;
use tracing::{debug, warn};

/// Runs `sh -c <command>` when a turn completes.
#[derive(Debug, Clone)]
pub struct ShellContinuationHook {
    runner: HookCommand,
}

impl ShellContinuationHook {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
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

    pub fn command(&self) -> &str {
        self.runner.command()
    }
}

#[async_trait]
impl ContinuationHook for ShellContinuationHook {
    fn name(&self) -> &str {
        self.runner.command()
    }

    async fn on_loop_end(&self, context: &LoopEndContext) -> ContinuationDecision {
        match self.runner.run("loop_end", context).await.map(|r| r.message()) {
            Ok(Some(prompt)) => {
                debug!(hook = %self.command(), "Hook injected a message");
                ContinuationDecision::Continue(prompt)
            }
            Ok(None) => ContinuationDecision::Stop,
            Err(failure) => {
                warn!(hook = %self.command(), error = %failure, "Continuation hook failed");
                ContinuationDecision::Stop
            }
        }
    }
}

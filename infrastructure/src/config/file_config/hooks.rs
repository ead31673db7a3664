//! Lifecycle hook commands (`[hooks]` section)

use crate::hooks::HookEvent;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shell commands per lifecycle event, each list run in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileHooksConfig {
    pub loop_start: Vec<String>,
    /// May block the prompt or append to it
    pub prompt_submit: Vec<String>,
    /// May block the tool call
    pub tool_start: Vec<String>,
    pub tool_end: Vec<String>,
    pub message: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for FileHooksConfig {
    fn default() -> Self {
        Self {
            loop_start: Vec::new(),
            prompt_submit: Vec::new(),
            tool_start: Vec::new(),
            tool_end: Vec::new(),
            message: Vec::new(),
            timeout_secs: 30,
        }
    }
}

impl FileHooksConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Every configured command with its event, in event order.
    pub fn commands(&self) -> Vec<(HookEvent, &str)> {
        [
            (HookEvent::LoopStart, &self.loop_start),
            (HookEvent::PromptSubmit, &self.prompt_submit),
            (HookEvent::ToolStart, &self.tool_start),
            (HookEvent::ToolEnd, &self.tool_end),
            (HookEvent::Message, &self.message),
        ]
        .into_iter()
        .flat_map(|(event, commands)| commands.iter().map(move |c| (event, c.as_str())))
        .collect()
    }
}

//! Continuation loop configuration (`[continuation]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Raw continuation configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileContinuationConfig {
    /// Ceiling on automatic continuations per chain
    pub max_iterations: u32,
    /// Directory holding per-session continuation state
    pub state_dir: PathBuf,
    /// Shell commands run when a turn completes, in order
    pub hooks: Vec<String>,
    pub hook_timeout_secs: u64,
}

impl Default for FileContinuationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            state_dir: PathBuf::from(".tether/continuation"),
            hooks: Vec::new(),
            hook_timeout_secs: 30,
        }
    }
}

impl FileContinuationConfig {
    pub fn hook_timeout(&self) -> Duration {
        Duration::from_secs(self.hook_timeout_secs)
    }
}

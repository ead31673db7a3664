//! Local read-only tools the agent can invoke through the approval flow.
//!
//! Every tool implements [`ToolHandler`](tether_application::ToolHandler) and
//! runs its filesystem work on the blocking pool, checking the cancellation
//! token between files. Relative paths resolve against the session's
//! working directory.

pub mod file;
pub mod search;

mod registry;

pub use registry::LocalToolRegistry;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tether_domain::{ToolError, ToolResult};
use tracing::warn;

/// Where tools resolve relative paths.
#[derive(Debug, Clone)]
pub struct ToolEnv {
    cwd: Arc<PathBuf>,
}

impl ToolEnv {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Arc::new(cwd.into()),
        }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}

/// `path` relative to `base` when it lies underneath it.
pub(crate) fn display_path(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .ok()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Run a blocking tool body off the async workers.
pub(crate) async fn run_blocking<F>(tool_name: &'static str, f: F) -> ToolResult
where
    F: FnOnce() -> ToolResult + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => {
            warn!(tool = tool_name, error = %e, "Tool task failed");
            ToolResult::failure(
                tool_name,
                ToolError::execution_failed(format!("Tool task failed: {}", e)),
            )
        }
    }
}

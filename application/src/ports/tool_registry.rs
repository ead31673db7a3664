//! Tool Registry port
//!
//! Defines how the application finds and runs local tools. A registry is
//! built once and is read-only afterwards, so it can be shared across
//! sessions behind an `Arc`.

use async_trait::async_trait;
use std::sync::Arc;
use tether_domain::{ToolCall, ToolDefinition, ToolResult};
use tokio_util::sync::CancellationToken;

/// A single executable tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> &ToolDefinition;

    /// Run the call.
    ///
    /// Cancellation is cooperative: handlers check `cancel` at safe points
    /// and return a `Cancelled` error when it fires.
    async fn execute(&self, call: &ToolCall, cancel: CancellationToken) -> ToolResult;
}

/// Port for tool lookup
pub trait ToolRegistryPort: Send + Sync {
    fn lookup(&self, name: &str) -> Option<Arc<dyn ToolHandler>>;

    /// Definitions of every registered tool, in registration order.
    fn definitions(&self) -> Vec<ToolDefinition>;

    fn has_tool(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}

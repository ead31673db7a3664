//! Tool Registry
//!
//! [`LocalToolRegistry`] maps tool names to handlers and implements
//! [`ToolRegistryPort`]. It is built once at startup and read-only
//! afterwards, so it can be shared across sessions without locking.

use super::ToolEnv;
use super::file::ReadTool;
use super::search::{GlobTool, GrepTool};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tether_application::{ToolHandler, ToolRegistryPort};
use tether_domain::ToolDefinition;
use tracing::debug;

pub struct LocalToolRegistry {
    /// Registration order, which is also the advertised order
    order: Vec<String>,
    tools: HashMap<String, Arc<dyn ToolHandler>>,
    env: ToolEnv,
}

impl LocalToolRegistry {
    /// An empty registry resolving paths against `cwd`.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            order: Vec::new(),
            tools: HashMap::new(),
            env: ToolEnv::new(cwd),
        }
    }

    /// Glob, Grep and Read, rooted at the process working directory.
    pub fn read_only() -> Self {
        Self::new(".").with_builtin_tools()
    }

    /// Re-root the built-in tools at `cwd`.
    pub fn with_cwd(self, cwd: impl Into<PathBuf>) -> Self {
        let extra: Vec<Arc<dyn ToolHandler>> = self
            .order
            .iter()
            .filter(|name| !is_builtin(name))
            .filter_map(|name| self.tools.get(name).cloned())
            .collect();
        let had_builtins = self.order.iter().any(|name| is_builtin(name));

        let mut registry = Self::new(cwd);
        if had_builtins {
            registry = registry.with_builtin_tools();
        }
        extra.into_iter().fold(registry, |r, tool| r.register(tool))
    }

    fn with_builtin_tools(self) -> Self {
        let env = self.env.clone();
        self.register(Arc::new(GlobTool::new(env.clone())))
            .register(Arc::new(GrepTool::new(env.clone())))
            .register(Arc::new(ReadTool::new(env)))
    }

    /// Register a handler. A later registration replaces an earlier one
    /// with the same name.
    pub fn register(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        let name = handler.definition().name.clone();
        if self.tools.insert(name.clone(), handler).is_some() {
            debug!(tool = %name, "Replacing registered tool");
        } else {
            self.order.push(name);
        }
        self
    }

    pub fn env(&self) -> &ToolEnv {
        &self.env
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        super::search::GLOB | super::search::GREP | super::file::READ
    )
}

impl ToolRegistryPort for LocalToolRegistry {
    fn lookup(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).cloned()
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tether_domain::{ToolCall, ToolResult};
    use tokio_util::sync::CancellationToken;

    struct Ping {
        definition: ToolDefinition,
    }

    #[async_trait]
    impl ToolHandler for Ping {
        fn definition(&self) -> &ToolDefinition {
            &self.definition
        }

        async fn execute(&self, _call: &ToolCall, _cancel: CancellationToken) -> ToolResult {
            ToolResult::success("Ping", "pong")
        }
    }

    #[test]
    fn test_read_only_registry_advertises_in_order() {
        let registry = LocalToolRegistry::read_only();
        let names: Vec<String> = registry
            .definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["Glob", "Grep", "Read"]);
        assert!(registry.has_tool("Grep"));
        assert!(registry.lookup("Write").is_none());
    }

    #[test]
    fn test_with_cwd_keeps_custom_tools() {
        let registry = LocalToolRegistry::read_only()
            .register(Arc::new(Ping {
                definition: ToolDefinition::new("Ping", "Reply pong"),
            }))
            .with_cwd("/work");

        assert_eq!(registry.env().cwd(), std::path::Path::new("/work"));
        assert_eq!(registry.len(), 4);
        assert!(registry.lookup("Ping").is_some());
    }

    #[tokio::test]
    async fn test_lookup_and_execute() {
        let registry = LocalToolRegistry::new(".").register(Arc::new(Ping {
            definition: ToolDefinition::new("Ping", "Reply pong"),
        }));
        let tool = registry.lookup("Ping").unwrap();
        let result = tool
            .execute(&ToolCall::new("1", "Ping"), CancellationToken::new())
            .await;
        assert_eq!(result.output(), Some("pong"));
    }
}

//! File tools: Read

use super::{ToolEnv, run_blocking};
use async_trait::async_trait;
use std::fs;
use std::time::Instant;
use tether_application::ToolHandler;
use tether_domain::{
    ToolCall, ToolDefinition, ToolError, ToolParameter, ToolResult, ToolResultMetadata,
};
use tokio_util::sync::CancellationToken;

pub const READ: &str = "Read";

/// Maximum file size to read (10 MB)
const MAX_READ_SIZE: u64 = 10 * 1024 * 1024;

/// Get the tool definition for Read
pub fn read_definition() -> ToolDefinition {
    ToolDefinition::new(READ, "Read the contents of a file at the specified path")
        .with_parameter(ToolParameter::new("path", "Path to the file to read", true))
        .with_parameter(
            ToolParameter::new(
                "offset",
                "Line number to start reading from (0-indexed)",
                false,
            )
            .with_type("integer"),
        )
        .with_parameter(
            ToolParameter::new("limit", "Maximum number of lines to read", false)
                .with_type("integer"),
        )
}

pub struct ReadTool {
    definition: ToolDefinition,
    env: ToolEnv,
}

impl ReadTool {
    pub fn new(env: ToolEnv) -> Self {
        Self {
            definition: read_definition(),
            env,
        }
    }
}

#[async_trait]
impl ToolHandler for ReadTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, call: &ToolCall, cancel: CancellationToken) -> ToolResult {
        let call = call.clone();
        let env = self.env.clone();
        run_blocking(READ, move || execute_read(&call, &env, &cancel)).await
    }
}

/// Execute the Read tool
pub fn execute_read(call: &ToolCall, env: &ToolEnv, cancel: &CancellationToken) -> ToolResult {
    let start = Instant::now();

    let path_str = match call.require_string("path") {
        Ok(p) => p,
        Err(e) => return ToolResult::failure(READ, ToolError::invalid_argument(e)),
    };
    let path = env.resolve(path_str);

    if !path.exists() {
        return ToolResult::failure(
            READ,
            ToolError::invalid_argument(format!("File not found: {}", path_str)),
        );
    }
    if !path.is_file() {
        return ToolResult::failure(
            READ,
            ToolError::invalid_argument(format!("'{}' is not a file", path_str)),
        );
    }

    let metadata = match fs::metadata(&path) {
        Ok(m) => m,
        Err(e) => {
            return ToolResult::failure(
                READ,
                ToolError::execution_failed(format!("Failed to get file metadata: {}", e)),
            );
        }
    };
    if metadata.len() > MAX_READ_SIZE {
        return ToolResult::failure(
            READ,
            ToolError::invalid_argument(format!(
                "File too large ({} bytes). Maximum size is {} bytes",
                metadata.len(),
                MAX_READ_SIZE
            )),
        );
    }

    if cancel.is_cancelled() {
        return ToolResult::failure(READ, ToolError::cancelled());
    }

    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            return ToolResult::failure(
                READ,
                ToolError::execution_failed(format!("Failed to read {}: {}", path_str, e)),
            );
        }
    };

    let offset = call.get_u64("offset").unwrap_or(0) as usize;
    let limit = call.get_u64("limit").map(|l| l as usize);

    let output = if offset > 0 || limit.is_some() {
        let lines: Vec<&str> = content.lines().collect();
        let total_lines = lines.len();
        if offset >= total_lines {
            String::new()
        } else {
            let end = match limit {
                Some(l) => offset.saturating_add(l).min(total_lines),
                None => total_lines,
            };
            lines[offset..end].join("\n")
        }
    } else {
        content
    };

    let bytes = output.len();
    ToolResult::success(READ, output).with_metadata(ToolResultMetadata {
        duration_ms: Some(start.elapsed().as_millis() as u64),
        bytes: Some(bytes),
        path: Some(path.display().to_string()),
        ..Default::default()
    })
}

//! Search tools: Glob, Grep

use super::{ToolEnv, display_path, run_blocking};
use async_trait::async_trait;
use glob::glob;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tether_application::ToolHandler;
use tether_domain::{
    ToolCall, ToolDefinition, ToolError, ToolParameter, ToolResult, ToolResultMetadata,
};
use tokio_util::sync::CancellationToken;

/// Tool name constants
pub const GLOB: &str = "Glob";
pub const GREP: &str = "Grep";

/// Maximum number of results to return
const MAX_RESULTS: usize = 1000;

/// Maximum file size for grep (5 MB)
const MAX_GREP_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Get the tool definition for Glob
pub fn glob_definition() -> ToolDefinition {
    ToolDefinition::new(
        GLOB,
        "Find files matching a glob pattern (e.g., '**/*.rs', 'src/*.txt')",
    )
    .with_parameter(ToolParameter::new("pattern", "Glob pattern to match files", true))
    .with_parameter(ToolParameter::new(
        "base_dir",
        "Directory to search from (default: working directory)",
        false,
    ))
    .with_parameter(
        ToolParameter::new(
            "max_results",
            "Maximum number of results to return (default: 1000)",
            false,
        )
        .with_type("integer"),
    )
}

/// Get the tool definition for Grep
pub fn grep_definition() -> ToolDefinition {
    ToolDefinition::new(GREP, "Search file contents with a regular expression")
        .with_parameter(ToolParameter::new(
            "pattern",
            "Regex pattern to search for",
            true,
        ))
        .with_parameter(ToolParameter::new(
            "path",
            "File or directory to search in (default: working directory)",
            false,
        ))
        .with_parameter(ToolParameter::new(
            "file_pattern",
            "Glob pattern to filter files (e.g., '*.rs')",
            false,
        ))
        .with_parameter(
            ToolParameter::new(
                "context_lines",
                "Number of context lines before and after match",
                false,
            )
            .with_type("integer"),
        )
        .with_parameter(
            ToolParameter::new("case_insensitive", "Perform case-insensitive search", false)
                .with_type("boolean"),
        )
}

pub struct GlobTool {
    definition: ToolDefinition,
    env: ToolEnv,
}

impl GlobTool {
    pub fn new(env: ToolEnv) -> Self {
        Self {
            definition: glob_definition(),
            env,
        }
    }
}

#[async_trait]
impl ToolHandler for GlobTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, call: &ToolCall, cancel: CancellationToken) -> ToolResult {
        let call = call.clone();
        let env = self.env.clone();
        run_blocking(GLOB, move || execute_glob(&call, &env, &cancel)).await
    }
}

pub struct GrepTool {
    definition: ToolDefinition,
    env: ToolEnv,
}

impl GrepTool {
    pub fn new(env: ToolEnv) -> Self {
        Self {
            definition: grep_definition(),
            env,
        }
    }
}

#[async_trait]
impl ToolHandler for GrepTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, call: &ToolCall, cancel: CancellationToken) -> ToolResult {
        let call = call.clone();
        let env = self.env.clone();
        run_blocking(GREP, move || execute_grep(&call, &env, &cancel)).await
    }
}

/// Execute the Glob tool
pub fn execute_glob(call: &ToolCall, env: &ToolEnv, cancel: &CancellationToken) -> ToolResult {
    let start = Instant::now();

    let pattern = match call.require_string("pattern") {
        Ok(p) => p,
        Err(e) => return ToolResult::failure(GLOB, ToolError::invalid_argument(e)),
    };

    let base_dir = call
        .get_string("base_dir")
        .map(|dir| env.resolve(dir))
        .unwrap_or_else(|| env.cwd().to_path_buf());

    let max_results = call
        .get_u64("max_results")
        .map(|n| n as usize)
        .unwrap_or(MAX_RESULTS)
        .min(MAX_RESULTS);

    let full_pattern = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        format!("{}/{}", base_dir.display(), pattern)
    };

    let entries = match glob(&full_pattern) {
        Ok(paths) => paths,
        Err(e) => {
            return ToolResult::failure(
                GLOB,
                ToolError::invalid_argument(format!("Invalid glob pattern: {}", e)),
            );
        }
    };

    let mut results = Vec::new();
    let mut error_count = 0;
    let mut truncated = false;

    for entry in entries {
        if cancel.is_cancelled() {
            return ToolResult::failure(GLOB, ToolError::cancelled());
        }
        if results.len() >= max_results {
            truncated = true;
            break;
        }
        match entry {
            Ok(path) => results.push(display_path(&path, &base_dir)),
            Err(_) => error_count += 1,
        }
    }

    let match_count = results.len();
    let output = if results.is_empty() {
        "No files found matching the pattern".to_string()
    } else {
        let mut output = format!("Found {} files:\n{}", match_count, results.join("\n"));
        if truncated {
            output.push_str(&format!("\n... (limited to {} results)", max_results));
        }
        if error_count > 0 {
            output.push_str(&format!("\n({} paths could not be accessed)", error_count));
        }
        output
    };

    ToolResult::success(GLOB, output).with_metadata(ToolResultMetadata {
        duration_ms: Some(start.elapsed().as_millis() as u64),
        match_count: Some(match_count),
        path: Some(base_dir.display().to_string()),
        ..Default::default()
    })
}

/// Execute the Grep tool
pub fn execute_grep(call: &ToolCall, env: &ToolEnv, cancel: &CancellationToken) -> ToolResult {
    let start = Instant::now();

    let pattern_str = match call.require_string("pattern") {
        Ok(p) => p,
        Err(e) => return ToolResult::failure(GREP, ToolError::invalid_argument(e)),
    };

    let path = call
        .get_string("path")
        .map(|p| env.resolve(p))
        .unwrap_or_else(|| env.cwd().to_path_buf());
    if !path.exists() {
        return ToolResult::failure(
            GREP,
            ToolError::invalid_argument(format!("Path not found: {}", path.display())),
        );
    }

    let file_pattern = call.get_string("file_pattern");
    let context_lines = call.get_u64("context_lines").unwrap_or(0) as usize;
    let case_insensitive = call.get_bool("case_insensitive").unwrap_or(false);

    let regex_pattern = if case_insensitive {
        format!("(?i){}", pattern_str)
    } else {
        pattern_str.to_string()
    };
    let regex = match Regex::new(&regex_pattern) {
        Ok(r) => r,
        Err(e) => {
            return ToolResult::failure(
                GREP,
                ToolError::invalid_argument(format!("Invalid regex pattern: {}", e)),
            );
        }
    };

    let files = if path.is_file() {
        vec![path.clone()]
    } else {
        collect_files(&path, file_pattern)
    };

    let mut results = Vec::new();
    let mut total_matches = 0;

    for file_path in files {
        if cancel.is_cancelled() {
            return ToolResult::failure(GREP, ToolError::cancelled());
        }
        if results.len() >= MAX_RESULTS {
            break;
        }

        if let Ok(metadata) = fs::metadata(&file_path)
            && metadata.len() > MAX_GREP_FILE_SIZE
        {
            continue;
        }

        // Binary and unreadable files are skipped
        let Ok(content) = fs::read_to_string(&file_path) else {
            continue;
        };
        let lines: Vec<&str> = content.lines().collect();
        let file_display = display_path(&file_path, env.cwd());

        for (line_num, line) in lines.iter().enumerate() {
            if results.len() >= MAX_RESULTS {
                break;
            }
            if !regex.is_match(line) {
                continue;
            }
            total_matches += 1;

            if context_lines > 0 {
                let start_line = line_num.saturating_sub(context_lines);
                let end_line = (line_num + context_lines + 1).min(lines.len());

                let mut context_result = format!("{}:", file_display);
                for (i, ctx_line) in lines[start_line..end_line].iter().enumerate() {
                    let actual_line_num = start_line + i + 1;
                    let marker = if actual_line_num == line_num + 1 {
                        ">"
                    } else {
                        " "
                    };
                    context_result.push_str(&format!(
                        "\n{}{}: {}",
                        marker, actual_line_num, ctx_line
                    ));
                }
                results.push(context_result);
            } else {
                results.push(format!("{}:{}: {}", file_display, line_num + 1, line));
            }
        }
    }

    let mut output = results.join("\n");
    if total_matches >= MAX_RESULTS {
        output.push_str(&format!("\n... (limited to {} matches)", MAX_RESULTS));
    }
    if results.is_empty() {
        output = "No matches found".to_string();
    }

    ToolResult::success(GREP, output).with_metadata(ToolResultMetadata {
        duration_ms: Some(start.elapsed().as_millis() as u64),
        match_count: Some(total_matches),
        path: Some(path.display().to_string()),
        ..Default::default()
    })
}

/// Collect files from a directory, optionally filtered by a glob pattern
fn collect_files(dir: &Path, file_pattern: Option<&str>) -> Vec<PathBuf> {
    let pattern = match file_pattern {
        Some(p) if p.contains('/') => p.to_string(),
        Some(p) => format!("**/{}", p),
        None => "**/*".to_string(),
    };
    let full_pattern = format!("{}/{}", dir.display(), pattern);

    let mut files = Vec::new();
    if let Ok(paths) = glob(&full_pattern) {
        for entry in paths.flatten() {
            if files.len() >= MAX_RESULTS {
                break;
            }
            if entry.is_file() {
                files.push(entry);
            }
        }
    }
    files
}

//! Runs one hook command: event JSON in on stdin, reply JSON out on stdout.
//!
//! The reply may carry `{"inject_message": "...", "block": true}`. Both
//! fields are optional and empty stdout is an empty reply.

use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tether_domain::util::preview;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace};

/// Default time a hook command may run
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(30);

/// What a hook printed.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct HookReply {
    #[serde(default)]
    pub inject_message: Option<String>,
    #[serde(default)]
    pub block: bool,
}

impl HookReply {
    /// The injected message, unless it is blank.
    pub fn message(self) -> Option<String> {
        self.inject_message.filter(|m| !m.trim().is_empty())
    }
}

/// Why a hook run produced no reply
#[derive(Error, Debug)]
pub(crate) enum HookFailure {
    #[error("failed to run hook: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Hook timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// Stderr when the hook wrote any, otherwise the exit status
    #[error("{0}")]
    Exit(String),

    #[error("invalid hook output: {0}")]
    InvalidOutput(String),
}

impl HookFailure {
    pub fn exit(code: Option<i32>, stderr: &str) -> Self {
        let stderr = stderr.trim();
        HookFailure::Exit(match code {
            _ if !stderr.is_empty() => stderr.to_string(),
            Some(code) => format!("Exit code {}", code),
            None => "terminated by signal".to_string(),
        })
    }
}

/// A `sh -c` command with its timeout and working directory.
#[derive(Debug, Clone)]
pub(crate) struct HookCommand {
    command: String,
    timeout: Duration,
    cwd: Option<PathBuf>,
}

impl HookCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: DEFAULT_HOOK_TIMEOUT,
            cwd: None,
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn set_cwd(&mut self, cwd: PathBuf) {
        self.cwd = Some(cwd);
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Run with `payload` plus `"event": event` on stdin.
    pub async fn run<T: serde::Serialize>(
        &self,
        event: &str,
        payload: &T,
    ) -> Result<HookReply, HookFailure> {
        let mut input = serde_json::to_value(payload)
            .map_err(|e| HookFailure::InvalidOutput(e.to_string()))?;
        if let Some(obj) = input.as_object_mut() {
            obj.insert("event".into(), Value::from(event));
        }
        let input = input.to_string();
        trace!(hook = %self.command, event, "Running hook");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(HookFailure::Spawn)?;
        let stdin = child.stdin.take();

        let run = async move {
            if let Some(mut stdin) = stdin {
                // A hook that ignores stdin may exit before reading it
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    debug!(error = %e, "Hook closed stdin early");
                }
                drop(stdin);
            }
            child.wait_with_output().await
        };

        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(result) => result.map_err(HookFailure::Spawn)?,
            Err(_) => return Err(HookFailure::Timeout(self.timeout)),
        };

        if !output.status.success() {
            return Err(HookFailure::exit(
                output.status.code(),
                &String::from_utf8_lossy(&output.stderr),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() {
            return Ok(HookReply::default());
        }
        serde_json::from_str(stdout).map_err(|_| HookFailure::InvalidOutput(preview(stdout, 200)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_reply_fields_are_parsed() {
        let hook = HookCommand::new(r#"echo '{"block": true, "inject_message": "why"}'"#);
        let reply = hook.run("tool_start", &json!({})).await.unwrap();
        assert!(reply.block);
        assert_eq!(reply.message().as_deref(), Some("why"));
    }

    #[tokio::test]
    async fn test_event_name_is_added_to_payload() {
        let hook = HookCommand::new(
            r#"grep -q '"event":"tool_end"' && echo '{"inject_message":"ok"}'"#,
        );
        let reply = hook
            .run("tool_end", &json!({"tool_name": "Read"}))
            .await
            .unwrap();
        assert_eq!(reply.message().as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_stderr_becomes_exit_detail() {
        let hook = HookCommand::new("echo 'not on main' >&2; exit 1");
        let failure = hook.run("prompt_submit", &json!({})).await.unwrap_err();
        assert!(matches!(failure, HookFailure::Exit(_)));
        assert_eq!(failure.to_string(), "not on main");
    }

    #[tokio::test]
    async fn test_blank_message_is_dropped() {
        let hook = HookCommand::new(r#"echo '{"inject_message": "  "}'"#);
        let reply = hook.run("loop_end", &json!({})).await.unwrap();
        assert!(reply.message().is_none());
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(
            HookFailure::Timeout(Duration::from_secs(30)).to_string(),
            "Hook timed out after 30s"
        );
        assert_eq!(HookFailure::exit(Some(2), "").to_string(), "Exit code 2");
        assert_eq!(HookFailure::exit(None, " \n").to_string(), "terminated by signal");
        assert_eq!(
            HookFailure::InvalidOutput("hello".into()).to_string(),
            "invalid hook output: hello"
        );
    }
}

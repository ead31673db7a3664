//! Console rendering of session notifications
//!
//! Agent text streams to stdout as it arrives. Everything else (tool
//! activity, permission prompts, continuation status, errors) goes to
//! stderr so stdout can be piped.

use crate::progress::reporter::ActivitySpinner;
use colored::Colorize;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use tether_application::{Notification, NotificationSink};
use tether_domain::{ApprovalStatus, ChunkKind, StopReason, TerminalState, TurnState};

/// Which stream a rendered piece goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Stdout,
    Stderr,
}

/// One piece of console output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub target: Target,
    pub text: String,
    /// Streamed text is written as-is; everything else ends the line
    pub newline: bool,
}

impl Rendered {
    fn stdout(text: impl Into<String>) -> Self {
        Self {
            target: Target::Stdout,
            text: text.into(),
            newline: false,
        }
    }

    fn stderr(text: impl Into<String>) -> Self {
        Self {
            target: Target::Stderr,
            text: text.into(),
            newline: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleOptions {
    /// Only the agent's text and errors
    pub quiet: bool,
    /// Stream reasoning chunks (dimmed, on stderr)
    pub show_reasoning: bool,
}

/// [`NotificationSink`] that renders to the terminal.
pub struct ConsoleNotifier {
    options: ConsoleOptions,
    spinner: ActivitySpinner,
    /// Streamed text left the cursor mid-line
    mid_line: AtomicBool,
}

impl ConsoleNotifier {
    pub fn new(options: ConsoleOptions) -> Self {
        Self {
            options,
            spinner: ActivitySpinner::new(!options.quiet),
            mid_line: AtomicBool::new(false),
        }
    }

    /// Text for `notification`, if it is shown at all.
    pub fn render(&self, notification: &Notification) -> Option<Rendered> {
        let quiet = self.options.quiet;
        match notification {
            Notification::Chunk {
                kind: ChunkKind::Text,
                text,
            } => Some(Rendered::stdout(text.clone())),
            Notification::Chunk {
                kind: ChunkKind::Reasoning,
                text,
            } if self.options.show_reasoning => Some(Rendered {
                target: Target::Stderr,
                text: text.dimmed().to_string(),
                newline: false,
            }),
            Notification::ToolCallReady { id, name } if !quiet => Some(Rendered::stderr(format!(
                "{} {} {}",
                "->".cyan(),
                name.bold(),
                format!("({})", id).dimmed()
            ))),
            Notification::ToolCallFailed { id, name, message } if !quiet => {
                Some(Rendered::stderr(format!(
                    "{} {} ({}): {}",
                    "x".red(),
                    name.bold(),
                    id,
                    message
                )))
            }
            Notification::PermissionRequested {
                tool_call_id,
                tool_name,
                ..
            } if !quiet => Some(Rendered::stderr(format!(
                "{} Permission requested for {} ({})",
                "?".yellow(),
                tool_name.as_deref().unwrap_or("unknown tool").bold(),
                tool_call_id
            ))),
            Notification::PermissionResponded {
                tool_call_id,
                status: ApprovalStatus::Error,
                ..
            } if !quiet => Some(Rendered::stderr(format!(
                "  {} reported a failed result for {}",
                "x".red(),
                tool_call_id
            ))),
            Notification::ToolCompleted {
                name,
                success,
                preview,
                duration_ms,
                ..
            } if !quiet => {
                let mark = if *success { "v".green() } else { "x".red() };
                let timing = duration_ms
                    .map(|ms| format!(" ({}ms)", ms))
                    .unwrap_or_default();
                let first_line = preview.lines().next().unwrap_or_default();
                Some(Rendered::stderr(format!(
                    "  {} {}{} {}",
                    mark,
                    name,
                    timing,
                    first_line.dimmed()
                )))
            }
            Notification::BackendError { detail } => Some(Rendered::stderr(format!(
                "{} {}",
                "Backend error:".yellow().bold(),
                detail
            ))),
            Notification::TurnFinished {
                outcome: TerminalState::Cancelled,
                reason,
                ..
            } => Some(Rendered::stderr(format!(
                "{} {}",
                "Turn cancelled:".yellow().bold(),
                reason
            ))),
            Notification::TurnFinished {
                outcome: TerminalState::Failed,
                reason,
                ..
            } => Some(Rendered::stderr(format!(
                "{} {}",
                "Turn failed:".red().bold(),
                reason
            ))),
            Notification::ContinuationFired {
                iteration,
                max_iterations,
                ..
            } if !quiet => Some(Rendered::stderr(format!(
                "{} Continuing ({}/{})",
                "->".cyan(),
                iteration,
                max_iterations
            ))),
            Notification::ContinuationStopped {
                reason: StopReason::ContinuationLimitExceeded,
                iteration,
            } => Some(Rendered::stderr(format!(
                "{} Continuation limit reached after {} iterations",
                "!".yellow().bold(),
                iteration
            ))),
            Notification::PromptBlocked { reason } => Some(Rendered::stderr(format!(
                "{} {}",
                "Prompt blocked:".yellow().bold(),
                reason
            ))),
            Notification::Disconnected { reason } => Some(Rendered::stderr(format!(
                "{} {}",
                "Disconnected:".red().bold(),
                reason
            ))),
            _ => None,
        }
    }

    fn update_spinner(&self, notification: &Notification) {
        match notification {
            Notification::StateChanged {
                to: TurnState::Submitting,
                ..
            } => self.spinner.start("Waiting for agent..."),
            Notification::ToolRunning { name, .. } => {
                self.spinner.start(format!("Running {}...", name))
            }
            Notification::Chunk { .. }
            | Notification::ToolCompleted { .. }
            | Notification::TurnFinished { .. }
            | Notification::Disconnected { .. } => self.spinner.stop(),
            Notification::StateChanged {
                to: TurnState::Terminal(_),
                ..
            } => self.spinner.stop(),
            _ => {}
        }
    }

    fn write(&self, rendered: Rendered) {
        let was_mid_line = self.mid_line.load(Ordering::Relaxed);
        let result = self.spinner.suspend(|| match rendered.target {
            Target::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(rendered.text.as_bytes())?;
                out.flush()
            }
            Target::Stderr => {
                if was_mid_line {
                    println!();
                }
                let mut err = io::stderr().lock();
                if rendered.newline {
                    writeln!(err, "{}", rendered.text)
                } else {
                    write!(err, "{}", rendered.text)
                }
            }
        });
        // A closed pipe is not worth failing the turn over
        if result.is_err() {
            return;
        }

        match rendered.target {
            Target::Stdout if !rendered.text.is_empty() => self
                .mid_line
                .store(!rendered.text.ends_with('\n'), Ordering::Relaxed),
            Target::Stderr if was_mid_line => self.mid_line.store(false, Ordering::Relaxed),
            _ => {}
        }
    }

    fn end_line(&self) {
        if self.mid_line.swap(false, Ordering::Relaxed) {
            println!();
        }
    }
}

impl NotificationSink for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        self.update_spinner(&notification);

        if let Notification::MessageFinalized(message) = &notification
            && message.kind == ChunkKind::Text
        {
            self.end_line();
            return;
        }

        if let Some(rendered) = self.render(&notification) {
            self.write(rendered);
        }
    }
}

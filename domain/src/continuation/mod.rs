//! Continuation (human-out-of-the-loop) value types.
//!
//! After a turn completes, continuation hooks decide whether a follow-up
//! prompt is injected automatically. The decision is a closed type so the
//! loop stays total: there is no sentinel value to forget to check.

use serde::{Deserialize, Serialize};

/// Decision returned by a continuation hook, and by the engine overall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "prompt", rename_all = "snake_case")]
pub enum ContinuationDecision {
    Stop,
    Continue(String),
}

impl ContinuationDecision {
    pub fn is_continue(&self) -> bool {
        matches!(self, ContinuationDecision::Continue(_))
    }

    pub fn prompt(&self) -> Option<&str> {
        match self {
            ContinuationDecision::Continue(p) => Some(p),
            ContinuationDecision::Stop => None,
        }
    }
}

/// Why a continuation chain stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every hook returned `Stop`, or none are registered
    HooksDeclined,
    /// A hook asked to continue but the iteration ceiling was reached
    ContinuationLimitExceeded,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::HooksDeclined => "hooks_declined",
            StopReason::ContinuationLimitExceeded => "continuation_limit_exceeded",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted continuation state of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingContinuation {
    /// Continuations fired so far in the current chain
    pub iteration: u32,
    pub max_iterations: u32,
    /// Last prompt injected by a hook
    pub last_prompt: Option<String>,
}

impl PendingContinuation {
    pub fn new(max_iterations: u32) -> Self {
        Self {
            iteration: 0,
            max_iterations,
            last_prompt: None,
        }
    }

    pub fn limit_reached(&self) -> bool {
        self.iteration >= self.max_iterations
    }

    /// Record a fired continuation.
    pub fn advance(&mut self, prompt: impl Into<String>) {
        self.iteration += 1;
        self.last_prompt = Some(prompt.into());
    }

    /// Start a fresh chain, as after a human prompt.
    pub fn reset(&mut self) {
        self.iteration = 0;
        self.last_prompt = None;
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text inside the first `<promise>...</promise>` tag, whitespace-normalized.
pub fn extract_promise(message: &str) -> Option<String> {
    const OPEN: &str = "<promise>";
    const CLOSE: &str = "</promise>";

    let start = message.find(OPEN)? + OPEN.len();
    let end = message[start..].find(CLOSE)? + start;
    Some(normalize_whitespace(&message[start..end]))
}

/// Whether `message` fulfils the completion promise `promise`.
pub fn promise_fulfilled(message: &str, promise: &str) -> bool {
    extract_promise(message).is_some_and(|found| found == normalize_whitespace(promise))
}

//! Turn state machine.
//!
//! ```text
//! Idle ─▶ Submitting ─▶ Streaming ⇄ AwaitingApproval
//!              │            │              │
//!              │            └──▶ Completing ◀┘
//!              │                     │
//!              └────────────▶ Terminal(Completed | Cancelled | Failed)
//! ```
//!
//! Every non-terminal state may move straight to `Terminal(Cancelled)` or
//! `Terminal(Failed)`. Terminal states are final.

use serde::{Deserialize, Serialize};

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Completed,
    Cancelled,
    Failed,
}

impl TerminalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalState::Completed => "completed",
            TerminalState::Cancelled => "cancelled",
            TerminalState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TerminalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Current state of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "outcome", rename_all = "snake_case")]
pub enum TurnState {
    Idle,
    Submitting,
    Streaming,
    AwaitingApproval,
    Completing,
    Terminal(TerminalState),
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Terminal(_))
    }

    pub fn terminal(&self) -> Option<TerminalState> {
        match self {
            TurnState::Terminal(t) => Some(*t),
            _ => None,
        }
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: TurnState) -> bool {
        use TurnState::*;

        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Terminal(TerminalState::Cancelled)) | (_, Terminal(TerminalState::Failed)) => true,
            (Idle, Submitting) => true,
            (Submitting, Streaming) => true,
            (Streaming, AwaitingApproval) => true,
            (AwaitingApproval, Streaming) => true,
            (Streaming, Completing) | (AwaitingApproval, Completing) => true,
            (Completing, Terminal(TerminalState::Completed)) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TurnState::Idle => "idle",
            TurnState::Submitting => "submitting",
            TurnState::Streaming => "streaming",
            TurnState::AwaitingApproval => "awaiting_approval",
            TurnState::Completing => "completing",
            TurnState::Terminal(t) => match t {
                TerminalState::Completed => "terminal(completed)",
                TerminalState::Cancelled => "terminal(cancelled)",
                TerminalState::Failed => "terminal(failed)",
            },
        }
    }
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

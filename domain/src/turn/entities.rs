//! Turn entity: one prompt and the backend's response to it.

use super::state::{TerminalState, TurnState};
use crate::approval::{ApprovalRequest, ApprovalResponse};
use crate::core::error::DomainError;
use crate::protocol::event::ProtocolEvent;
use crate::util::current_timestamp_ms;
use serde::{Deserialize, Serialize};

/// Per-session sequential turn identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TurnId(u64);

impl TurnId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "turn-{}", self.0)
    }
}

/// One entry of a turn's ordered audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum TurnLogEntry {
    Event { at: u64, event: ProtocolEvent },
    Transition { at: u64, from: TurnState, to: TurnState },
    ApprovalResponded { at: u64, response: ApprovalResponse },
    Rejected { at: u64, reason: String },
}

/// A single conversational turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    id: TurnId,
    prompt: String,
    state: TurnState,
    log: Vec<TurnLogEntry>,
    pending_approvals: Vec<ApprovalRequest>,
    terminal_reason: Option<String>,
}

impl Turn {
    pub fn new(id: TurnId, prompt: impl Into<String>) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            state: TurnState::Idle,
            log: Vec::new(),
            pending_approvals: Vec::new(),
            terminal_reason: None,
        }
    }

    pub fn id(&self) -> TurnId {
        self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn log(&self) -> &[TurnLogEntry] {
        &self.log
    }

    pub fn terminal_reason(&self) -> Option<&str> {
        self.terminal_reason.as_deref()
    }

    /// Move to `next`, recording the transition.
    pub fn transition(&mut self, next: TurnState) -> Result<(), DomainError> {
        if self.state == next {
            return Ok(());
        }
        if !self.state.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.log.push(TurnLogEntry::Transition {
            at: current_timestamp_ms(),
            from: self.state,
            to: next,
        });
        self.state = next;
        Ok(())
    }

    /// Move to a terminal state with a human-readable reason.
    pub fn terminate(
        &mut self,
        outcome: TerminalState,
        reason: impl Into<String>,
    ) -> Result<(), DomainError> {
        self.transition(TurnState::Terminal(outcome))?;
        self.terminal_reason = Some(reason.into());
        Ok(())
    }

    pub fn record_event(&mut self, event: &ProtocolEvent) {
        self.log.push(TurnLogEntry::Event {
            at: current_timestamp_ms(),
            event: event.clone(),
        });
    }

    pub fn record_rejection(&mut self, reason: impl Into<String>) {
        self.log.push(TurnLogEntry::Rejected {
            at: current_timestamp_ms(),
            reason: reason.into(),
        });
    }

    pub fn add_pending_approval(&mut self, request: ApprovalRequest) {
        self.pending_approvals.push(request);
    }

    pub fn pending_approvals(&self) -> &[ApprovalRequest] {
        &self.pending_approvals
    }

    pub fn has_pending_approvals(&self) -> bool {
        !self.pending_approvals.is_empty()
    }

    pub fn is_pending(&self, approval_id: &str) -> bool {
        self.pending_approvals.iter().any(|r| r.id == approval_id)
    }

    /// Remove a pending approval and log the response sent for it.
    ///
    /// Returns `None` if no approval with that id is pending, so a request
    /// is never answered twice.
    pub fn resolve_approval(&mut self, response: &ApprovalResponse) -> Option<ApprovalRequest> {
        let index = self
            .pending_approvals
            .iter()
            .position(|r| r.id == response.id)?;
        let request = self.pending_approvals.remove(index);
        self.log.push(TurnLogEntry::ApprovalResponded {
            at: current_timestamp_ms(),
            response: response.clone(),
        });
        Some(request)
    }

    /// Number of transitions into `state` recorded in the log.
    pub fn transitions_into(&self, state: TurnState) -> usize {
        self.log
            .iter()
            .filter(|e| matches!(e, TurnLogEntry::Transition { to, .. } if *to == state))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_are_logged() {
        let mut turn = Turn::new(TurnId::new(1), "list files");
        turn.transition(TurnState::Submitting).unwrap();
        turn.transition(TurnState::Streaming).unwrap();
        assert_eq!(turn.state(), TurnState::Streaming);
        assert_eq!(turn.log().len(), 2);
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let mut turn = Turn::new(TurnId::new(1), "x");
        let err = turn.transition(TurnState::Completing).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
        assert_eq!(turn.state(), TurnState::Idle);
    }

    #[test]
    fn test_terminate_is_once_only() {
        let mut turn = Turn::new(TurnId::new(1), "x");
        turn.transition(TurnState::Submitting).unwrap();
        turn.terminate(TerminalState::Cancelled, "Cancelled by user")
            .unwrap();
        assert!(turn.terminate(TerminalState::Failed, "late").is_err());
        assert_eq!(turn.terminal_reason(), Some("Cancelled by user"));
        assert_eq!(
            turn.transitions_into(TurnState::Terminal(TerminalState::Cancelled)),
            1
        );
    }

    #[test]
    fn test_resolve_approval_only_once() {
        let mut turn = Turn::new(TurnId::new(1), "x");
        turn.add_pending_approval(ApprovalRequest::new("A", "1"));
        turn.add_pending_approval(ApprovalRequest::new("B", "2"));

        let response = ApprovalResponse::error(&ApprovalRequest::new("A", "1"), "boom");
        assert!(turn.resolve_approval(&response).is_some());
        assert!(turn.resolve_approval(&response).is_none());
        assert_eq!(turn.pending_approvals().len(), 1);
        assert!(turn.is_pending("B"));
    }

    #[test]
    fn test_turn_id_display_and_next() {
        let id = TurnId::new(3);
        assert_eq!(id.to_string(), "turn-3");
        assert_eq!(id.next().value(), 4);
    }
}

//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid turn transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),
}

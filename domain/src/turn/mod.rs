//! Turn domain: one prompt/response cycle and its state machine.

pub mod entities;
pub mod state;

pub use entities::{Turn, TurnId, TurnLogEntry};
pub use state::{TerminalState, TurnState};

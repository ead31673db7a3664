//! Use cases for the application layer
//!
//! - [`dispatch`]: tool call dispatcher and the turn-scoped dispatch queue
//! - [`approval`]: approval correlator
//! - [`run_turn`]: turn controller state machine
//! - [`continuation`]: continuation engine
//! - [`lifecycle`]: prompt, tool and message hooks
//! - [`hotl`]: built-in human-out-of-the-loop hook
//! - [`session`]: session: one open turn plus the continuation chain

pub mod approval;
pub mod continuation;
pub mod dispatch;
pub mod hotl;
pub mod lifecycle;
pub mod run_turn;
pub mod session;

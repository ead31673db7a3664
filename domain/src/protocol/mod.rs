//! Wire-independent representation of the backend event stream.

pub mod event;

pub use event::{ChunkKind, ProtocolEvent, TurnEndReason};

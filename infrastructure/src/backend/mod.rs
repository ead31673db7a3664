//! Remote agent backend adapter
//!
//! Implements [`AgentBackend`](tether_application::AgentBackend) over a
//! JSON-RPC connection (TCP or a spawned process) with reconnect backoff.

pub mod channel;
pub mod connector;
pub mod decoder;
pub mod error;
pub mod framing;
pub mod gateway;
pub mod protocol;
pub mod router;

pub use channel::{ReconnectPolicy, TransportChannel};
pub use connector::{Connector, ProcessConnector, TcpConnector};
pub use error::{DecodeError, TransportError};
pub use framing::FrameFormat;
pub use gateway::RemoteAgentBackend;

//! Infrastructure layer for tether
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: the remote agent backend, local tools,
//! shell hooks, file persistence and configuration loading.

pub mod backend;
pub mod config;
pub mod continuation;
pub mod hooks;
pub mod logging;
pub mod tools;

// Re-export commonly used types
pub use backend::{
    Connector, FrameFormat, ProcessConnector, ReconnectPolicy, RemoteAgentBackend, TcpConnector,
    TransportError,
};
pub use config::{ConfigLoader, ConfigValidationError, FileConfig, TransportKind};
pub use continuation::FileContinuationStore;
pub use hooks::{HookEvent, ShellContinuationHook, ShellLifecycleHook};
pub use logging::JsonlConversationLogger;
pub use tools::LocalToolRegistry;

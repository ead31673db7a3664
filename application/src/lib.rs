//! Application layer for tether
//!
//! This crate contains the orchestration use cases and the port definitions
//! they depend on. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::SessionParams;
pub use ports::{
    agent_backend::{AgentBackend, BackendError, ConnectionState, EventStream},
    continuation::{
        ContinuationHook, ContinuationStore, InMemoryContinuationStore, LoopEndContext, StoreError,
    },
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    lifecycle_hook::{
        LifecycleHook, MessageContext, PromptContext, PromptVerdict, ToolEndContext,
        ToolStartContext, ToolVerdict,
    },
    notification::{NoNotifications, Notification, NotificationSink},
    tool_registry::{ToolHandler, ToolRegistryPort},
};
pub use use_cases::approval::ApprovalCorrelator;
pub use use_cases::continuation::{ContinuationEngine, ContinuationOutcome};
pub use use_cases::dispatch::{DispatchCompletion, DispatchQueue, ToolCallDispatcher};
pub use use_cases::hotl::HotlHook;
pub use use_cases::lifecycle::{LifecycleHooks, PromptGate};
pub use use_cases::run_turn::{TurnController, TurnHandle, TurnOutcome};
pub use use_cases::session::{Session, SessionBuilder, SessionError, SessionReport};

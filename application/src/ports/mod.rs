//! Ports (interfaces) for the application layer
//!
//! Ports define the boundaries between the application and the outside
//! world. Adapters live in the infrastructure and presentation layers.

pub mod agent_backend;
pub mod continuation;
pub mod conversation_logger;
pub mod lifecycle_hook;
pub mod notification;
pub mod tool_registry;

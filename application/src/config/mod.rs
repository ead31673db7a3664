//! Application-level configuration.
//!
//! - [`SessionParams`]: turn and continuation loop control

pub mod session_params;

pub use session_params::SessionParams;

//! Presentation layer for tether
//!
//! This crate contains the CLI definition, console rendering of session
//! notifications, and the activity spinner.

pub mod cli;
pub mod output;
pub mod progress;

// Re-export commonly used types
pub use cli::commands::Cli;
pub use output::console::{ConsoleNotifier, ConsoleOptions};
pub use progress::reporter::ActivitySpinner;

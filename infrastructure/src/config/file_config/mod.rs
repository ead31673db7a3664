//! Raw TOML configuration data types
//!
//! These structs mirror the config file one section per module. Every
//! field has a default so partial files deserialize.

mod backend;
mod continuation;
mod hooks;
mod logging;
mod reconnect;
mod turn;

pub use backend::{FileBackendConfig, TransportKind};
pub use continuation::FileContinuationConfig;
pub use hooks::FileHooksConfig;
pub use logging::FileLoggingConfig;
pub use reconnect::FileReconnectConfig;
pub use turn::FileTurnConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tether_application::SessionParams;
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    #[error("reconnect.max_attempts cannot be 0")]
    ZeroReconnectAttempts,

    #[error("reconnect.initial_delay_ms cannot be 0")]
    ZeroInitialDelay,

    #[error("reconnect.max_delay_ms ({max}) is less than initial_delay_ms ({initial})")]
    MaxDelayBelowInitial { initial: u64, max: u64 },

    #[error("continuation.max_iterations cannot be 0")]
    ZeroMaxIterations,

    #[error("backend.command is required for the process transport")]
    MissingCommand,

    #[error("backend.address cannot be empty for the tcp transport")]
    MissingAddress,
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub backend: FileBackendConfig,
    pub reconnect: FileReconnectConfig,
    pub turn: FileTurnConfig,
    pub continuation: FileContinuationConfig,
    pub hooks: FileHooksConfig,
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning every problem found.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        let reconnect = &self.reconnect;
        if reconnect.max_attempts == 0 {
            errors.push(ConfigValidationError::ZeroReconnectAttempts);
        }
        if reconnect.initial_delay_ms == 0 {
            errors.push(ConfigValidationError::ZeroInitialDelay);
        } else if reconnect.max_delay_ms < reconnect.initial_delay_ms {
            errors.push(ConfigValidationError::MaxDelayBelowInitial {
                initial: reconnect.initial_delay_ms,
                max: reconnect.max_delay_ms,
            });
        }

        if self.continuation.max_iterations == 0 {
            errors.push(ConfigValidationError::ZeroMaxIterations);
        }

        match self.backend.transport {
            TransportKind::Process if self.backend.command.trim().is_empty() => {
                errors.push(ConfigValidationError::MissingCommand)
            }
            TransportKind::Tcp if self.backend.address.trim().is_empty() => {
                errors.push(ConfigValidationError::MissingAddress)
            }
            _ => {}
        }

        errors
    }

    /// Session parameters for a session rooted at `cwd`.
    pub fn session_params(&self, cwd: &Path) -> SessionParams {
        SessionParams::default()
            .with_cwd(cwd)
            .with_approval_timeout(self.turn.approval_timeout())
            .with_max_iterations(self.continuation.max_iterations)
    }
}

//! Configuration file loading for tether
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `TETHER_*` environment variables, `__` separating sections
//! 2. `--config <path>` specified file
//! 3. Project root: `./tether.toml` or `./.tether.toml`
//! 4. Global: `<config dir>/tether/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileBackendConfig, FileConfig, FileContinuationConfig,
    FileHooksConfig, FileLoggingConfig, FileReconnectConfig, FileTurnConfig, TransportKind,
};
pub use loader::ConfigLoader;

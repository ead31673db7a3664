//! Session parameters: turn and continuation loop control.
//!
//! [`SessionParams`] groups the static parameters the use cases need.
//! Loading them from files and the environment is an infrastructure concern.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Turn and continuation loop control parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionParams {
    /// Working directory for the session and for relative tool paths.
    pub cwd: PathBuf,
    /// Answer unresolved approvals with an error after this long.
    /// `None` waits until the turn is cancelled.
    pub approval_timeout: Option<Duration>,
    /// Ceiling on automatic continuations per chain.
    pub max_iterations: u32,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            cwd: PathBuf::from("."),
            approval_timeout: None,
            max_iterations: 10,
        }
    }
}

impl SessionParams {
    // ==================== Builder Methods ====================

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn with_approval_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.approval_timeout = timeout;
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let params = SessionParams::default();
        assert_eq!(params.max_iterations, 10);
        assert!(params.approval_timeout.is_none());
    }

    #[test]
    fn test_builder() {
        let params = SessionParams::default()
            .with_cwd("/tmp/work")
            .with_approval_timeout(Some(Duration::from_secs(5)))
            .with_max_iterations(3);

        assert_eq!(params.cwd, PathBuf::from("/tmp/work"));
        assert_eq!(params.approval_timeout, Some(Duration::from_secs(5)));
        assert_eq!(params.max_iterations, 3);
    }
}

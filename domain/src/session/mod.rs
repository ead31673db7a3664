//! Session identity.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Backend-assigned session identifier.
///
/// Stable across transport reconnects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Validate and wrap a session id.
    ///
    /// Ids are used as file names by the continuation store, so path
    /// separators and empty ids are refused.
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        let valid = !value.trim().is_empty()
            && value != "."
            && value != ".."
            && !value.contains(['/', '\\', '\0']);
        if valid {
            Ok(Self(value))
        } else {
            Err(DomainError::InvalidSessionId(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

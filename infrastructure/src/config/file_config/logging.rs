//! Transcript logging configuration (`[logging]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// JSONL transcript path; empty disables the transcript
    pub conversation_log: String,
}

impl FileLoggingConfig {
    pub fn conversation_log_path(&self) -> Option<PathBuf> {
        let path = self.conversation_log.trim();
        (!path.is_empty()).then(|| PathBuf::from(path))
    }
}

//! Turn configuration (`[turn]` section)

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTurnConfig {
    /// Seconds before an unanswered approval is failed; 0 waits forever
    pub approval_timeout_secs: u64,
}

impl FileTurnConfig {
    pub fn approval_timeout(&self) -> Option<Duration> {
        (self.approval_timeout_secs > 0).then(|| Duration::from_secs(self.approval_timeout_secs))
    }
}

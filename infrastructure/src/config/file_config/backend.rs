//! Backend connection configuration (`[backend]` section)

use crate::backend::{Connector, FrameFormat, ProcessConnector, TcpConnector};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// How the backend is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Tcp,
    Process,
}

/// Raw backend configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBackendConfig {
    pub transport: TransportKind,
    /// `host:port` for the tcp transport
    pub address: String,
    /// Program spawned by the process transport
    pub command: String,
    pub args: Vec<String>,
    pub framing: FrameFormat,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Tcp,
            address: "127.0.0.1:8765".to_string(),
            command: String::new(),
            args: Vec::new(),
            framing: FrameFormat::Ndjson,
        }
    }
}

impl FileBackendConfig {
    /// Build the connector for this transport. A spawned backend runs in `cwd`.
    pub fn connector(&self, cwd: &Path) -> Arc<dyn Connector> {
        match self.transport {
            TransportKind::Tcp => Arc::new(TcpConnector::new(self.address.clone())),
            TransportKind::Process => Arc::new(
                ProcessConnector::new(self.command.clone())
                    .with_args(self.args.clone())
                    .with_cwd(cwd),
            ),
        }
    }
}

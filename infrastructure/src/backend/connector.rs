//! Connectors produce the byte stream a [`TransportChannel`](super::channel::TransportChannel)
//! talks over. The channel calls [`Connector::connect`] once up front and
//! again for every reconnect attempt.

use super::error::{Result, TransportError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tracing::{debug, info};

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// An established byte stream.
pub struct Connection {
    pub reader: BoxedReader,
    pub writer: BoxedWriter,
    /// Backend child process, killed when the connection is dropped.
    pub child: Option<Child>,
}

impl Connection {
    pub fn new(reader: BoxedReader, writer: BoxedWriter) -> Self {
        Self {
            reader,
            writer,
            child: None,
        }
    }
}

#[async_trait]
pub trait Connector: Send + Sync {
    /// Human-readable description of what is being connected to.
    fn target(&self) -> String;

    async fn connect(&self) -> Result<Connection>;
}

/// Connects to a backend listening on `host:port`.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
}

impl TcpConnector {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    fn target(&self) -> String {
        self.address.clone()
    }

    async fn connect(&self) -> Result<Connection> {
        let stream = TcpStream::connect(&self.address)
            .await
            .map_err(|source| TransportError::ConnectFailed {
                target: self.target(),
                source,
            })?;
        stream.set_nodelay(true)?;
        debug!("Connected to {}", self.address);
        let (read_half, write_half) = stream.into_split();
        Ok(Connection::new(Box::new(read_half), Box::new(write_half)))
    }
}

/// Spawns the backend as a child process and talks over its stdin/stdout.
#[derive(Debug, Clone)]
pub struct ProcessConnector {
    command: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

impl ProcessConnector {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

#[async_trait]
impl Connector for ProcessConnector {
    fn target(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }

    async fn connect(&self) -> Result<Connection> {
        debug!("Spawning backend: {}", self.target());

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        // Linux: request kernel to send SIGTERM to child when parent dies.
        // This catches cases where Drop doesn't run (SIGKILL, OOM kill).
        #[cfg(target_os = "linux")]
        unsafe {
            cmd.pre_exec(|| {
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                Ok(())
            });
        }

        let mut child = cmd.spawn().map_err(|source| TransportError::ConnectFailed {
            target: self.target(),
            source,
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            TransportError::Io(std::io::Error::other("Failed to capture backend stdout"))
        })?;
        let stdin = child.stdin.take().ok_or_else(|| {
            TransportError::Io(std::io::Error::other("Failed to capture backend stdin"))
        })?;

        info!(pid = child.id(), "Backend process started: {}", self.command);
        Ok(Connection {
            reader: Box::new(stdout),
            writer: Box::new(stdin),
            child: Some(child),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_connector_reaches_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(socket).lines();
            lines.next_line().await.unwrap()
        });

        let mut connection = TcpConnector::new(address).connect().await.unwrap();
        connection.writer.write_all(b"hello\n").await.unwrap();
        connection.writer.flush().await.unwrap();

        assert_eq!(server.await.unwrap().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_tcp_connector_reports_target_on_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        match TcpConnector::new(address.clone()).connect().await {
            Err(TransportError::ConnectFailed { target, .. }) => assert_eq!(target, address),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("connected to a closed port"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_connector_talks_over_stdio() {
        let mut connection = ProcessConnector::new("cat").connect().await.unwrap();
        connection.writer.write_all(b"ping\n").await.unwrap();
        connection.writer.flush().await.unwrap();

        let mut lines = BufReader::new(connection.reader).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("ping"));
    }

    #[tokio::test]
    async fn test_process_connector_missing_binary() {
        let result = ProcessConnector::new("tether-no-such-backend-binary")
            .connect()
            .await;
        assert!(matches!(result, Err(TransportError::ConnectFailed { .. })));
    }
}

//! Error types for the backend adapter

use tether_application::BackendError;
use thiserror::Error;

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors raised by the transport channel and message router
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to connect to {target}: {source}")]
    ConnectFailed {
        target: String,
        source: std::io::Error,
    },

    #[error("Transport not connected")]
    NotConnected,

    #[error("Transport closed")]
    Closed,

    #[error("Message router stopped")]
    RouterStopped,

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("JSON-RPC error (code {code}): {message}")]
    Rpc { code: i64, message: String },
}

impl From<TransportError> for BackendError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Rpc { code, message } => BackendError::Rpc { code, message },
            TransportError::RouterStopped => BackendError::Disconnected,
            TransportError::Serialization(e) => BackendError::Protocol(e.to_string()),
            other => BackendError::Transport(other.to_string()),
        }
    }
}

/// Errors decoding a single inbound frame. The frame is dropped.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("event has no string `type` tag")]
    MissingType,

    #[error("invalid `{event_type}` event: {message}")]
    InvalidEvent { event_type: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_keeps_code() {
        let err: BackendError = TransportError::Rpc {
            code: -32000,
            message: "no such session".into(),
        }
        .into();
        assert_eq!(
            err,
            BackendError::Rpc {
                code: -32000,
                message: "no such session".into()
            }
        );
    }

    #[test]
    fn test_router_stopped_maps_to_disconnected() {
        let err: BackendError = TransportError::RouterStopped.into();
        assert!(err.is_disconnected());
    }

    #[test]
    fn test_connect_failed_message_names_target() {
        let err = TransportError::ConnectFailed {
            target: "127.0.0.1:1".into(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        assert!(err.to_string().starts_with("Failed to connect to 127.0.0.1:1"));
    }
}

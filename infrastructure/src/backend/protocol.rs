//! JSON-RPC protocol types for agent backend communication.
//!
//! This module defines the message structures used in the JSON-RPC 2.0
//! protocol spoken with the agent backend.
//!
//! # Protocol Overview
//!
//! - **Requests**: Client → backend (`session.create`, `session.load`, `session.prompt`)
//! - **Responses**: backend → Client (result or error)
//! - **Notifications**: both directions (`session.event` inbound;
//!   `session.cancel` and `approval.response` outbound)

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tether_domain::{ApprovalResponse, ToolDefinition};

pub const METHOD_SESSION_CREATE: &str = "session.create";
pub const METHOD_SESSION_LOAD: &str = "session.load";
pub const METHOD_SESSION_PROMPT: &str = "session.prompt";
pub const METHOD_SESSION_CANCEL: &str = "session.cancel";
pub const METHOD_SESSION_EVENT: &str = "session.event";
pub const METHOD_APPROVAL_RESPONSE: &str = "approval.response";

/// JSON-RPC "method not found" error code.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Per-connection request id counter.
#[derive(Debug)]
pub struct RequestIds(AtomicU64);

impl RequestIds {
    pub fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON-RPC request
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC response
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    pub id: Option<u64>,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcError>,
}

impl JsonRpcResponse {
    /// The result value, or the error object turned into a transport error.
    pub fn into_result(self) -> super::error::Result<serde_json::Value> {
        match (self.result, self.error) {
            (_, Some(err)) => Err(super::error::TransportError::Rpc {
                code: err.code,
                message: err.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(serde_json::Value::Null),
        }
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Outbound notification (no id, no response expected)
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
        }
    }
}

/// Error response to a request from the backend.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcErrorOut {
    pub jsonrpc: &'static str,
    pub id: serde_json::Value,
    pub error: RpcError,
}

impl JsonRpcErrorOut {
    pub fn method_not_found(id: serde_json::Value, method: &str) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            error: RpcError {
                code: METHOD_NOT_FOUND,
                message: format!("Method not found: {}", method),
                data: None,
            },
        }
    }
}

/// Tool definition advertised at session creation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl From<&ToolDefinition> for WireToolDefinition {
    fn from(definition: &ToolDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            description: definition.description.clone(),
            input_schema: definition.input_schema(),
        }
    }
}

/// Session creation parameters
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionParams {
    pub cwd: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<WireToolDefinition>,
}

/// Session creation result
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResult {
    pub session_id: String,
}

/// Parameters for `session.load`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSessionParams {
    pub session_id: String,
    pub cwd: String,
}

/// Parameters for `session.prompt`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptParams {
    pub session_id: String,
    pub content: String,
}

/// Parameters for `session.cancel`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelParams {
    pub session_id: String,
}

/// Parameters for `approval.response`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResponseParams<'a> {
    pub session_id: &'a str,
    #[serde(flatten)]
    pub response: &'a ApprovalResponse,
}

/// Session event params (from a `session.event` notification)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEventParams {
    pub session_id: String,
    pub event: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_domain::{ApprovalRequest, ToolParameter};

    #[test]
    fn test_request_ids_are_per_instance() {
        let a = RequestIds::new();
        let b = RequestIds::new();
        assert_eq!(a.next(), 1);
        assert_eq!(a.next(), 2);
        assert_eq!(b.next(), 1);
    }

    #[test]
    fn test_create_session_params_serialize_tools() {
        let definition = ToolDefinition::new("Glob", "Find files").with_parameter(
            ToolParameter::new("pattern", "Glob pattern", true),
        );
        let params = CreateSessionParams {
            cwd: "/work".into(),
            tools: vec![WireToolDefinition::from(&definition)],
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["cwd"], "/work");
        assert_eq!(json["tools"][0]["name"], "Glob");
        assert_eq!(json["tools"][0]["inputSchema"]["type"], "object");
    }

    #[test]
    fn test_create_session_params_without_tools_omits_field() {
        let params = CreateSessionParams {
            cwd: "/work".into(),
            tools: Vec::new(),
        };
        let json = serde_json::to_value(&params).unwrap();
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_approval_response_params_flatten() {
        let request = ApprovalRequest::new("A", "1");
        let response = ApprovalResponse::error(&request, "Cancelled by user");
        let params = ApprovalResponseParams {
            session_id: "s1",
            response: &response,
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "sessionId": "s1",
                "id": "A",
                "toolCallId": "1",
                "output": "Cancelled by user",
                "status": "error"
            })
        );
    }

    #[test]
    fn test_response_error_becomes_rpc_error() {
        let response: JsonRpcResponse = serde_json::from_value(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 3,
            "error": {"code": -32000, "message": "boom"}
        }))
        .unwrap();
        assert!(matches!(
            response.into_result(),
            Err(super::super::error::TransportError::Rpc { code: -32000, .. })
        ));
    }

    #[test]
    fn test_method_not_found_serializes() {
        let out = JsonRpcErrorOut::method_not_found(serde_json::json!(7), "fs.write");
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["error"]["code"], -32601);
    }
}

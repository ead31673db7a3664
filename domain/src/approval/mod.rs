//! Approval round-trip types.
//!
//! In the approval flow the backend never executes tools itself: it asks the
//! client for approval of a tool call, the client runs the tool locally and
//! answers with an [`ApprovalResponse`] carrying the tool output.

use crate::tool::value_objects::ToolResult;
use crate::util::current_timestamp_ms;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An approval request awaiting a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Correlation id of the request itself
    pub id: String,
    /// Tool call this request is about
    pub tool_call_id: String,
    /// Tool name, when the backend supplied it
    pub tool_name: Option<String>,
    /// Materialized arguments, when known
    pub arguments: Option<Value>,
    /// Milliseconds since the Unix epoch
    pub created_at: u64,
}

impl ApprovalRequest {
    pub fn new(id: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool_call_id: tool_call_id.into(),
            tool_name: None,
            arguments: None,
            created_at: current_timestamp_ms(),
        }
    }

    pub fn with_tool(mut self, name: Option<String>, arguments: Option<Value>) -> Self {
        self.tool_name = name;
        self.arguments = arguments;
        self
    }
}

/// Outcome reported to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Success,
    Error,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Success => "success",
            ApprovalStatus::Error => "error",
        }
    }
}

/// Response frame for one approval request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResponse {
    pub id: String,
    pub tool_call_id: String,
    pub output: String,
    pub status: ApprovalStatus,
}

impl ApprovalResponse {
    /// Response carrying a tool result.
    pub fn from_result(request: &ApprovalRequest, result: &ToolResult) -> Self {
        let status = if result.is_success() {
            ApprovalStatus::Success
        } else {
            ApprovalStatus::Error
        };
        Self {
            id: request.id.clone(),
            tool_call_id: request.tool_call_id.clone(),
            output: result.wire_output(),
            status,
        }
    }

    /// Error response with a human-readable reason.
    pub fn error(request: &ApprovalRequest, message: impl Into<String>) -> Self {
        Self {
            id: request.id.clone(),
            tool_call_id: request.tool_call_id.clone(),
            output: message.into(),
            status: ApprovalStatus::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ApprovalStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::value_objects::ToolError;

    #[test]
    fn test_response_from_success() {
        let request = ApprovalRequest::new("A", "1");
        let response =
            ApprovalResponse::from_result(&request, &ToolResult::success("Glob", "a.py"));
        assert_eq!(response.id, "A");
        assert_eq!(response.tool_call_id, "1");
        assert_eq!(response.output, "a.py");
        assert!(response.is_success());
    }

    #[test]
    fn test_response_from_failure_uses_error_text() {
        let request = ApprovalRequest::new("A", "1");
        let response = ApprovalResponse::from_result(
            &request,
            &ToolResult::failure("Nope", ToolError::not_found("Nope")),
        );
        assert_eq!(response.status, ApprovalStatus::Error);
        assert_eq!(response.output, "Unknown tool: Nope");
    }

    #[test]
    fn test_response_serializes_camel_case() {
        let request = ApprovalRequest::new("A", "1");
        let json = serde_json::to_value(ApprovalResponse::error(&request, "boom")).unwrap();
        assert_eq!(json["toolCallId"], "1");
        assert_eq!(json["status"], "error");
    }
}

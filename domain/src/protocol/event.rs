//! Protocol events streamed by the agent backend during a turn.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why the backend ended a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnEndReason {
    EndTurn,
    MaxTokens,
    MaxTurnRequests,
    Refusal,
    Cancelled,
    #[serde(other)]
    Other,
}

impl TurnEndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnEndReason::EndTurn => "end_turn",
            TurnEndReason::MaxTokens => "max_tokens",
            TurnEndReason::MaxTurnRequests => "max_turn_requests",
            TurnEndReason::Refusal => "refusal",
            TurnEndReason::Cancelled => "cancelled",
            TurnEndReason::Other => "other",
        }
    }
}

impl std::fmt::Display for TurnEndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of a streamed text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Text,
    Reasoning,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Text => "text",
            ChunkKind::Reasoning => "reasoning",
        }
    }
}

/// A single decoded event from the backend's event stream.
///
/// The set of variants is closed: anything the decoder does not recognise
/// is carried as [`ProtocolEvent::Unknown`] so newer backends keep working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolEvent {
    TextChunk {
        text: String,
    },
    ReasoningChunk {
        text: String,
    },
    ToolCallStart {
        id: String,
        name: String,
    },
    ToolCallDelta {
        id: String,
        #[serde(rename = "argFragment")]
        arg_fragment: String,
    },
    ToolCallEnd {
        id: String,
    },
    ApprovalRequest {
        id: String,
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        arguments: Option<Value>,
    },
    TurnEnd {
        reason: TurnEndReason,
    },
    Error {
        detail: String,
    },
    #[serde(skip_deserializing)]
    Unknown {
        raw: Value,
    },
}

impl ProtocolEvent {
    /// Wire tags of every variant the decoder maps explicitly.
    pub const KNOWN_TYPES: [&'static str; 8] = [
        "text_chunk",
        "reasoning_chunk",
        "tool_call_start",
        "tool_call_delta",
        "tool_call_end",
        "approval_request",
        "turn_end",
        "error",
    ];

    /// The wire tag of this event.
    pub fn type_name(&self) -> &'static str {
        match self {
            ProtocolEvent::TextChunk { .. } => "text_chunk",
            ProtocolEvent::ReasoningChunk { .. } => "reasoning_chunk",
            ProtocolEvent::ToolCallStart { .. } => "tool_call_start",
            ProtocolEvent::ToolCallDelta { .. } => "tool_call_delta",
            ProtocolEvent::ToolCallEnd { .. } => "tool_call_end",
            ProtocolEvent::ApprovalRequest { .. } => "approval_request",
            ProtocolEvent::TurnEnd { .. } => "turn_end",
            ProtocolEvent::Error { .. } => "error",
            ProtocolEvent::Unknown { .. } => "unknown",
        }
    }

    /// The chunk kind for text and reasoning chunks.
    pub fn chunk_kind(&self) -> Option<ChunkKind> {
        match self {
            ProtocolEvent::TextChunk { .. } => Some(ChunkKind::Text),
            ProtocolEvent::ReasoningChunk { .. } => Some(ChunkKind::Reasoning),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserializes_camel_case_fields() {
        let event: ProtocolEvent = serde_json::from_value(json!({
            "type": "tool_call_delta",
            "id": "1",
            "argFragment": "{\"pattern\""
        }))
        .unwrap();
        assert_eq!(
            event,
            ProtocolEvent::ToolCallDelta {
                id: "1".into(),
                arg_fragment: "{\"pattern\"".into()
            }
        );
    }

    #[test]
    fn test_approval_request_name_and_arguments_are_optional() {
        let event: ProtocolEvent = serde_json::from_value(json!({
            "type": "approval_request",
            "id": "A",
            "toolCallId": "1"
        }))
        .unwrap();
        match event {
            ProtocolEvent::ApprovalRequest {
                id,
                tool_call_id,
                name,
                arguments,
            } => {
                assert_eq!(id, "A");
                assert_eq!(tool_call_id, "1");
                assert!(name.is_none());
                assert!(arguments.is_none());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_unrecognised_turn_end_reason_maps_to_other() {
        let event: ProtocolEvent =
            serde_json::from_value(json!({"type": "turn_end", "reason": "quota"})).unwrap();
        assert_eq!(
            event,
            ProtocolEvent::TurnEnd {
                reason: TurnEndReason::Other
            }
        );
    }

    #[test]
    fn test_unknown_is_never_produced_by_serde() {
        let result: Result<ProtocolEvent, _> =
            serde_json::from_value(json!({"type": "unknown", "raw": {}}));
        assert!(result.is_err());
    }

    #[test]
    fn test_known_types_match_type_names() {
        let samples = [
            ProtocolEvent::TextChunk { text: "a".into() },
            ProtocolEvent::ReasoningChunk { text: "b".into() },
            ProtocolEvent::ToolCallStart {
                id: "1".into(),
                name: "Glob".into(),
            },
            ProtocolEvent::ToolCallDelta {
                id: "1".into(),
                arg_fragment: "{}".into(),
            },
            ProtocolEvent::ToolCallEnd { id: "1".into() },
            ProtocolEvent::ApprovalRequest {
                id: "A".into(),
                tool_call_id: "1".into(),
                name: None,
                arguments: None,
            },
            ProtocolEvent::TurnEnd {
                reason: TurnEndReason::EndTurn,
            },
            ProtocolEvent::Error {
                detail: "x".into(),
            },
        ];
        for (event, tag) in samples.iter().zip(ProtocolEvent::KNOWN_TYPES) {
            assert_eq!(event.type_name(), tag);
        }
    }
}

//! Inbound frame decoding.
//!
//! [`decode_frame`] classifies a raw JSON-RPC frame by its `id` / `method`
//! fields; [`decode_event`] maps a `session.event` payload onto the closed
//! [`ProtocolEvent`] enum. Both are pure.

use super::error::DecodeError;
use super::protocol::{JsonRpcResponse, METHOD_SESSION_EVENT, SessionEventParams};
use serde_json::Value;
use tether_domain::ProtocolEvent;

/// A classified inbound frame.
#[derive(Debug)]
pub enum InboundFrame {
    /// A response to a request we sent (has `id`, no `method`).
    Response { id: u64, response: JsonRpcResponse },
    /// A `session.event` notification.
    SessionEvent { session_id: String, event: Value },
    /// A request from the backend (has `id` + `method`).
    IncomingRequest { id: Value, method: String },
    /// Any other notification.
    Notification { method: String },
}

/// Classify one raw frame.
pub fn decode_frame(bytes: &[u8]) -> Result<InboundFrame, DecodeError> {
    let json: Value = serde_json::from_slice(bytes)?;
    let Some(object) = json.as_object() else {
        return Err(DecodeError::NotAnObject);
    };

    let id = object.get("id").filter(|v| !v.is_null()).cloned();
    let method = object
        .get("method")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    match (id, method) {
        (Some(id), Some(method)) => Ok(InboundFrame::IncomingRequest { id, method }),
        (Some(id), None) => {
            let numeric = id.as_u64().ok_or_else(|| DecodeError::InvalidEvent {
                event_type: "response".into(),
                message: format!("non-numeric response id {}", id),
            })?;
            let response: JsonRpcResponse = serde_json::from_value(json)?;
            Ok(InboundFrame::Response {
                id: numeric,
                response,
            })
        }
        (None, Some(method)) if method == METHOD_SESSION_EVENT => {
            let params = json.get("params").cloned().unwrap_or(Value::Null);
            let params: SessionEventParams =
                serde_json::from_value(params).map_err(|e| DecodeError::InvalidEvent {
                    event_type: METHOD_SESSION_EVENT.into(),
                    message: e.to_string(),
                })?;
            Ok(InboundFrame::SessionEvent {
                session_id: params.session_id,
                event: params.event,
            })
        }
        (None, Some(method)) => Ok(InboundFrame::Notification { method }),
        (None, None) => Err(DecodeError::InvalidEvent {
            event_type: "frame".into(),
            message: "neither `id` nor `method` present".into(),
        }),
    }
}

/// Map a `session.event` payload to a [`ProtocolEvent`].
///
/// Unrecognised `type` tags become [`ProtocolEvent::Unknown`] carrying the
/// raw payload.
pub fn decode_event(event: Value) -> Result<ProtocolEvent, DecodeError> {
    if !event.is_object() {
        return Err(DecodeError::NotAnObject);
    }
    let Some(event_type) = event.get("type").and_then(|t| t.as_str()) else {
        return Err(DecodeError::MissingType);
    };

    if !ProtocolEvent::KNOWN_TYPES.contains(&event_type) {
        return Ok(ProtocolEvent::Unknown { raw: event });
    }

    let event_type = event_type.to_string();
    serde_json::from_value(event).map_err(|e| DecodeError::InvalidEvent {
        event_type,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tether_domain::TurnEndReason;

    fn bytes(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn test_classify_response() {
        let frame = decode_frame(&bytes(json!({"jsonrpc": "2.0", "id": 1, "result": {}}))).unwrap();
        assert!(matches!(frame, InboundFrame::Response { id: 1, .. }));
    }

    #[test]
    fn test_classify_incoming_request() {
        let frame = decode_frame(&bytes(
            json!({"jsonrpc": "2.0", "id": "r-9", "method": "fs.read", "params": {}}),
        ))
        .unwrap();
        match frame {
            InboundFrame::IncomingRequest { id, method } => {
                assert_eq!(id, json!("r-9"));
                assert_eq!(method, "fs.read");
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_classify_session_event() {
        let frame = decode_frame(&bytes(json!({
            "jsonrpc": "2.0",
            "method": "session.event",
            "params": {"sessionId": "s1", "event": {"type": "text_chunk", "text": "hi"}}
        })))
        .unwrap();
        match frame {
            InboundFrame::SessionEvent { session_id, event } => {
                assert_eq!(session_id, "s1");
                assert_eq!(event["text"], "hi");
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_classify_other_notification() {
        let frame = decode_frame(&bytes(json!({"jsonrpc": "2.0", "method": "server.ping"}))).unwrap();
        assert!(matches!(frame, InboundFrame::Notification { method } if method == "server.ping"));
    }

    #[test]
    fn test_malformed_json_is_a_decode_error() {
        assert!(matches!(
            decode_frame(b"{not json"),
            Err(DecodeError::InvalidJson(_))
        ));
        assert!(matches!(decode_frame(b"[1,2]"), Err(DecodeError::NotAnObject)));
    }

    #[test]
    fn test_decode_tool_call_delta() {
        let event = decode_event(json!({
            "type": "tool_call_delta",
            "id": "1",
            "argFragment": "{\"pattern\":"
        }))
        .unwrap();
        assert_eq!(
            event,
            ProtocolEvent::ToolCallDelta {
                id: "1".into(),
                arg_fragment: "{\"pattern\":".into()
            }
        );
    }

    #[test]
    fn test_decode_approval_request() {
        let event = decode_event(json!({
            "type": "approval_request",
            "id": "A",
            "toolCallId": "1",
            "name": "Glob",
            "arguments": {"pattern": "*.py"}
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
                assert_eq!(name.as_deref(), Some("Glob"));
                assert_eq!(arguments, Some(json!({"pattern": "*.py"})));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_unrecognised_turn_end_reason_is_other() {
        let event = decode_event(json!({"type": "turn_end", "reason": "overloaded"})).unwrap();
        assert_eq!(
            event,
            ProtocolEvent::TurnEnd {
                reason: TurnEndReason::Other
            }
        );
    }

    #[test]
    fn test_unknown_type_is_forwarded_raw() {
        let raw = json!({"type": "plan_update", "steps": []});
        let event = decode_event(raw.clone()).unwrap();
        assert_eq!(event, ProtocolEvent::Unknown { raw });
    }

    #[test]
    fn test_missing_type_is_rejected() {
        assert!(matches!(
            decode_event(json!({"text": "hi"})),
            Err(DecodeError::MissingType)
        ));
        assert!(matches!(
            decode_event(json!({"type": 3})),
            Err(DecodeError::MissingType)
        ));
    }

    #[test]
    fn test_known_type_missing_fields_is_rejected() {
        match decode_event(json!({"type": "tool_call_start", "id": "1"})) {
            Err(DecodeError::InvalidEvent { event_type, .. }) => {
                assert_eq!(event_type, "tool_call_start")
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}

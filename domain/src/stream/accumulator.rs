//! Per-id accumulation of streamed tool-call arguments.

use crate::tool::entities::ToolCall;
use serde_json::{Map, Value};
use thiserror::Error;

/// Rejections and failures produced while assembling a turn's stream.
///
/// None of these abort the turn: rejections are logged and dropped, and a
/// failed call is reported back to the agent instead of being dispatched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("tool_call_start for '{id}' which is already open or finished")]
    DuplicateStart { id: String },

    #[error("tool_call_delta for '{id}' without a preceding tool_call_start")]
    DeltaWithoutStart { id: String },

    #[error("tool_call_delta for '{id}' after its tool_call_end")]
    DeltaAfterEnd { id: String },

    #[error("tool_call_end for '{id}' without a preceding tool_call_start")]
    EndWithoutStart { id: String },

    #[error("duplicate tool_call_end for '{id}'")]
    DuplicateEnd { id: String },

    #[error("invalid arguments for tool call '{id}': {message}")]
    InvalidArguments { id: String, message: String },

    #[error("tool call '{id}' never received tool_call_end")]
    Incomplete { id: String },
}

impl AssemblyError {
    /// Correlation id the error refers to.
    pub fn id(&self) -> &str {
        match self {
            AssemblyError::DuplicateStart { id }
            | AssemblyError::DeltaWithoutStart { id }
            | AssemblyError::DeltaAfterEnd { id }
            | AssemblyError::EndWithoutStart { id }
            | AssemblyError::DuplicateEnd { id }
            | AssemblyError::InvalidArguments { id, .. }
            | AssemblyError::Incomplete { id } => id,
        }
    }
}

/// Accumulates `tool_call_delta` fragments for one correlation id.
///
/// Transitions `start -> delta* -> end` exactly once; anything after the end
/// is rejected.
#[derive(Debug, Clone)]
pub struct ToolCallAccumulator {
    id: String,
    name: String,
    buffer: String,
    fragments: usize,
    completed: bool,
}

impl ToolCallAccumulator {
    pub fn start(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            buffer: String::new(),
            fragments: 0,
            completed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn push_fragment(&mut self, fragment: &str) -> Result<(), AssemblyError> {
        if self.completed {
            return Err(AssemblyError::DeltaAfterEnd {
                id: self.id.clone(),
            });
        }
        self.buffer.push_str(fragment);
        self.fragments += 1;
        Ok(())
    }

    /// Close the accumulator and parse the buffered arguments.
    ///
    /// The accumulator is completed even when parsing fails.
    pub fn finish(&mut self) -> Result<ToolCall, AssemblyError> {
        if self.completed {
            return Err(AssemblyError::DuplicateEnd {
                id: self.id.clone(),
            });
        }
        self.completed = true;
        let arguments =
            parse_arguments(&self.buffer).map_err(|message| AssemblyError::InvalidArguments {
                id: self.id.clone(),
                message,
            })?;
        Ok(ToolCall::new(self.id.clone(), self.name.clone()).with_arguments(arguments))
    }
}

/// Parse a concatenated argument buffer into an arguments object.
///
/// An empty (or whitespace-only) buffer means "no arguments".
pub fn parse_arguments(buffer: &str) -> Result<Map<String, Value>, String> {
    if buffer.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(buffer) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        )),
        Err(e) => Err(e.to_string()),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fragments_concatenate_in_order() {
        let mut acc = ToolCallAccumulator::start("1", "Glob");
        for fragment in ["{\"pat", "tern\":", " \"*.py\"", "}"] {
            acc.push_fragment(fragment).unwrap();
        }
        assert_eq!(acc.fragment_count(), 4);

        let call = acc.finish().unwrap();
        assert_eq!(call.id, "1");
        assert_eq!(call.tool_name, "Glob");
        assert_eq!(call.arguments_value(), json!({"pattern": "*.py"}));
        assert!(acc.is_completed());
    }

    #[test]
    fn test_duplicate_end_is_rejected() {
        let mut acc = ToolCallAccumulator::start("1", "Glob");
        acc.finish().unwrap();
        assert_eq!(
            acc.finish(),
            Err(AssemblyError::DuplicateEnd { id: "1".into() })
        );
    }

    #[test]
    fn test_delta_after_end_is_rejected() {
        let mut acc = ToolCallAccumulator::start("1", "Glob");
        acc.finish().unwrap();
        assert!(matches!(
            acc.push_fragment("{}"),
            Err(AssemblyError::DeltaAfterEnd { .. })
        ));
    }

    #[test]
    fn test_parse_failure_completes_accumulator() {
        let mut acc = ToolCallAccumulator::start("7", "Read");
        acc.push_fragment("{\"file_path\": ").unwrap();
        let err = acc.finish().unwrap_err();
        assert!(matches!(err, AssemblyError::InvalidArguments { ref id, .. } if id == "7"));
        assert!(acc.is_completed());
    }

    #[test]
    fn test_empty_buffer_is_empty_object() {
        assert!(parse_arguments("").unwrap().is_empty());
        assert!(parse_arguments("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_non_object_arguments_are_rejected() {
        let err = parse_arguments("[1, 2]").unwrap_err();
        assert!(err.contains("array"));
    }
}

//! Tool domain entities

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Definition of a locally executable tool, advertised to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique name of the tool (e.g., "Glob")
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Parameter specifications
    pub parameters: Vec<ToolParameter>,
}

/// Parameter specification for a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub description: String,
    pub required: bool,
    /// JSON Schema type (e.g., "string", "integer", "boolean")
    pub param_type: String,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, param: ToolParameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// JSON Schema for the tool's arguments object.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            properties.insert(
                param.name.clone(),
                serde_json::json!({
                    "type": param.param_type,
                    "description": param.description,
                }),
            );
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required,
            param_type: "string".to_string(),
        }
    }

    pub fn with_type(mut self, param_type: impl Into<String>) -> Self {
        self.param_type = param_type.into();
        self
    }
}

/// A fully materialized tool invocation.
///
/// Produced by the message assembler once a `tool_call_end` arrives and the
/// argument buffer parsed, or directly from an approval request that
/// carries its own arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation id assigned by the backend
    pub id: String,
    /// Name of the tool to call
    pub tool_name: String,
    /// Arguments object
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments: Map::new(),
        }
    }

    pub fn with_arguments(mut self, arguments: Map<String, Value>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    /// Get a string argument
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }

    /// Get a required string argument or return an error message
    pub fn require_string(&self, key: &str) -> Result<&str, String> {
        self.get_string(key)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("Missing required argument: {}", key))
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.arguments.get(key).and_then(|v| v.as_u64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.arguments.get(key).and_then(|v| v.as_bool())
    }

    /// Arguments as a JSON value (for logging and notifications).
    pub fn arguments_value(&self) -> Value {
        Value::Object(self.arguments.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_definition_schema() {
        let tool = ToolDefinition::new("Glob", "Find files")
            .with_parameter(ToolParameter::new("pattern", "Glob pattern", true))
            .with_parameter(ToolParameter::new("path", "Directory", false));

        let schema = tool.input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["pattern"]["type"], "string");
        assert_eq!(schema["required"], serde_json::json!(["pattern"]));
    }

    #[test]
    fn test_tool_call_accessors() {
        let call = ToolCall::new("1", "Read")
            .with_arg("file_path", "/tmp/a.txt")
            .with_arg("limit", 20u64)
            .with_arg("case_insensitive", true);

        assert_eq!(call.get_string("file_path"), Some("/tmp/a.txt"));
        assert_eq!(call.require_string("file_path").unwrap(), "/tmp/a.txt");
        assert!(call.require_string("missing").is_err());
        assert_eq!(call.get_u64("limit"), Some(20));
        assert_eq!(call.get_bool("case_insensitive"), Some(true));
    }

    #[test]
    fn test_empty_string_is_missing() {
        let call = ToolCall::new("1", "Glob").with_arg("pattern", "");
        assert!(call.require_string("pattern").is_err());
    }
}

//! Typed access to parsed tool call arguments.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ToolFailure;

/// Parsed arguments handed to a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArguments {
    value: Value,
}

impl ToolArguments {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Parse the raw argument text streamed by the model.
    ///
    /// Blank text means "no arguments" and parses to an empty object.
    pub fn parse(raw: &str) -> Result<Self, ToolFailure> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::new(Value::Object(Default::default())));
        }
        serde_json::from_str(trimmed)
            .map(Self::new)
            .map_err(|e| {
                ToolFailure::InvalidArguments(format!("arguments are not valid JSON: {e}"))
            })
    }

    pub fn raw(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn get_str(&self, key: &str) -> Result<&str, ToolFailure> {
        self.value
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| missing(key, "string"))
    }

    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, ToolFailure> {
        self.value
            .get(key)
            .and_then(Value::as_i64)
            .ok_or_else(|| missing(key, "integer"))
    }

    pub fn get_f64(&self, key: &str) -> Result<f64, ToolFailure> {
        self.value
            .get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| missing(key, "number"))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ToolFailure> {
        self.value
            .get(key)
            .and_then(Value::as_bool)
            .ok_or_else(|| missing(key, "boolean"))
    }

    /// Deserialize all arguments into a typed struct.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ToolFailure> {
        serde_json::from_value(self.value.clone())
            .map_err(|e| {
                ToolFailure::InvalidArguments(format!("failed to deserialize arguments: {e}"))
            })
    }
}

fn missing(key: &str, kind: &str) -> ToolFailure {
    ToolFailure::InvalidArguments(format!("missing {kind} argument '{key}'"))
}

//! Parse backend output into JSON objects

use crate::error::TransientError;
use serde_json::{Map, Value};

/// Parse the text of one backend reply into a JSON object
///
/// Empty text, invalid JSON and non-object JSON are all retryable failures.
pub fn parse_extraction(text: Option<&str>) -> Result<Map<String, Value>, TransientError> {
    let text = text.ok_or(TransientError::EmptyResponse)?;
    let json_str = strip_code_fence(text);

    if json_str.is_empty() {
        return Err(TransientError::EmptyResponse);
    }

    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| TransientError::MalformedJson(format!("line {}, column {}", e.line(), e.column())))?;

    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Err(TransientError::NotAnObject("null")),
        Value::Bool(_) => Err(TransientError::NotAnObject("boolean")),
        Value::Number(_) => Err(TransientError::NotAnObject("number")),
        Value::String(_) => Err(TransientError::NotAnObject("string")),
        Value::Array(_) => Err(TransientError::NotAnObject("array")),
    }
}

/// Remove a surrounding markdown code fence, if any
///
/// Handles both ```` ```json ```` and bare ```` ``` ```` openers; text without
/// a fence is returned trimmed.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

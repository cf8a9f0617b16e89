//! JSON text conversion for [`Value`].

use crate::error::CodecResult;
use crate::value::Value;

/// Serialize a value to compact JSON text.
pub fn to_json_string(value: &Value) -> CodecResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// Parse JSON text into a value.
///
/// # Errors
///
/// Returns [`CodecError::InvalidJson`](crate::CodecError::InvalidJson) if the text is not valid JSON.
pub fn from_json_str(text: &str) -> CodecResult<Value> {
    Ok(serde_json::from_str(text)?)
}

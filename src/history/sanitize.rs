//! Size and shape limits for values written to storage.

use serde_json::{json, Value};

/// Marker stored in place of an oversized value.
pub fn truncated_marker() -> Value {
    json!({ "_truncated": true, "message": "Body too large (>1MB)" })
}

/// Marker stored in place of a value that could not be serialized.
pub fn invalid_marker() -> Value {
    json!({ "_error": "Circular structure or invalid JSON" })
}

/// Prepare a header map or body for storage.
///
/// Absent and null become null. Anything whose serialized form exceeds
/// `max_bytes` is replaced by [`truncated_marker`].
pub fn sanitize_for_storage(value: Option<&Value>, max_bytes: usize) -> Value {
    let value = match value {
        None | Some(Value::Null) => return Value::Null,
        Some(value) => value,
    };

    match serde_json::to_string(value) {
        Ok(serialized) if serialized.len() > max_bytes => truncated_marker(),
        Ok(_) => value.clone(),
        Err(_) => invalid_marker(),
    }
}

//! Caller-supplied header sanitization.
//!
//! Headers arriving in a relay descriptor are untrusted. Anything the HTTP
//! transport must own (framing, connection control, cookies, origin data)
//! is stripped before the outbound request is built.

use std::collections::BTreeMap;

use serde_json::Value;

/// Header names that stay under exclusive control of the HTTP transport.
pub const FORBIDDEN_HEADERS: [&str; 20] = [
    "accept-charset",
    "accept-encoding",
    "access-control-request-headers",
    "access-control-request-method",
    "connection",
    "content-length",
    "cookie",
    "date",
    "dnt",
    "expect",
    "host",
    "keep-alive",
    "origin",
    "referer",
    "set-cookie",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "via",
];

/// Reserved name prefixes; any header starting with one is dropped.
pub const FORBIDDEN_PREFIXES: [&str; 2] = ["sec-", "proxy-"];

/// Sanitized headers: lowercase names, trimmed non-empty values.
pub type SanitizedHeaders = BTreeMap<String, String>;

/// Whether a lowercase header name may be forwarded.
pub fn is_forwardable(name: &str) -> bool {
    !FORBIDDEN_HEADERS.contains(&name)
        && !FORBIDDEN_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// Filter and normalize a caller-supplied header mapping.
///
/// Returns `None` when `input` is not a JSON object (JSON `null` included),
/// so callers can tell "not a mapping" apart from an empty mapping.
pub fn sanitize_headers(input: &Value) -> Option<SanitizedHeaders> {
    let map = input.as_object()?;

    let sanitized = map
        .iter()
        .filter_map(|(key, value)| {
            let name = key.to_lowercase();
            let value = coerce_header_value(value)?;
            let value = value.trim();
            if value.is_empty() || !is_forwardable(&name) {
                return None;
            }
            Some((name, value.to_string()))
        })
        .collect();

    Some(sanitized)
}

/// String form of a header value. `null` means "no value".
fn coerce_header_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

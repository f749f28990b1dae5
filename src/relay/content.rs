//! Binary/text classification of origin payloads.
//!
//! Classification is a lookup of the declared `Content-Type` in a fixed
//! table. There is no content sniffing: an image labelled `text/plain` is
//! treated as text.

/// MIME types whose payloads are relayed base64-encoded.
pub const BINARY_MIME_TYPES: [&str; 12] = [
    "application/octet-stream",
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "audio/mpeg",
    "audio/wav",
    "video/mp4",
    "video/webm",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// How a response payload is read and encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Binary,
    Text,
}

impl PayloadKind {
    pub fn is_binary(self) -> bool {
        self == PayloadKind::Binary
    }
}

/// The media type without parameters, lowercased.
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Classify a declared content type. Absent or unknown types are text.
pub fn classify_content_type(content_type: Option<&str>) -> PayloadKind {
    match content_type {
        Some(ct) if BINARY_MIME_TYPES.contains(&essence(ct).as_str()) => PayloadKind::Binary,
        _ => PayloadKind::Text,
    }
}

/// Whether a content type denotes JSON.
pub fn is_json(content_type: &str) -> bool {
    essence(content_type) == "application/json"
}

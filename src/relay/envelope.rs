//! Result envelopes returned by the relay endpoint.
//!
//! The relay always answers with HTTP 200; the `error` flag and
//! `errorType` carry the outcome.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed caller request; nothing was dispatched.
    InputError,
    Timeout,
    DnsFailure,
    ConnectionRefused,
    ConnectionReset,
    SslError,
    UnknownError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InputError => "INPUT_ERROR",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::DnsFailure => "DNS_FAILURE",
            ErrorKind::ConnectionRefused => "CONNECTION_REFUSED",
            ErrorKind::ConnectionReset => "CONNECTION_RESET",
            ErrorKind::SslError => "SSL_ERROR",
            ErrorKind::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful relay: describes the origin's response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    /// Always `false`.
    pub error: bool,
    /// Origin status was 2xx.
    pub ok: bool,
    pub status: u16,
    pub status_text: String,
    pub content_type: Option<String>,
    pub is_binary: bool,
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON, raw text, or base64 for binary payloads.
    pub body: Value,
    /// Text before JSON parsing, or base64 for binary payloads.
    pub raw_body: String,
    /// Byte length of the payload as received.
    pub size: usize,
    /// Declared `Content-Length`, else `size`.
    pub content_length: u64,
    /// Elapsed milliseconds for the outbound call.
    pub time: f64,
    /// Canonical URL that was dispatched.
    pub url: String,
}

/// Failed relay or rejected input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    /// Always `true`.
    pub error: bool,
    pub error_type: ErrorKind,
    pub message: String,
    pub code: Option<String>,
    /// Absent for input errors, which never reach the network.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
}

impl ErrorEnvelope {
    pub fn new(kind: ErrorKind, message: impl Into<String>, code: Option<String>, time: Option<f64>) -> Self {
        Self {
            error: true,
            error_type: kind,
            message: message.into(),
            code,
            time,
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InputError, message, None, None)
    }
}

/// Either outcome, serialized without a wrapper.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Envelope {
    Success(ResponseEnvelope),
    Failure(ErrorEnvelope),
}

impl From<Result<ResponseEnvelope, ErrorEnvelope>> for Envelope {
    fn from(result: Result<ResponseEnvelope, ErrorEnvelope>) -> Self {
        match result {
            Ok(envelope) => Envelope::Success(envelope),
            Err(envelope) => Envelope::Failure(envelope),
        }
    }
}

//! Relay request descriptors and their normalization.
//!
//! A [`RelayDescriptor`] is what the caller sent; a [`RelayRequest`] is what
//! gets dispatched. Normalization either produces a request or an
//! [`InputError`], and an input error never reaches the network.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::relay::envelope::ErrorEnvelope;
use crate::security::headers::{sanitize_headers, SanitizedHeaders};

/// Methods the relay will dispatch.
pub const ALLOWED_METHODS: [&str; 7] = ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

/// Rejected caller input. The display text is shown to the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Request body must be a JSON object")]
    MalformedRequest,

    #[error("URL and method are required")]
    MissingFields,

    #[error("Invalid method")]
    InvalidMethod,

    #[error("Invalid URL")]
    InvalidUrl,

    #[error("Invalid headers")]
    InvalidHeaders,

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid JSON body")]
    InvalidJsonBody,
}

impl From<InputError> for ErrorEnvelope {
    fn from(err: InputError) -> Self {
        ErrorEnvelope::input(err.to_string())
    }
}

/// Caller input as received. Fields with the wrong JSON type count as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelayDescriptor {
    pub link: Option<String>,
    pub method: Option<String>,
    /// `None` when the field was omitted; `Some(Value::Null)` when sent as null.
    pub headers: Option<Value>,
    pub body: Option<Value>,
}

impl RelayDescriptor {
    /// Parse the raw relay request body.
    pub fn from_json(bytes: &[u8]) -> Result<Self, InputError> {
        let value: Value = serde_json::from_slice(bytes).map_err(|_| InputError::MalformedRequest)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, InputError> {
        let Value::Object(mut map) = value else {
            return Err(InputError::MalformedRequest);
        };

        Ok(Self {
            link: map.remove("link").and_then(into_string),
            method: map.remove("method").and_then(into_string),
            headers: map.remove("headers"),
            body: map.remove("body"),
        })
    }
}

fn into_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        _ => None,
    }
}

/// A validated request, ready for dispatch.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub method: Method,
    /// Canonical form of the caller's link; report this, not the raw input.
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl RelayRequest {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

/// Uppercase and check a method against [`ALLOWED_METHODS`].
pub fn parse_method(method: &str) -> Result<Method, InputError> {
    let upper = method.to_ascii_uppercase();
    if !ALLOWED_METHODS.contains(&upper.as_str()) {
        return Err(InputError::InvalidMethod);
    }
    Method::from_bytes(upper.as_bytes()).map_err(|_| InputError::InvalidMethod)
}

/// Validate and normalize a descriptor.
pub fn normalize(descriptor: &RelayDescriptor) -> Result<RelayRequest, InputError> {
    let link = descriptor.link.as_deref().map(str::trim).filter(|l| !l.is_empty());
    let method = descriptor.method.as_deref().filter(|m| !m.is_empty());
    let (Some(link), Some(method)) = (link, method) else {
        return Err(InputError::MissingFields);
    };

    let method = parse_method(method)?;
    let url = Url::parse(link).map_err(|_| InputError::InvalidUrl)?;

    // An omitted field means "no headers"; anything present must be a mapping.
    let mut headers = match &descriptor.headers {
        None => SanitizedHeaders::new(),
        Some(value) => sanitize_headers(value).ok_or(InputError::InvalidHeaders)?,
    };

    let body = descriptor.body.as_ref().filter(|b| !b.is_null());
    let structured = matches!(body, Some(Value::Object(_) | Value::Array(_)));
    if structured && !headers.contains_key("content-type") {
        headers.insert("content-type".to_string(), "application/json".to_string());
    }

    let body = match body {
        None => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(value @ (Value::Object(_) | Value::Array(_))) => {
            Some(serde_json::to_string(value).map_err(|_| InputError::InvalidJsonBody)?)
        }
        Some(scalar) => Some(scalar.to_string()),
    };

    let body = if method == Method::GET || method == Method::HEAD {
        None
    } else {
        body
    };

    Ok(RelayRequest {
        method,
        url,
        headers: to_header_map(&headers)?,
        body,
    })
}

fn to_header_map(headers: &SanitizedHeaders) -> Result<HeaderMap, InputError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| InputError::InvalidHeader(name.clone()))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| InputError::InvalidHeader(name.clone()))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

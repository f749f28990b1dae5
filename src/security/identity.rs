//! Caller identity.
//!
//! Identity is an opaque, client-generated id sent in `x-user-uid`. It is
//! not authenticated; it only scopes stored data.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::api::error::ApiError;

pub const IDENTITY_HEADER: &str = "x-user-uid";

/// The identity header value, if present, valid UTF-8 and not blank.
pub fn identity_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(IDENTITY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

/// Extractor for endpoints that require an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(pub String);

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_from_headers(&parts.headers)
            .map(Identity)
            .ok_or_else(|| ApiError::Validation("Missing or invalid x-user-uid header".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn present_identity_is_returned_verbatim() {
        let mut headers = HeaderMap::new();
        headers.insert(IDENTITY_HEADER, HeaderValue::from_static("a1b2-c3"));
        assert_eq!(identity_from_headers(&headers).as_deref(), Some("a1b2-c3"));
    }

    #[test]
    fn missing_or_blank_identity() {
        assert_eq!(identity_from_headers(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(IDENTITY_HEADER, HeaderValue::from_static("   "));
        assert_eq!(identity_from_headers(&headers), None);
    }
}

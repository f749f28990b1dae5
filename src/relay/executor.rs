//! Outbound call execution.
//!
//! One normalized request becomes exactly one outbound attempt. The call
//! and the body read share a single per-call [`Deadline`]; there are no
//! retries. Failures go through the classifier so no raw transport error
//! reaches the caller.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE};
use serde_json::Value;
use thiserror::Error;

use crate::config::{LiveSettings, RelaySettings};
use crate::observability::metrics;
use crate::relay::classify::{classify, Failure};
use crate::relay::content::{classify_content_type, PayloadKind};
use crate::relay::envelope::{ErrorEnvelope, ResponseEnvelope};
use crate::relay::request::RelayRequest;
use crate::relay::tls::{client_config, web_pki_roots, TlsSetupError};
use crate::resilience::timeouts::Deadline;

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("HTTP client setup failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Tls(#[from] TlsSetupError),
}

/// Executes relay calls with a shared HTTP client.
#[derive(Clone)]
pub struct RelayExecutor {
    client: reqwest::Client,
    settings: Arc<ArcSwap<LiveSettings>>,
}

impl RelayExecutor {
    /// Build the outbound client. Redirect, user-agent and certificate
    /// settings are fixed at construction; the timeout is read per call.
    pub fn new(settings: Arc<ArcSwap<LiveSettings>>) -> Result<Self, ClientBuildError> {
        let client = build_client(&settings.load().relay)?;
        Ok(Self { client, settings })
    }

    /// Current per-call budget.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.settings.load().relay.timeout_secs)
    }

    /// Dispatch `request` and describe the outcome.
    pub async fn execute(&self, request: &RelayRequest) -> Result<ResponseEnvelope, ErrorEnvelope> {
        let timeout = self.timeout();
        let deadline = Deadline::start(timeout);

        let outcome = match deadline.run(self.dispatch(request, &deadline)).await {
            Ok(Ok(envelope)) => Ok(envelope),
            Ok(Err(err)) => Err(classify(&err)),
            Err(_) => Err(Failure::Timeout),
        };

        match outcome {
            Ok(envelope) => {
                metrics::record_relay("success", deadline.elapsed());
                Ok(envelope)
            }
            Err(failure) => {
                let envelope = failure.into_envelope(timeout, deadline.elapsed_ms());
                metrics::record_relay(envelope.error_type.as_str(), deadline.elapsed());
                Err(envelope)
            }
        }
    }

    async fn dispatch(
        &self,
        request: &RelayRequest,
        deadline: &Deadline,
    ) -> Result<ResponseEnvelope, reqwest::Error> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;

        let status = response.status();
        let status_text = status_text(&response);
        let headers = collect_headers(response.headers());
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let declared_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let kind = classify_content_type(content_type.as_deref());

        let bytes = response.bytes().await?;
        let payload = read_payload(kind, &bytes);

        Ok(ResponseEnvelope {
            error: false,
            ok: status.is_success(),
            status: status.as_u16(),
            status_text,
            content_type,
            is_binary: kind.is_binary(),
            headers,
            body: payload.body,
            raw_body: payload.raw_body,
            size: payload.size,
            content_length: declared_length.unwrap_or(payload.size as u64),
            time: deadline.elapsed_ms(),
            url: request.url.to_string(),
        })
    }
}

fn build_client(settings: &RelaySettings) -> Result<reqwest::Client, ClientBuildError> {
    let builder = reqwest::Client::builder()
        .user_agent(settings.user_agent.clone())
        .redirect(reqwest::redirect::Policy::limited(settings.max_redirects));

    let builder = if settings.accept_invalid_certs {
        builder.danger_accept_invalid_certs(true)
    } else {
        builder.use_preconfigured_tls(client_config(web_pki_roots())?)
    };
    Ok(builder.build()?)
}

/// The origin's reason phrase when it sent a non-standard one, else the
/// canonical phrase for the status.
fn status_text(response: &reqwest::Response) -> String {
    response
        .extensions()
        .get::<hyper::ext::ReasonPhrase>()
        .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
        .or_else(|| response.status().canonical_reason().map(str::to_string))
        .unwrap_or_default()
}

/// All response headers; repeated names are joined with ", ".
pub(crate) fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    out
}

#[derive(Debug, PartialEq)]
pub(crate) struct Payload {
    pub body: Value,
    pub raw_body: String,
    pub size: usize,
}

/// Encode a payload for the envelope. JSON parse failures fall back to the
/// raw text and are never reported.
pub(crate) fn read_payload(kind: PayloadKind, bytes: &[u8]) -> Payload {
    match kind {
        PayloadKind::Binary => {
            let encoded = STANDARD.encode(bytes);
            Payload {
                body: Value::String(encoded.clone()),
                raw_body: encoded,
                size: bytes.len(),
            }
        }
        PayloadKind::Text => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            let body = serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.clone()));
            Payload {
                body,
                size: text.len(),
                raw_body: text,
            }
        }
    }
}

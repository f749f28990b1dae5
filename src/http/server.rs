//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the relay, collection and history handlers
//! - Wire up middleware (request id, tracing, timeout, body limit, CORS)
//! - Bind server to listener and shut down gracefully
//! - Apply hot-reloaded relay and history settings

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::api::setup_api_router;
use crate::config::validation::validate_reload;
use crate::config::{LiveSettings, RelayConfig};
use crate::history::HistoryRecorder;
use crate::http::request::{make_request_span, request_id, request_id_header};
use crate::relay::{normalize, ClientBuildError, Envelope, ErrorEnvelope, RelayDescriptor, RelayExecutor};
use crate::security::identity_from_headers;
use crate::storage::Store;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub executor: RelayExecutor,
    pub recorder: HistoryRecorder,
    pub store: Arc<dyn Store>,
    pub settings: Arc<ArcSwap<LiveSettings>>,
}

impl AppState {
    pub fn new(config: &RelayConfig, store: Arc<dyn Store>) -> Result<Self, ClientBuildError> {
        let settings = Arc::new(ArcSwap::from_pointee(config.live_settings()));
        Ok(Self {
            executor: RelayExecutor::new(settings.clone())?,
            recorder: HistoryRecorder::new(store.clone(), settings.clone()),
            store,
            settings,
        })
    }
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: RelayConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and store.
    pub fn new(config: RelayConfig, store: Arc<dyn Store>) -> Result<Self, ClientBuildError> {
        let state = AppState::new(&config, store)?;
        let router = Self::build_router(&config, state.clone());
        Ok(Self { router, state, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        let router = Router::new()
            .route("/", get(root_handler))
            .route("/proxy", post(relay_handler))
            .merge(setup_api_router())
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.listener.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::new(request_id_header()))
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
            .layer(SetRequestIdLayer::new(request_id_header(), MakeRequestUuid));

        if config.cors.enabled {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configs received on `config_updates` replace the live relay and
    /// history settings once they pass [`validate_reload`]. Listener,
    /// storage and outbound client settings (redirects, user agent,
    /// certificates) keep their startup values.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<RelayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let settings = self.state.settings.clone();
        let running = self.config.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                if let Err(errors) = validate_reload(&running, &config) {
                    for error in &errors {
                        tracing::warn!(error = %error, "Config reload rejected; keeping current settings");
                    }
                    continue;
                }
                settings.store(Arc::new(config.live_settings()));
                tracing::info!(
                    timeout_secs = config.relay.timeout_secs,
                    history_enabled = config.history.enabled,
                    "Live settings updated"
                );
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn root_handler() -> &'static str {
    "Proxy Server Running"
}

/// Relay one request. Always answers 200; the envelope carries the outcome.
async fn relay_handler(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Json<Envelope> {
    let request_id = request_id(&headers).to_string();

    let descriptor = match RelayDescriptor::from_json(&body) {
        Ok(descriptor) => descriptor,
        Err(e) => return reject(&request_id, e.into()),
    };
    let request = match normalize(&descriptor) {
        Ok(request) => request,
        Err(e) => return reject(&request_id, e.into()),
    };

    tracing::debug!(
        request_id = %request_id,
        method = %request.method,
        url = %request.url,
        "Relaying request"
    );

    let outcome = state.executor.execute(&request).await;
    match &outcome {
        Ok(envelope) => {
            tracing::info!(
                request_id = %request_id,
                method = %request.method,
                url = %request.url,
                status = envelope.status,
                time_ms = envelope.time,
                "Relay completed"
            );
            let identity = identity_from_headers(&headers);
            // Detached: the response never waits for the history write.
            let _ = state
                .recorder
                .record(identity.as_deref(), descriptor.method.as_deref(), envelope);
        }
        Err(envelope) => {
            tracing::warn!(
                request_id = %request_id,
                method = %request.method,
                url = %request.url,
                error_type = %envelope.error_type,
                code = ?envelope.code,
                message = %envelope.message,
                "Relay failed"
            );
        }
    }

    Json(outcome.into())
}

fn reject(request_id: &str, envelope: ErrorEnvelope) -> Json<Envelope> {
    tracing::info!(request_id = %request_id, message = %envelope.message, "Relay input rejected");
    Json(Envelope::Failure(envelope))
}

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the relay service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address, inbound limits).
    pub listener: ListenerConfig,

    /// Outbound relay behaviour.
    pub relay: RelaySettings,

    /// History recording.
    pub history: HistoryConfig,

    /// Persistence backend.
    pub storage: StorageConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Cross-origin settings for the browser UI.
    pub cors: CorsConfig,
}

impl RelayConfig {
    /// Settings that can be swapped while the server is running.
    pub fn live_settings(&self) -> LiveSettings {
        LiveSettings {
            relay: self.relay.clone(),
            history: self.history.clone(),
        }
    }
}

/// The hot-reloadable subset of the configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveSettings {
    pub relay: RelaySettings,
    pub history: HistoryConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,

    /// Maximum inbound request body in bytes.
    pub max_body_bytes: usize,

    /// Whole-request timeout for inbound requests in seconds.
    /// Must stay above `relay.timeout_secs`.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
            request_timeout_secs: 90,
        }
    }
}

/// Outbound relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RelaySettings {
    /// Hard cap on one outbound call (dispatch + body read) in seconds.
    pub timeout_secs: u64,

    /// Maximum redirects followed per call.
    pub max_redirects: usize,

    /// User-Agent sent when the caller does not supply one.
    pub user_agent: String,

    /// Skip certificate verification (local testing only).
    pub accept_invalid_certs: bool,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            max_redirects: 20,
            user_agent: format!("rest-relay/{}", env!("CARGO_PKG_VERSION")),
            accept_invalid_certs: false,
        }
    }
}

/// History recording configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Record completed relay calls for callers that present an identity.
    pub enabled: bool,

    /// Serialized-size ceiling for stored headers/bodies.
    pub max_value_bytes: usize,

    /// Number of entries returned by `GET /history`.
    pub list_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_value_bytes: 1024 * 1024,
            list_limit: 100,
        }
    }
}

/// Which persistence backend to use.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgrest,
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// JSON snapshot file for the in-memory backend.
    pub snapshot_path: Option<String>,

    /// PostgREST connection settings.
    pub postgrest: PostgrestConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PostgrestConfig {
    /// REST root, e.g. "https://project.supabase.co/rest/v1".
    pub url: String,

    /// Service key sent as `apikey` and bearer token.
    pub api_key: String,

    /// Timeout for store calls in seconds.
    pub timeout_secs: u64,
}

impl Default for PostgrestConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            timeout_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CorsConfig {
    /// Allow any origin, method and header (the UI is served elsewhere).
    pub enabled: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

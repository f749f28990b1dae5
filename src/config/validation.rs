//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! constraints. Every problem is reported, not just the first.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{RelayConfig, StorageBackend};

/// One semantic problem in a configuration file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.relay.timeout_secs == 0 {
        errors.push(ValidationError::new("relay.timeout_secs", "must be greater than 0"));
    }

    if config.listener.request_timeout_secs <= config.relay.timeout_secs {
        errors.push(ValidationError::new(
            "listener.request_timeout_secs",
            format!(
                "must exceed relay.timeout_secs ({}s) or relayed calls are cut off",
                config.relay.timeout_secs
            ),
        ));
    }

    if config.history.max_value_bytes == 0 {
        errors.push(ValidationError::new("history.max_value_bytes", "must be greater than 0"));
    }

    if config.history.list_limit == 0 {
        errors.push(ValidationError::new("history.list_limit", "must be greater than 0"));
    }

    if config.storage.backend == StorageBackend::Postgrest {
        let pg = &config.storage.postgrest;
        if url::Url::parse(&pg.url).is_err() {
            errors.push(ValidationError::new(
                "storage.postgrest.url",
                "must be an absolute URL when backend = \"postgrest\"",
            ));
        }
        if pg.api_key.trim().is_empty() {
            errors.push(ValidationError::new(
                "storage.postgrest.api_key",
                "required when backend = \"postgrest\" (or set STORAGE_API_KEY)",
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check a reloaded configuration against the one the server started with.
///
/// Only relay and history settings are swapped on reload; the listener's
/// request timeout stays at its startup value, so the new relay timeout
/// must still fit under it.
pub fn validate_reload(running: &RelayConfig, candidate: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    validate_config(candidate)?;

    if candidate.relay.timeout_secs >= running.listener.request_timeout_secs {
        return Err(vec![ValidationError::new(
            "relay.timeout_secs",
            format!(
                "must stay below the running listener.request_timeout_secs ({}s); restart to raise it",
                running.listener.request_timeout_secs
            ),
        )]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&RelayConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_problem() {
        let mut config = RelayConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.relay.timeout_secs = 0;
        config.history.max_value_bytes = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert!(fields.contains(&"listener.bind_address"));
        assert!(fields.contains(&"relay.timeout_secs"));
        assert!(fields.contains(&"history.max_value_bytes"));
    }

    #[test]
    fn listener_timeout_must_outlast_relay_timeout() {
        let mut config = RelayConfig::default();
        config.listener.request_timeout_secs = 60;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "listener.request_timeout_secs");
    }

    #[test]
    fn reload_cannot_outgrow_running_listener_timeout() {
        let mut running = RelayConfig::default();
        running.listener.request_timeout_secs = 2;
        running.relay.timeout_secs = 1;

        let mut candidate = running.clone();
        candidate.listener.request_timeout_secs = 10;
        candidate.relay.timeout_secs = 5;
        assert!(validate_config(&candidate).is_ok());

        let errors = validate_reload(&running, &candidate).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "relay.timeout_secs");

        candidate.relay.timeout_secs = 1;
        candidate.history.enabled = false;
        assert!(validate_reload(&running, &candidate).is_ok());
    }

    #[test]
    fn reload_still_runs_full_validation() {
        let running = RelayConfig::default();
        let mut candidate = running.clone();
        candidate.history.list_limit = 0;

        let errors = validate_reload(&running, &candidate).unwrap_err();
        assert_eq!(errors[0].field, "history.list_limit");
    }

    #[test]
    fn postgrest_requires_url_and_key() {
        let mut config = RelayConfig::default();
        config.storage.backend = StorageBackend::Postgrest;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["storage.postgrest.url", "storage.postgrest.api_key"]);
    }
}

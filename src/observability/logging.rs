//! Structured logging setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor a configured level applies.
pub fn default_directives(level: &str) -> String {
    format!("rest_relay={level},tower_http={level}")
}

/// Install the global subscriber. `RUST_LOG` overrides `level`.
///
/// Calling this twice is harmless; the second install is ignored.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_cover_crate_and_http_layer() {
        assert_eq!(default_directives("debug"), "rest_relay=debug,tower_http=debug");
    }

    #[test]
    fn repeated_init_does_not_panic() {
        init_logging("info");
        init_logging("warn");
    }
}

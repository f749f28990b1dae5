//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, env overrides)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → server swaps LiveSettings (relay + history) atomically
//! ```
//!
//! Listener and storage settings are read once at startup; changing them
//! requires a restart.

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    CorsConfig, HistoryConfig, ListenerConfig, LiveSettings, ObservabilityConfig,
    PostgrestConfig, RelayConfig, RelaySettings, StorageBackend, StorageConfig,
};

//! REST client backend: request relay, history and collections.

pub mod api;
pub mod config;
pub mod history;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;
pub mod resilience;
pub mod security;
pub mod storage;

pub use config::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;

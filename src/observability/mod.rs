//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! relay executor / history recorder / HTTP layer:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (fmt subscriber)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! Every request carries an `x-request-id`; the trace layer attaches it to
//! the request span so relay and history logs can be correlated.

pub mod logging;
pub mod metrics;

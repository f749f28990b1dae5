//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Relay call:
//!     → timeouts.rs (one Deadline per call, covering dispatch and body read)
//!     → on expiry: classified as TIMEOUT
//! ```
//!
//! Relay calls are never retried; each request is one outbound attempt.

pub mod timeouts;

pub use timeouts::{Deadline, DeadlineExceeded};

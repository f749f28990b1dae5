//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → HTTP server stops accepting → in-flight requests drain → exit
//! ```
//!
//! Detached history writes still running at exit are abandoned.

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;

//! History subsystem.
//!
//! # Data Flow
//! ```text
//! successful relay (ResponseEnvelope) + caller identity
//!     → recorder.rs (build entry, spawn detached write)
//!         → sanitize.rs (size/shape limits on headers and body)
//!         → storage::Store::insert_history
//! ```

pub mod recorder;
pub mod sanitize;

pub use recorder::HistoryRecorder;
pub use sanitize::sanitize_for_storage;

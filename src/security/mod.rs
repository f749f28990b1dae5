//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → identity.rs (x-user-uid → owner scope for stored data)
//!
//! Outbound relay:
//!     → headers.rs (drop hop-by-hop, browser-controlled and proxy headers)
//! ```
//!
//! Header sanitizing never fails on a bad entry; it drops it.

pub mod headers;
pub mod identity;

pub use headers::{sanitize_headers, SanitizedHeaders};
pub use identity::{identity_from_headers, Identity, IDENTITY_HEADER};

//! Request relay subsystem.
//!
//! # Data Flow
//! ```text
//! POST /proxy body (JSON)
//!     → request.rs (descriptor → validated RelayRequest, or InputError)
//!         → security::headers (drop forbidden headers)
//!     → executor.rs (one outbound call under a per-call Deadline)
//!         → content.rs (binary/text by declared Content-Type)
//!         → tls.rs (web PKI verification, self-signed leaves named)
//!         → classify.rs (transport error → Failure)
//!     → envelope.rs (ResponseEnvelope | ErrorEnvelope, always HTTP 200)
//!     → history::HistoryRecorder (detached, success only)
//! ```

pub mod classify;
pub mod content;
pub mod envelope;
pub mod executor;
pub mod request;
pub mod tls;

pub use classify::{classify, Failure, TlsErrorCode};
pub use content::{classify_content_type, PayloadKind};
pub use envelope::{Envelope, ErrorEnvelope, ErrorKind, ResponseEnvelope};
pub use executor::{ClientBuildError, RelayExecutor};
pub use request::{normalize, InputError, RelayDescriptor, RelayRequest};

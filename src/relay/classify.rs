//! Transport failure classification.
//!
//! Every failure of an outbound call maps to exactly one [`ErrorKind`].
//! The classifier walks the error's source chain looking for, in order:
//! the per-call deadline, a DNS resolution failure, a refused or reset
//! connection, and a certificate verification failure. Anything else is
//! `UNKNOWN_ERROR`, carrying the OS error name when one is known.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use rustls::CertificateError;

use crate::relay::envelope::{ErrorEnvelope, ErrorKind};
use crate::relay::tls::SelfSignedLeaf;
use crate::resilience::timeouts::DeadlineExceeded;

/// Certificate verification failures, named after the OpenSSL verify codes
/// UIs commonly show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsErrorCode {
    UnableToGetIssuerCert,
    UnableToGetCrl,
    UnableToDecryptCertSignature,
    UnableToDecryptCrlSignature,
    UnableToDecodeIssuerPublicKey,
    CertSignatureFailure,
    CrlSignatureFailure,
    CertNotYetValid,
    CertHasExpired,
    CrlNotYetValid,
    CrlHasExpired,
    ErrorInCertNotBeforeField,
    ErrorInCertNotAfterField,
    ErrorInCrlLastUpdateField,
    ErrorInCrlNextUpdateField,
    OutOfMem,
    DepthZeroSelfSignedCert,
    SelfSignedCertInChain,
    UnableToGetIssuerCertLocally,
    UnableToVerifyLeafSignature,
    CertChainTooLong,
    CertRevoked,
    InvalidCa,
    PathLengthExceeded,
    InvalidPurpose,
    CertUntrusted,
    CertRejected,
    HostnameMismatch,
}

impl TlsErrorCode {
    pub const ALL: [TlsErrorCode; 28] = [
        TlsErrorCode::UnableToGetIssuerCert,
        TlsErrorCode::UnableToGetCrl,
        TlsErrorCode::UnableToDecryptCertSignature,
        TlsErrorCode::UnableToDecryptCrlSignature,
        TlsErrorCode::UnableToDecodeIssuerPublicKey,
        TlsErrorCode::CertSignatureFailure,
        TlsErrorCode::CrlSignatureFailure,
        TlsErrorCode::CertNotYetValid,
        TlsErrorCode::CertHasExpired,
        TlsErrorCode::CrlNotYetValid,
        TlsErrorCode::CrlHasExpired,
        TlsErrorCode::ErrorInCertNotBeforeField,
        TlsErrorCode::ErrorInCertNotAfterField,
        TlsErrorCode::ErrorInCrlLastUpdateField,
        TlsErrorCode::ErrorInCrlNextUpdateField,
        TlsErrorCode::OutOfMem,
        TlsErrorCode::DepthZeroSelfSignedCert,
        TlsErrorCode::SelfSignedCertInChain,
        TlsErrorCode::UnableToGetIssuerCertLocally,
        TlsErrorCode::UnableToVerifyLeafSignature,
        TlsErrorCode::CertChainTooLong,
        TlsErrorCode::CertRevoked,
        TlsErrorCode::InvalidCa,
        TlsErrorCode::PathLengthExceeded,
        TlsErrorCode::InvalidPurpose,
        TlsErrorCode::CertUntrusted,
        TlsErrorCode::CertRejected,
        TlsErrorCode::HostnameMismatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TlsErrorCode::UnableToGetIssuerCert => "UNABLE_TO_GET_ISSUER_CERT",
            TlsErrorCode::UnableToGetCrl => "UNABLE_TO_GET_CRL",
            TlsErrorCode::UnableToDecryptCertSignature => "UNABLE_TO_DECRYPT_CERT_SIGNATURE",
            TlsErrorCode::UnableToDecryptCrlSignature => "UNABLE_TO_DECRYPT_CRL_SIGNATURE",
            TlsErrorCode::UnableToDecodeIssuerPublicKey => "UNABLE_TO_DECODE_ISSUER_PUBLIC_KEY",
            TlsErrorCode::CertSignatureFailure => "CERT_SIGNATURE_FAILURE",
            TlsErrorCode::CrlSignatureFailure => "CRL_SIGNATURE_FAILURE",
            TlsErrorCode::CertNotYetValid => "CERT_NOT_YET_VALID",
            TlsErrorCode::CertHasExpired => "CERT_HAS_EXPIRED",
            TlsErrorCode::CrlNotYetValid => "CRL_NOT_YET_VALID",
            TlsErrorCode::CrlHasExpired => "CRL_HAS_EXPIRED",
            TlsErrorCode::ErrorInCertNotBeforeField => "ERROR_IN_CERT_NOT_BEFORE_FIELD",
            TlsErrorCode::ErrorInCertNotAfterField => "ERROR_IN_CERT_NOT_AFTER_FIELD",
            TlsErrorCode::ErrorInCrlLastUpdateField => "ERROR_IN_CRL_LAST_UPDATE_FIELD",
            TlsErrorCode::ErrorInCrlNextUpdateField => "ERROR_IN_CRL_NEXT_UPDATE_FIELD",
            TlsErrorCode::OutOfMem => "OUT_OF_MEM",
            TlsErrorCode::DepthZeroSelfSignedCert => "DEPTH_ZERO_SELF_SIGNED_CERT",
            TlsErrorCode::SelfSignedCertInChain => "SELF_SIGNED_CERT_IN_CHAIN",
            TlsErrorCode::UnableToGetIssuerCertLocally => "UNABLE_TO_GET_ISSUER_CERT_LOCALLY",
            TlsErrorCode::UnableToVerifyLeafSignature => "UNABLE_TO_VERIFY_LEAF_SIGNATURE",
            TlsErrorCode::CertChainTooLong => "CERT_CHAIN_TOO_LONG",
            TlsErrorCode::CertRevoked => "CERT_REVOKED",
            TlsErrorCode::InvalidCa => "INVALID_CA",
            TlsErrorCode::PathLengthExceeded => "PATH_LENGTH_EXCEEDED",
            TlsErrorCode::InvalidPurpose => "INVALID_PURPOSE",
            TlsErrorCode::CertUntrusted => "CERT_UNTRUSTED",
            TlsErrorCode::CertRejected => "CERT_REJECTED",
            TlsErrorCode::HostnameMismatch => "HOSTNAME_MISMATCH",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TlsErrorCode::UnableToGetIssuerCert => "Unable to get issuer certificate",
            TlsErrorCode::UnableToGetCrl => "Unable to get certificate CRL",
            TlsErrorCode::UnableToDecryptCertSignature => "Unable to decrypt certificate's signature",
            TlsErrorCode::UnableToDecryptCrlSignature => "Unable to decrypt CRL's signature",
            TlsErrorCode::UnableToDecodeIssuerPublicKey => "Unable to decode issuer public key",
            TlsErrorCode::CertSignatureFailure => "Certificate signature failure",
            TlsErrorCode::CrlSignatureFailure => "CRL signature failure",
            TlsErrorCode::CertNotYetValid => "Certificate is not yet valid",
            TlsErrorCode::CertHasExpired => "Certificate has expired",
            TlsErrorCode::CrlNotYetValid => "CRL is not yet valid",
            TlsErrorCode::CrlHasExpired => "CRL has expired",
            TlsErrorCode::ErrorInCertNotBeforeField => "Format error in certificate's notBefore field",
            TlsErrorCode::ErrorInCertNotAfterField => "Format error in certificate's notAfter field",
            TlsErrorCode::ErrorInCrlLastUpdateField => "Format error in CRL's lastUpdate field",
            TlsErrorCode::ErrorInCrlNextUpdateField => "Format error in CRL's nextUpdate field",
            TlsErrorCode::OutOfMem => "Out of memory",
            TlsErrorCode::DepthZeroSelfSignedCert => "Self signed certificate",
            TlsErrorCode::SelfSignedCertInChain => "Self signed certificate in certificate chain",
            TlsErrorCode::UnableToGetIssuerCertLocally => "Unable to get local issuer certificate",
            TlsErrorCode::UnableToVerifyLeafSignature => "Unable to verify the first certificate",
            TlsErrorCode::CertChainTooLong => "Certificate chain too long",
            TlsErrorCode::CertRevoked => "Certificate revoked",
            TlsErrorCode::InvalidCa => "Invalid CA certificate",
            TlsErrorCode::PathLengthExceeded => "Path length constraint exceeded",
            TlsErrorCode::InvalidPurpose => "Unsupported certificate purpose",
            TlsErrorCode::CertUntrusted => "Certificate not trusted",
            TlsErrorCode::CertRejected => "Certificate rejected",
            TlsErrorCode::HostnameMismatch => "Hostname mismatch",
        }
    }

    /// Look up a code by its upper-case name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|code| code.as_str() == name)
    }

    /// Map a verifier error from the TLS stack onto the code table.
    pub fn from_certificate_error(err: &CertificateError) -> Self {
        match err {
            CertificateError::Expired | CertificateError::ExpiredContext { .. } => {
                TlsErrorCode::CertHasExpired
            }
            CertificateError::NotValidYet | CertificateError::NotValidYetContext { .. } => {
                TlsErrorCode::CertNotYetValid
            }
            CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. } => {
                TlsErrorCode::HostnameMismatch
            }
            CertificateError::ExpiredRevocationList
            | CertificateError::ExpiredRevocationListContext { .. } => TlsErrorCode::CrlHasExpired,
            CertificateError::InvalidPurpose | CertificateError::InvalidPurposeContext { .. } => {
                TlsErrorCode::InvalidPurpose
            }
            CertificateError::UnknownRevocationStatus => TlsErrorCode::UnableToGetCrl,
            CertificateError::Revoked => TlsErrorCode::CertRevoked,
            CertificateError::UnknownIssuer => TlsErrorCode::UnableToGetIssuerCertLocally,
            CertificateError::BadSignature => TlsErrorCode::CertSignatureFailure,
            CertificateError::ApplicationVerificationFailure => TlsErrorCode::CertUntrusted,
            CertificateError::Other(other) if other.0.is::<SelfSignedLeaf>() => {
                TlsErrorCode::DepthZeroSelfSignedCert
            }
            _ => TlsErrorCode::CertRejected,
        }
    }
}

/// Classified outcome of a failed outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    Timeout,
    Dns { temporary: bool },
    ConnectionRefused,
    ConnectionReset,
    Tls(TlsErrorCode),
    /// `code` is the OS error name when the root cause carries one.
    Unknown { message: String, code: Option<&'static str> },
}

impl Failure {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Failure::Timeout => ErrorKind::Timeout,
            Failure::Dns { .. } => ErrorKind::DnsFailure,
            Failure::ConnectionRefused => ErrorKind::ConnectionRefused,
            Failure::ConnectionReset => ErrorKind::ConnectionReset,
            Failure::Tls(_) => ErrorKind::SslError,
            Failure::Unknown { .. } => ErrorKind::UnknownError,
        }
    }

    pub fn code(&self) -> Option<&'static str> {
        match self {
            Failure::Timeout => None,
            Failure::Unknown { code, .. } => *code,
            Failure::Dns { temporary: true } => Some("EAI_AGAIN"),
            Failure::Dns { temporary: false } => Some("ENOTFOUND"),
            Failure::ConnectionRefused => Some("ECONNREFUSED"),
            Failure::ConnectionReset => Some("ECONNRESET"),
            Failure::Tls(code) => Some(code.as_str()),
        }
    }

    /// Build the caller-facing envelope. `timeout` is the configured budget.
    pub fn into_envelope(self, timeout: Duration, elapsed_ms: f64) -> ErrorEnvelope {
        let message = match &self {
            Failure::Timeout => timeout_message(timeout),
            Failure::Dns { .. } => "DNS Lookup failed".to_string(),
            Failure::ConnectionRefused => "Connection refused by the server".to_string(),
            Failure::ConnectionReset => "Connection got reset by peer".to_string(),
            Failure::Tls(code) => code.description().to_string(),
            Failure::Unknown { message, .. } => message.clone(),
        };
        ErrorEnvelope::new(
            self.kind(),
            message,
            self.code().map(str::to_string),
            Some(elapsed_ms),
        )
    }
}

/// "Request timed out after 60 seconds".
pub fn timeout_message(timeout: Duration) -> String {
    let secs = timeout.as_secs();
    let unit = if secs == 1 { "second" } else { "seconds" };
    format!("Request timed out after {} {}", secs, unit)
}

const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error occurred";

/// Classify an error raised while dispatching or reading a response.
pub fn classify(err: &(dyn StdError + 'static)) -> Failure {
    let chain: Vec<&(dyn StdError + 'static)> =
        std::iter::successors(Some(err), |&e| next_cause(e)).collect();

    if chain.iter().any(|e| e.is::<DeadlineExceeded>()) {
        return Failure::Timeout;
    }

    if chain.iter().any(|e| is_dns_failure(*e)) {
        let temporary = chain.iter().any(|e| is_temporary_dns_failure(*e));
        return Failure::Dns { temporary };
    }

    let io_kinds: Vec<io::ErrorKind> = chain
        .iter()
        .filter_map(|e| e.downcast_ref::<io::Error>())
        .map(io::Error::kind)
        .collect();
    if io_kinds.contains(&io::ErrorKind::ConnectionRefused) {
        return Failure::ConnectionRefused;
    }
    if io_kinds.contains(&io::ErrorKind::ConnectionReset) {
        return Failure::ConnectionReset;
    }

    if let Some(code) = chain.iter().find_map(|e| tls_code(*e)) {
        return Failure::Tls(code);
    }

    Failure::Unknown {
        message: describe(&chain),
        code: io_kinds.iter().find_map(|kind| os_code(*kind)),
    }
}

/// The next error down the chain. `io::Error::source()` skips the payload
/// it wraps, so a wrapped payload is visited before its own source.
fn next_cause<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a (dyn StdError + 'static)> {
    if let Some(inner) = err.downcast_ref::<io::Error>().and_then(io::Error::get_ref) {
        let inner: &(dyn StdError + 'static) = inner;
        return Some(inner);
    }
    err.source()
}

/// OS error names for failures that have no dedicated kind.
fn os_code(kind: io::ErrorKind) -> Option<&'static str> {
    match kind {
        io::ErrorKind::TimedOut => Some("ETIMEDOUT"),
        io::ErrorKind::ConnectionAborted => Some("ECONNABORTED"),
        io::ErrorKind::BrokenPipe => Some("EPIPE"),
        io::ErrorKind::AddrNotAvailable => Some("EADDRNOTAVAIL"),
        _ => None,
    }
}

fn is_dns_failure(err: &(dyn StdError + 'static)) -> bool {
    let text = err.to_string().to_ascii_lowercase();
    text.starts_with("dns error")
        || text.contains("failed to lookup address")
        || text.contains("name or service not known")
        || text.contains("nodename nor servname")
        || text.contains("no such host")
}

/// Resolver said "try again" rather than "no such name".
fn is_temporary_dns_failure(err: &(dyn StdError + 'static)) -> bool {
    let text = err.to_string().to_ascii_lowercase();
    text.contains("temporary failure") || text.contains("try again")
}

fn tls_code(err: &(dyn StdError + 'static)) -> Option<TlsErrorCode> {
    match err.downcast_ref::<rustls::Error>()? {
        rustls::Error::InvalidCertificate(cert) => Some(TlsErrorCode::from_certificate_error(cert)),
        _ => None,
    }
}

/// Message for unclassified errors: the outermost message plus the root cause.
fn describe(chain: &[&(dyn StdError + 'static)]) -> String {
    let outer = chain.first().map(|e| e.to_string()).unwrap_or_default();
    let root = chain.last().map(|e| e.to_string()).unwrap_or_default();

    let message = if chain.len() > 1 && !root.is_empty() && !outer.contains(&root) {
        format!("{}: {}", outer, root)
    } else {
        outer
    };

    if message.trim().is_empty() {
        UNKNOWN_ERROR_MESSAGE.to_string()
    } else {
        message
    }
}

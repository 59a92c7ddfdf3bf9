// src/utils/smtp/result.rs
//! Classifies transport faults raised during one SMTP attempt into an [`ErrorKind`].

use crate::core::models::ErrorKind;
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::time::Duration;

/// The step of an attempt in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    Resolve,
    Connect,
    Authenticate,
    Submit,
}

impl fmt::Display for AttemptPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttemptPhase::Resolve => "resolve",
            AttemptPhase::Connect => "connect",
            AttemptPhase::Authenticate => "authenticate",
            AttemptPhase::Submit => "submit",
        };
        f.write_str(name)
    }
}

/// A classified failure of one attempt, carrying the raw text for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub kind: ErrorKind,
    pub phase: AttemptPhase,
    pub detail: String,
}

impl AttemptFailure {
    pub fn new(kind: ErrorKind, phase: AttemptPhase, detail: impl Into<String>) -> Self {
        Self {
            kind,
            phase,
            detail: detail.into(),
        }
    }

    /// A phase exceeded its bound.
    pub fn timed_out(phase: AttemptPhase, what: &str, bound: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            phase,
            format!("{} timed out after {} ms", what, bound.as_millis()),
        )
    }

    /// Name resolution failed or returned no addresses.
    pub fn unresolvable(host: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::HostUnresolvable,
            AttemptPhase::Resolve,
            format!("getaddrinfo ENOTFOUND {}: {}", host, reason),
        )
    }

    /// Classifies a socket or TLS error raised during `phase`.
    pub fn from_io(phase: AttemptPhase, err: &io::Error) -> Self {
        let kind = classify_io_error(phase, err).unwrap_or_else(|| fallback_kind(phase));
        Self::new(kind, phase, err.to_string())
    }

    /// Classifies a lettre SMTP error raised during `phase`.
    pub fn from_smtp(phase: AttemptPhase, err: &lettre::transport::smtp::Error) -> Self {
        Self::new(classify_smtp_error(phase, err), phase, err.to_string())
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} phase): {}", self.kind, self.phase, self.detail)
    }
}

/// Walks the source chain looking for the underlying I/O error.
fn io_error_in_chain<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a io::Error> {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            return Some(io_err);
        }
        current = e.source();
    }
    None
}

/// A rejected or garbled TLS handshake surfaces as `InvalidData`, usually
/// carrying the rustls error.
fn is_tls_handshake_failure(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::InvalidData
        || err.get_ref().is_some_and(|inner| inner.is::<rustls::Error>())
}

/// Maps an I/O error kind to the taxonomy, if it is a recognized transport fault.
pub fn classify_io_kind(kind: io::ErrorKind) -> Option<ErrorKind> {
    match kind {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Some(ErrorKind::Timeout),
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::BrokenPipe => Some(ErrorKind::ConnectionRefused),
        _ => None,
    }
}

fn classify_io_error(phase: AttemptPhase, err: &io::Error) -> Option<ErrorKind> {
    if let Some(kind) = classify_io_kind(err.kind()) {
        return Some(kind);
    }
    (phase == AttemptPhase::Connect && is_tls_handshake_failure(err))
        .then_some(ErrorKind::ConnectionRefused)
}

fn fallback_kind(phase: AttemptPhase) -> ErrorKind {
    match phase {
        AttemptPhase::Resolve => ErrorKind::HostUnresolvable,
        _ => ErrorKind::Other,
    }
}

fn classify_smtp_error(phase: AttemptPhase, err: &lettre::transport::smtp::Error) -> ErrorKind {
    if let Some(kind) = io_error_in_chain(err).and_then(|e| classify_io_error(phase, e)) {
        return kind;
    }
    if err.is_tls() {
        return ErrorKind::ConnectionRefused;
    }
    match phase {
        // Rejected credentials (5xx/4xx) or no usable mechanism.
        AttemptPhase::Authenticate
            if err.is_permanent() || err.is_transient() || err.is_client() =>
        {
            ErrorKind::AuthenticationFailed
        }
        _ => fallback_kind(phase),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_kinds_map_to_taxonomy() {
        assert_eq!(
            classify_io_kind(io::ErrorKind::ConnectionRefused),
            Some(ErrorKind::ConnectionRefused)
        );
        assert_eq!(
            classify_io_kind(io::ErrorKind::ConnectionReset),
            Some(ErrorKind::ConnectionRefused)
        );
        assert_eq!(classify_io_kind(io::ErrorKind::TimedOut), Some(ErrorKind::Timeout));
        assert_eq!(classify_io_kind(io::ErrorKind::InvalidData), None);
    }

    #[test]
    fn finds_io_error_behind_wrappers() {
        #[derive(Debug)]
        struct Wrapper(io::Error);
        impl fmt::Display for Wrapper {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "wrapped")
            }
        }
        impl StdError for Wrapper {
            fn source(&self) -> Option<&(dyn StdError + 'static)> {
                Some(&self.0)
            }
        }

        let err = Wrapper(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert_eq!(
            io_error_in_chain(&err).map(io::Error::kind),
            Some(io::ErrorKind::ConnectionRefused)
        );
    }

    #[test]
    fn handshake_failures_are_refusals_only_while_connecting() {
        let garbled = io::Error::new(io::ErrorKind::InvalidData, "received corrupt message");
        assert_eq!(
            AttemptFailure::from_io(AttemptPhase::Connect, &garbled).kind,
            ErrorKind::ConnectionRefused
        );
        assert_eq!(
            AttemptFailure::from_io(AttemptPhase::Submit, &garbled).kind,
            ErrorKind::Other
        );

        let rejected = io::Error::other(rustls::Error::InvalidCertificate(
            rustls::CertificateError::UnknownIssuer,
        ));
        assert!(is_tls_handshake_failure(&rejected));
        assert_eq!(
            AttemptFailure::from_io(AttemptPhase::Connect, &rejected).kind,
            ErrorKind::ConnectionRefused
        );
    }

    #[test]
    fn timeout_detail_names_the_bound() {
        let failure =
            AttemptFailure::timed_out(AttemptPhase::Connect, "Greeting", Duration::from_secs(10));
        assert_eq!(failure.kind, ErrorKind::Timeout);
        assert_eq!(failure.detail, "Greeting timed out after 10000 ms");
    }
}

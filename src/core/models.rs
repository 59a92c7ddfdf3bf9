//! Defines the core data structures shared by the verifier, the discovery
//! orchestrator and the service layer.

use crate::core::error::{AppError, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How the transport-security layer is established for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionMode {
    /// TLS is negotiated before any SMTP dialogue (classic port 465).
    ImplicitTls,
    /// Cleartext connection upgraded via STARTTLS when the server offers it.
    StartTlsOrPlain,
    /// Cleartext only; STARTTLS is never issued even when offered.
    Unencrypted,
}

impl EncryptionMode {
    /// Short human-readable name used in labels and reports.
    pub fn display_name(self) -> &'static str {
        match self {
            EncryptionMode::ImplicitTls => "SSL/TLS",
            EncryptionMode::StartTlsOrPlain => "STARTTLS",
            EncryptionMode::Unencrypted => "Unencrypted",
        }
    }

    pub fn is_implicit_tls(self) -> bool {
        self == EncryptionMode::ImplicitTls
    }
}

impl fmt::Display for EncryptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for EncryptionMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" | "ssl" | "tls" | "implicit" => Ok(EncryptionMode::ImplicitTls),
            "false" | "starttls" => Ok(EncryptionMode::StartTlsOrPlain),
            "none" | "plain" | "unencrypted" => Ok(EncryptionMode::Unencrypted),
            other => Err(AppError::Validation(format!(
                "Unknown encryption mode '{}' (expected true, false or none)",
                other
            ))),
        }
    }
}

/// One SMTP endpoint configuration to attempt.
///
/// Fields are private and only readable after construction; the profile is
/// never mutated once handed to a verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionProfile {
    host: String,
    port: u16,
    encryption: EncryptionMode,
    label: String,
    connect_timeout_ms: Option<u64>,
    greeting_timeout_ms: Option<u64>,
}

impl ConnectionProfile {
    /// Creates a profile, rejecting an empty host or port 0.
    ///
    /// The label defaults to `"<mode> (<port>)"`, e.g. `"STARTTLS (587)"`.
    pub fn new(host: impl Into<String>, port: u16, encryption: EncryptionMode) -> Result<Self> {
        let host = host.into().trim().to_string();
        if host.is_empty() {
            return Err(AppError::Validation("SMTP host must not be empty".to_string()));
        }
        if port == 0 {
            return Err(AppError::Validation(
                "SMTP port must be between 1 and 65535".to_string(),
            ));
        }
        Ok(Self {
            label: format!("{} ({})", encryption.display_name(), port),
            host,
            port,
            encryption,
            connect_timeout_ms: None,
            greeting_timeout_ms: None,
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the connect and greeting bounds. `None` leaves a phase unbounded.
    pub fn with_timeouts(mut self, connect_ms: Option<u64>, greeting_ms: Option<u64>) -> Self {
        self.connect_timeout_ms = connect_ms;
        self.greeting_timeout_ms = greeting_ms;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn encryption(&self) -> EncryptionMode {
        self.encryption
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn greeting_timeout(&self) -> Option<Duration> {
        self.greeting_timeout_ms.map(Duration::from_millis)
    }
}

/// SMTP login secrets. The password never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    user: String,
    pass: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            pass: pass.into(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn pass(&self) -> &str {
        &self.pass
    }

    /// No username means the AUTH step is skipped.
    pub fn is_anonymous(&self) -> bool {
        self.user.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}

/// The from/to/subject/body tuple handed to the transport for a test send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSpec {
    /// Envelope and header sender, already defaulted to the login user.
    pub from: String,
    /// Single recipient.
    pub to: String,
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

impl MessageSpec {
    /// Builds a message spec; an empty `from` falls back to the login user.
    pub fn new(
        from: &str,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        credentials: &Credentials,
    ) -> Self {
        let from = if from.trim().is_empty() {
            credentials.user().to_string()
        } else {
            from.trim().to_string()
        };
        Self {
            from,
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Classified cause of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AuthenticationFailed,
    ConnectionRefused,
    Timeout,
    HostUnresolvable,
    Other,
}

impl ErrorKind {
    /// Stable short code, compatible with the error codes of common SMTP clients.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::AuthenticationFailed => "EAUTH",
            ErrorKind::ConnectionRefused => "ECONNECTION",
            ErrorKind::Timeout => "ETIMEDOUT",
            ErrorKind::HostUnresolvable => "ENOTFOUND",
            ErrorKind::Other => "EOTHER",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::AuthenticationFailed => "authentication failed",
            ErrorKind::ConnectionRefused => "connection refused",
            ErrorKind::Timeout => "timeout",
            ErrorKind::HostUnresolvable => "host unresolvable",
            ErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// Connectivity and authentication confirmed, nothing sent.
    Verified,
    /// Authenticated and the test message was accepted.
    VerifiedAndSent,
    Failed,
    /// Discovery was cancelled before this candidate completed.
    NotAttempted,
}

impl AttemptStatus {
    pub fn is_success(self) -> bool {
        matches!(self, AttemptStatus::Verified | AttemptStatus::VerifiedAndSent)
    }
}

/// Result of one verifier invocation.
///
/// For `VerifiedAndSent` exactly `message_id` is set; for `Failed` exactly
/// `error_kind` is set. `NotAttempted` carries neither, only a detail line.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptOutcome {
    /// The profile that was attempted.
    pub profile: ConnectionProfile,
    pub status: AttemptStatus,
    /// Message-ID header of the accepted test message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Final server reply to the submission, e.g. `250 2.0.0 Ok: queued`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_response_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Human-readable cause; for SMTP rejections this includes the reply code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// Whether the SMTP session was encrypted when the attempt ended.
    pub tls_negotiated: bool,
    /// Wall time from start of the attempt to its outcome.
    pub elapsed_ms: u64,
}

impl AttemptOutcome {
    /// Connection and authentication succeeded without a send.
    pub fn verified(profile: ConnectionProfile, tls_negotiated: bool, elapsed: Duration) -> Self {
        Self {
            profile,
            status: AttemptStatus::Verified,
            message_id: None,
            transport_response_line: None,
            error_kind: None,
            error_detail: None,
            tls_negotiated,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// The test message was accepted with `response_line`.
    pub fn sent(
        profile: ConnectionProfile,
        message_id: String,
        response_line: String,
        tls_negotiated: bool,
        elapsed: Duration,
    ) -> Self {
        Self {
            profile,
            status: AttemptStatus::VerifiedAndSent,
            message_id: Some(message_id),
            transport_response_line: Some(response_line),
            error_kind: None,
            error_detail: None,
            tls_negotiated,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn failed(
        profile: ConnectionProfile,
        kind: ErrorKind,
        detail: impl Into<String>,
        tls_negotiated: bool,
        elapsed: Duration,
    ) -> Self {
        Self {
            profile,
            status: AttemptStatus::Failed,
            message_id: None,
            transport_response_line: None,
            error_kind: Some(kind),
            error_detail: Some(detail.into()),
            tls_negotiated,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// Placeholder for a candidate skipped by cancellation.
    pub fn not_attempted(profile: ConnectionProfile, reason: impl Into<String>) -> Self {
        Self {
            profile,
            status: AttemptStatus::NotAttempted,
            message_id: None,
            transport_response_line: None,
            error_kind: None,
            error_detail: Some(reason.into()),
            tls_negotiated: false,
            elapsed_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Aggregate of one discovery run. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryReport {
    /// Host every candidate was tried against.
    host: String,
    /// One outcome per candidate, in candidate order.
    attempts: Vec<AttemptOutcome>,
    total_attempted: usize,
    /// Derived from `attempts` at construction.
    success_count: usize,
}

impl DiscoveryReport {
    /// `total_attempted` is the size of the candidate list, which may exceed
    /// `attempts.len()` only if the caller passes a truncated list.
    pub fn new(host: impl Into<String>, attempts: Vec<AttemptOutcome>, total_attempted: usize) -> Self {
        let success_count = attempts.iter().filter(|a| a.is_success()).count();
        Self {
            host: host.into(),
            attempts,
            total_attempted,
            success_count,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn attempts(&self) -> &[AttemptOutcome] {
        &self.attempts
    }

    pub fn total_attempted(&self) -> usize {
        self.total_attempted
    }

    pub fn success_count(&self) -> usize {
        self.success_count
    }

    pub fn successful(&self) -> impl Iterator<Item = &AttemptOutcome> {
        self.attempts.iter().filter(|a| a.is_success())
    }
}

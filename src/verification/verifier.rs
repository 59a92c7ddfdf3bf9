//! Single-attempt SMTP verification: connect, secure, authenticate and
//! optionally submit one test message.
//!
//! Every fault inside an attempt is converted into a `Failed`
//! [`AttemptOutcome`]; nothing escapes [`Verifier::attempt`], which is what
//! lets the discovery loop run candidates back to back without guards of
//! its own beyond [`isolate`].

use crate::core::config::Config;
use crate::core::models::{
    AttemptOutcome, ConnectionProfile, Credentials, EncryptionMode, ErrorKind, MessageSpec,
};
use crate::utils::smtp::{
    build_message, client_config, generate_message_id, AttemptFailure, AttemptPhase,
    TlsTransport,
};
use futures::FutureExt;
use lettre::transport::smtp::authentication::{
    Credentials as SmtpCredentials, DEFAULT_MECHANISMS,
};
use lettre::transport::smtp::client::{AsyncSmtpConnection, AsyncTokioStream, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use lettre::transport::smtp::response::Response;
use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

/// Performs one attempt against a fully specified profile.
///
/// Implementations must never panic or return early without an outcome;
/// callers nevertheless wrap them in [`isolate`].
pub trait Verifier {
    fn attempt(
        &self,
        profile: &ConnectionProfile,
        credentials: &Credentials,
        message: Option<&MessageSpec>,
    ) -> impl Future<Output = AttemptOutcome> + Send;
}

/// Runs an attempt future, turning a panic into a `Failed` outcome.
pub async fn isolate<F>(profile: &ConnectionProfile, attempt: F) -> AttemptOutcome
where
    F: Future<Output = AttemptOutcome>,
{
    let started = Instant::now();
    match AssertUnwindSafe(attempt).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(
                target: "verifier",
                "[{}] Attempt panicked: {}",
                profile.label(),
                reason
            );
            AttemptOutcome::failed(
                profile.clone(),
                ErrorKind::Other,
                format!("Attempt aborted unexpectedly: {}", reason),
                false,
                started.elapsed(),
            )
        }
    }
}

/// Awaits `fut`, bounded by `limit` when one is set. `None` means it timed out.
async fn bounded<F, T>(limit: Option<Duration>, fut: F) -> Option<T>
where
    F: Future<Output = T>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}

fn format_response(response: &Response) -> String {
    let text = response.message().collect::<Vec<_>>().join(" ");
    format!("{} {}", response.code(), text).trim_end().to_string()
}

/// Accepted submission.
#[derive(Debug)]
struct Delivery {
    message_id: String,
    response_line: String,
}

/// State that must survive a failure for reporting.
#[derive(Debug, Default)]
struct AttemptTrace {
    tls_negotiated: bool,
}

/// The lettre-backed verifier used in production.
#[derive(Debug, Clone)]
pub struct SmtpVerifier {
    hello_name: String,
    accept_invalid_certs: bool,
    command_timeout: Duration,
}

impl SmtpVerifier {
    pub fn new(config: &Config) -> Self {
        Self {
            hello_name: config.hello_name.clone(),
            accept_invalid_certs: config.accept_invalid_certs,
            command_timeout: config.command_timeout,
        }
    }

    pub fn accept_invalid_certs(&self) -> bool {
        self.accept_invalid_certs
    }

    fn client_id(&self) -> ClientId {
        ClientId::Domain(self.hello_name.clone())
    }

    fn tls_parameters(&self, host: &str) -> Result<TlsParameters, AttemptFailure> {
        TlsParameters::builder(host.to_string())
            .dangerous_accept_invalid_certs(self.accept_invalid_certs)
            .dangerous_accept_invalid_hostnames(self.accept_invalid_certs)
            .build()
            .map_err(|e| AttemptFailure::from_smtp(AttemptPhase::Connect, &e))
    }

    async fn resolve(&self, profile: &ConnectionProfile) -> Result<Vec<SocketAddr>, AttemptFailure> {
        let lookup = tokio::net::lookup_host((profile.host(), profile.port()));
        let addrs = match bounded(profile.connect_timeout(), lookup).await {
            Some(Ok(addrs)) => addrs.collect::<Vec<_>>(),
            Some(Err(e)) => return Err(AttemptFailure::unresolvable(profile.host(), e)),
            None => {
                return Err(AttemptFailure::timed_out(
                    AttemptPhase::Resolve,
                    "Name resolution",
                    profile.connect_timeout().unwrap_or_default(),
                ))
            }
        };
        if addrs.is_empty() {
            return Err(AttemptFailure::unresolvable(profile.host(), "no addresses found"));
        }
        Ok(addrs)
    }

    /// Opens a TCP connection, trying each resolved address in turn. Each
    /// address gets the full connect bound.
    async fn connect_tcp(
        &self,
        profile: &ConnectionProfile,
        addrs: &[SocketAddr],
    ) -> Result<TcpStream, AttemptFailure> {
        let mut last_failure = None;
        for addr in addrs {
            tracing::debug!(target: "verifier", "[{}] Connecting to {}", profile.label(), addr);
            let failure = match bounded(profile.connect_timeout(), TcpStream::connect(addr)).await {
                Some(Ok(tcp)) => return Ok(tcp),
                Some(Err(e)) => AttemptFailure::from_io(AttemptPhase::Connect, &e),
                None => AttemptFailure::timed_out(
                    AttemptPhase::Connect,
                    "Connection",
                    profile.connect_timeout().unwrap_or_default(),
                ),
            };
            tracing::debug!(target: "verifier", "[{}] {} failed: {}", profile.label(), addr, failure);
            last_failure = Some(failure);
        }
        Err(last_failure.unwrap_or_else(|| {
            AttemptFailure::unresolvable(profile.host(), "no addresses found")
        }))
    }

    /// Brings up the SMTP session over `tcp`: the implicit-TLS handshake
    /// when requested (under the connect bound), then the greeting and EHLO
    /// (under the greeting bound).
    ///
    /// Returns the connection and whether it is encrypted.
    async fn start_session(
        &self,
        profile: &ConnectionProfile,
        tcp: TcpStream,
        client_id: &ClientId,
    ) -> Result<(AsyncSmtpConnection, bool), AttemptFailure> {
        let (stream, encrypted): (Box<dyn AsyncTokioStream>, bool) = match profile.encryption() {
            EncryptionMode::ImplicitTls => {
                let config = client_config(self.accept_invalid_certs).map_err(|e| {
                    AttemptFailure::new(ErrorKind::Other, AttemptPhase::Connect, e.to_string())
                })?;
                let handshake = TlsTransport::handshake(tcp, profile.host(), config);
                match bounded(profile.connect_timeout(), handshake).await {
                    Some(Ok(tls)) => (Box::new(tls), true),
                    Some(Err(e)) => return Err(AttemptFailure::from_io(AttemptPhase::Connect, &e)),
                    None => {
                        return Err(AttemptFailure::timed_out(
                            AttemptPhase::Connect,
                            "TLS handshake",
                            profile.connect_timeout().unwrap_or_default(),
                        ))
                    }
                }
            }
            EncryptionMode::StartTlsOrPlain | EncryptionMode::Unencrypted => (Box::new(tcp), false),
        };

        let greeting = AsyncSmtpConnection::connect_with_transport(stream, client_id);
        match bounded(profile.greeting_timeout(), greeting).await {
            Some(Ok(conn)) => Ok((conn, encrypted)),
            Some(Err(e)) => Err(AttemptFailure::from_smtp(AttemptPhase::Connect, &e)),
            None => Err(AttemptFailure::timed_out(
                AttemptPhase::Connect,
                "Greeting",
                profile.greeting_timeout().unwrap_or_default(),
            )),
        }
    }

    async fn run(
        &self,
        profile: &ConnectionProfile,
        credentials: &Credentials,
        message: Option<&MessageSpec>,
        trace: &mut AttemptTrace,
    ) -> Result<Option<Delivery>, AttemptFailure> {
        let label = profile.label();
        let client_id = self.client_id();
        let addrs = self.resolve(profile).await?;

        let tcp = self.connect_tcp(profile, &addrs).await?;
        let (mut conn, encrypted) = self.start_session(profile, tcp, &client_id).await?;
        trace.tls_negotiated = encrypted;
        tracing::debug!(target: "verifier", "[{}] Session established (encrypted: {})", label, trace.tls_negotiated);

        match profile.encryption() {
            EncryptionMode::StartTlsOrPlain if conn.can_starttls() => {
                tracing::debug!(target: "verifier", "[{}] Server offers STARTTLS, upgrading", label);
                let params = self.tls_parameters(profile.host())?;
                match bounded(Some(self.command_timeout), conn.starttls(params, &client_id)).await {
                    Some(Ok(())) => trace.tls_negotiated = conn.is_encrypted(),
                    Some(Err(e)) => return Err(AttemptFailure::from_smtp(AttemptPhase::Connect, &e)),
                    None => {
                        return Err(AttemptFailure::timed_out(
                            AttemptPhase::Connect,
                            "STARTTLS negotiation",
                            self.command_timeout,
                        ))
                    }
                }
            }
            EncryptionMode::StartTlsOrPlain => {
                tracing::debug!(target: "verifier", "[{}] STARTTLS not offered, continuing in cleartext", label);
            }
            EncryptionMode::Unencrypted if conn.can_starttls() => {
                tracing::debug!(target: "verifier", "[{}] Ignoring offered STARTTLS (unencrypted mode)", label);
            }
            EncryptionMode::Unencrypted | EncryptionMode::ImplicitTls => {}
        }

        if credentials.is_anonymous() {
            tracing::debug!(target: "verifier", "[{}] No username given, skipping AUTH", label);
        } else {
            let smtp_credentials = SmtpCredentials::new(
                credentials.user().to_string(),
                credentials.pass().to_string(),
            );
            let auth = conn.auth(DEFAULT_MECHANISMS, &smtp_credentials);
            match bounded(Some(self.command_timeout), auth).await {
                Some(Ok(_)) => {
                    tracing::debug!(target: "verifier", "[{}] Authenticated as {}", label, credentials.user())
                }
                Some(Err(e)) => return Err(AttemptFailure::from_smtp(AttemptPhase::Authenticate, &e)),
                None => {
                    return Err(AttemptFailure::timed_out(
                        AttemptPhase::Authenticate,
                        "Authentication",
                        self.command_timeout,
                    ))
                }
            }
        }

        let Some(spec) = message else {
            let _ = bounded(Some(self.command_timeout), conn.quit()).await;
            return Ok(None);
        };

        let message_id = generate_message_id(&spec.from);
        let email = build_message(spec, &message_id)
            .map_err(|e| AttemptFailure::new(ErrorKind::Other, AttemptPhase::Submit, e.to_string()))?;
        let raw = email.formatted();

        let response = match bounded(
            Some(self.command_timeout),
            conn.send(email.envelope(), &raw),
        )
        .await
        {
            Some(Ok(response)) => response,
            Some(Err(e)) => return Err(AttemptFailure::from_smtp(AttemptPhase::Submit, &e)),
            None => {
                return Err(AttemptFailure::timed_out(
                    AttemptPhase::Submit,
                    "Message submission",
                    self.command_timeout,
                ))
            }
        };

        let _ = bounded(Some(self.command_timeout), conn.quit()).await;
        Ok(Some(Delivery {
            message_id,
            response_line: format_response(&response),
        }))
    }

    async fn attempt_inner(
        &self,
        profile: &ConnectionProfile,
        credentials: &Credentials,
        message: Option<&MessageSpec>,
    ) -> AttemptOutcome {
        let started = Instant::now();
        let mut trace = AttemptTrace::default();
        tracing::info!(
            target: "verifier",
            "[{}] Attempting {}:{} ({}) for {}",
            profile.label(),
            profile.host(),
            profile.port(),
            profile.encryption(),
            credentials.user()
        );

        let result = self.run(profile, credentials, message, &mut trace).await;
        let elapsed = started.elapsed();
        match result {
            Ok(None) => {
                tracing::info!(target: "verifier", "[{}] Connection verified", profile.label());
                AttemptOutcome::verified(profile.clone(), trace.tls_negotiated, elapsed)
            }
            Ok(Some(delivery)) => {
                tracing::info!(
                    target: "verifier",
                    "[{}] Message sent: {}",
                    profile.label(),
                    delivery.message_id
                );
                AttemptOutcome::sent(
                    profile.clone(),
                    delivery.message_id,
                    delivery.response_line,
                    trace.tls_negotiated,
                    elapsed,
                )
            }
            Err(failure) => {
                tracing::warn!(target: "verifier", "[{}] Failed: {}", profile.label(), failure);
                AttemptOutcome::failed(
                    profile.clone(),
                    failure.kind,
                    failure.detail,
                    trace.tls_negotiated,
                    elapsed,
                )
            }
        }
    }
}

impl Verifier for SmtpVerifier {
    fn attempt(
        &self,
        profile: &ConnectionProfile,
        credentials: &Credentials,
        message: Option<&MessageSpec>,
    ) -> impl Future<Output = AttemptOutcome> + Send {
        isolate(profile, self.attempt_inner(profile, credentials, message))
    }
}

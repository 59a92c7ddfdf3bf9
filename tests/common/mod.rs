//! In-process SMTP server and scripted verifier shared by the integration tests.

#![allow(dead_code)]

use smtp_probe_core::{
    AttemptOutcome, ConnectionProfile, Credentials, ErrorKind, MessageSpec, Verifier,
};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio_rustls::rustls::{self, ServerConfig};
use tokio_rustls::TlsAcceptor;

#[derive(Debug, Clone, Copy)]
pub struct ServerBehavior {
    /// Advertise STARTTLS in the EHLO reply. The server cannot actually
    /// negotiate it and answers 454 if asked.
    pub advertise_starttls: bool,
    /// Answer AUTH with 235 (true) or 535 (false).
    pub accept_auth: bool,
    /// Accept the connection but never send a greeting.
    pub stall_greeting: bool,
}

impl Default for ServerBehavior {
    fn default() -> Self {
        Self {
            advertise_starttls: false,
            accept_auth: true,
            stall_greeting: false,
        }
    }
}

#[derive(Debug, Default)]
struct Recorded {
    commands: Vec<String>,
    messages: Vec<String>,
}

/// A minimal SMTP submission server bound to an ephemeral loopback port.
pub struct FakeSmtpServer {
    addr: SocketAddr,
    recorded: Arc<Mutex<Recorded>>,
    handle: JoinHandle<()>,
}

impl FakeSmtpServer {
    pub async fn start(behavior: ServerBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let recorded = Arc::new(Mutex::new(Recorded::default()));

        let shared = recorded.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let shared = shared.clone();
                tokio::spawn(async move {
                    let _ = session(stream, behavior, shared).await;
                });
            }
        });

        Self {
            addr,
            recorded,
            handle,
        }
    }

    /// Same dialogue, but every connection starts with a TLS handshake using
    /// a freshly generated self-signed certificate for `localhost`.
    pub async fn start_tls(behavior: ServerBehavior) -> Self {
        let acceptor = self_signed_acceptor();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let recorded = Arc::new(Mutex::new(Recorded::default()));

        let shared = recorded.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let shared = shared.clone();
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    // Clients that reject the certificate end here.
                    if let Ok(tls) = acceptor.accept(stream).await {
                        let _ = session(tls, behavior, shared).await;
                    }
                });
            }
        });

        Self {
            addr,
            recorded,
            handle,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Every command line received, in order, across all sessions.
    pub fn commands(&self) -> Vec<String> {
        self.recorded.lock().unwrap().commands.clone()
    }

    pub fn received_verb(&self, verb: &str) -> bool {
        self.commands()
            .iter()
            .any(|c| c.to_ascii_uppercase().starts_with(verb))
    }

    /// Raw DATA payloads of accepted messages.
    pub fn messages(&self) -> Vec<String> {
        self.recorded.lock().unwrap().messages.clone()
    }
}

impl Drop for FakeSmtpServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn self_signed_acceptor() -> TlsAcceptor {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
        certified.key_pair.serialize_der(),
    ));
    let config = ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_no_client_auth()
    .with_single_cert(vec![certified.cert.der().clone()], key)
    .unwrap();
    TlsAcceptor::from(Arc::new(config))
}

async fn session<S>(
    stream: S,
    behavior: ServerBehavior,
    recorded: Arc<Mutex<Recorded>>,
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read, mut write) = tokio::io::split(stream);
    let mut reader = BufReader::new(read);

    if behavior.stall_greeting {
        tokio::time::sleep(Duration::from_secs(30)).await;
        return Ok(());
    }
    write.write_all(b"220 fake.test ESMTP ready\r\n").await?;
    write.flush().await?;

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let command = line.trim_end().to_string();
        recorded.lock().unwrap().commands.push(command.clone());
        let verb = command
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_ascii_uppercase();

        match verb.as_str() {
            "EHLO" => {
                let mut reply = String::from("250-fake.test\r\n");
                if behavior.advertise_starttls {
                    reply.push_str("250-STARTTLS\r\n");
                }
                reply.push_str("250-AUTH PLAIN LOGIN\r\n250 8BITMIME\r\n");
                write.write_all(reply.as_bytes()).await?;
            }
            "HELO" | "MAIL" | "RCPT" | "RSET" | "NOOP" => {
                write.write_all(b"250 OK\r\n").await?;
            }
            "STARTTLS" => {
                write.write_all(b"454 4.7.0 TLS not available\r\n").await?;
            }
            "AUTH" if behavior.accept_auth => {
                write
                    .write_all(b"235 2.7.0 Authentication successful\r\n")
                    .await?;
            }
            "AUTH" => {
                write
                    .write_all(b"535 5.7.8 Authentication credentials invalid\r\n")
                    .await?;
            }
            "DATA" => {
                write.write_all(b"354 End data with <CR><LF>.<CR><LF>\r\n").await?;
                let mut payload = String::new();
                loop {
                    line.clear();
                    if reader.read_line(&mut line).await? == 0 {
                        return Ok(());
                    }
                    if line == ".\r\n" || line == ".\n" {
                        break;
                    }
                    payload.push_str(&line);
                }
                recorded.lock().unwrap().messages.push(payload);
                write.write_all(b"250 2.0.0 Ok: queued as FAKE1\r\n").await?;
            }
            "QUIT" => {
                write.write_all(b"221 2.0.0 Bye\r\n").await?;
                write.flush().await?;
                return Ok(());
            }
            _ => {
                write.write_all(b"500 5.5.2 Unrecognized command\r\n").await?;
            }
        }
        write.flush().await?;
    }
}

/// A loopback port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// What the scripted verifier does for one label.
#[derive(Debug, Clone)]
pub enum Script {
    Send,
    Fail(ErrorKind),
    Panic,
    /// Sleeps far longer than any test runs.
    Hang,
}

/// Verifier answering from a per-label script. Unlisted labels are refused.
#[derive(Debug, Clone, Default)]
pub struct ScriptedVerifier {
    script: Arc<HashMap<String, Script>>,
    calls: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl ScriptedVerifier {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Script)>,
        S: Into<String>,
    {
        Self {
            script: Arc::new(entries.into_iter().map(|(k, v)| (k.into(), v)).collect()),
            calls: Arc::default(),
        }
    }

    /// Labels attempted so far, with the subject of the message handed in.
    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Verifier for ScriptedVerifier {
    fn attempt(
        &self,
        profile: &ConnectionProfile,
        _credentials: &Credentials,
        message: Option<&MessageSpec>,
    ) -> impl Future<Output = AttemptOutcome> + Send {
        let profile = profile.clone();
        let subject = message.map(|m| m.subject.clone());
        let step = self.script.get(profile.label()).cloned();
        let calls = self.calls.clone();
        async move {
            calls
                .lock()
                .unwrap()
                .push((profile.label().to_string(), subject.clone()));
            match step {
                Some(Script::Send) => AttemptOutcome::sent(
                    profile.clone(),
                    format!("<{}@fake.test>", profile.port()),
                    "250 2.0.0 Ok: queued".to_string(),
                    false,
                    Duration::ZERO,
                ),
                Some(Script::Fail(kind)) => AttemptOutcome::failed(
                    profile,
                    kind,
                    format!("scripted {}", kind.code()),
                    false,
                    Duration::ZERO,
                ),
                Some(Script::Panic) => panic!("scripted panic"),
                Some(Script::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    AttemptOutcome::failed(
                        profile,
                        ErrorKind::Timeout,
                        "hang elapsed",
                        false,
                        Duration::ZERO,
                    )
                }
                None => AttemptOutcome::failed(
                    profile,
                    ErrorKind::ConnectionRefused,
                    "connect ECONNREFUSED",
                    false,
                    Duration::ZERO,
                ),
            }
        }
    }
}

//! Auto-discovery: tries a fixed, ordered list of port/encryption
//! combinations against one host and records every outcome.
//!
//! Candidates run strictly one after another. Probing several ports of the
//! same server in parallel tends to trip connection-rate defenses, which
//! would make the report describe the defenses instead of the configuration.

use crate::core::models::{
    AttemptOutcome, ConnectionProfile, Credentials, DiscoveryReport, EncryptionMode, MessageSpec,
};
use crate::core::error::Result;
use crate::verification::verifier::{isolate, Verifier};
use tokio::sync::watch;

/// Connect and greeting bound applied to every discovery attempt.
pub const DISCOVERY_TIMEOUT_MS: u64 = 10_000;

/// One fixed port/encryption combination tried during discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub port: u16,
    pub encryption: EncryptionMode,
    pub label: &'static str,
}

impl Candidate {
    /// Builds the profile for `host` with the discovery timeouts applied.
    pub fn profile(&self, host: &str) -> Result<ConnectionProfile> {
        Ok(ConnectionProfile::new(host, self.port, self.encryption)?
            .with_label(self.label)
            .with_timeouts(Some(DISCOVERY_TIMEOUT_MS), Some(DISCOVERY_TIMEOUT_MS)))
    }
}

/// The candidate list, in the order it is tried and reported.
pub const DISCOVERY_CANDIDATES: [Candidate; 7] = [
    Candidate {
        port: 587,
        encryption: EncryptionMode::StartTlsOrPlain,
        label: "STARTTLS (587)",
    },
    Candidate {
        port: 465,
        encryption: EncryptionMode::ImplicitTls,
        label: "SSL/TLS (465)",
    },
    Candidate {
        port: 25,
        encryption: EncryptionMode::StartTlsOrPlain,
        label: "STARTTLS (25)",
    },
    Candidate {
        port: 2525,
        encryption: EncryptionMode::StartTlsOrPlain,
        label: "STARTTLS (2525)",
    },
    Candidate {
        port: 25,
        encryption: EncryptionMode::Unencrypted,
        label: "Unencrypted (25)",
    },
    Candidate {
        port: 587,
        encryption: EncryptionMode::Unencrypted,
        label: "Unencrypted (587)",
    },
    Candidate {
        port: 2525,
        encryption: EncryptionMode::Unencrypted,
        label: "Unencrypted (2525)",
    },
];

/// Produces the message sent for a successful candidate.
pub type MessageFactory<'a> = dyn Fn(&ConnectionProfile) -> MessageSpec + Send + Sync + 'a;

/// Drives a [`Verifier`] over [`DISCOVERY_CANDIDATES`].
#[derive(Debug, Clone)]
pub struct Discovery<V> {
    verifier: V,
}

impl<V: Verifier + Sync> Discovery<V> {
    pub fn new(verifier: V) -> Self {
        Self { verifier }
    }

    /// Runs every candidate with the same message. See [`Discovery::run_with`].
    pub async fn run(
        &self,
        host: &str,
        credentials: &Credentials,
        message: &MessageSpec,
    ) -> Result<DiscoveryReport> {
        let factory = |_: &ConnectionProfile| message.clone();
        self.run_with(host, credentials, &factory, None, |_, _| {})
            .await
    }

    /// Runs every candidate in order and returns the full report.
    ///
    /// `message_for` builds the per-candidate message (discovery always sends
    /// on success). `on_attempt` is called after each candidate with its
    /// zero-based index. If `cancel` flips to `true`, the in-flight attempt
    /// is abandoned and it and every remaining candidate are recorded as
    /// not attempted.
    ///
    /// Only an invalid `host` fails the call; it is checked before any I/O.
    pub async fn run_with<F>(
        &self,
        host: &str,
        credentials: &Credentials,
        message_for: &MessageFactory<'_>,
        mut cancel: Option<watch::Receiver<bool>>,
        mut on_attempt: F,
    ) -> Result<DiscoveryReport>
    where
        F: FnMut(usize, &AttemptOutcome),
    {
        let profiles = DISCOVERY_CANDIDATES
            .iter()
            .map(|c| c.profile(host))
            .collect::<Result<Vec<_>>>()?;
        let host = profiles[0].host().to_string();

        tracing::info!(
            target: "discovery",
            "Starting auto-discovery for {} with user {} ({} candidates)",
            host,
            credentials.user(),
            profiles.len()
        );

        let mut attempts = Vec::with_capacity(profiles.len());
        let mut cancelled = false;

        for (index, profile) in profiles.iter().enumerate() {
            if !cancelled {
                cancelled = cancel.as_ref().is_some_and(|rx| *rx.borrow());
            }

            let outcome = if cancelled {
                AttemptOutcome::not_attempted(profile.clone(), "Discovery cancelled")
            } else {
                tracing::info!(target: "discovery", "Testing {}...", profile.label());
                let message = message_for(profile);
                let attempt = isolate(
                    profile,
                    self.verifier.attempt(profile, credentials, Some(&message)),
                );

                match cancel.as_mut() {
                    Some(rx) => {
                        tokio::select! {
                            outcome = attempt => outcome,
                            _ = wait_for_cancel(rx) => {
                                tracing::warn!(target: "discovery", "Cancelled during {}", profile.label());
                                cancelled = true;
                                AttemptOutcome::not_attempted(profile.clone(), "Discovery cancelled")
                            }
                        }
                    }
                    None => attempt.await,
                }
            };

            if outcome.is_success() {
                tracing::info!(target: "discovery", "{} - success", profile.label());
            } else if !cancelled {
                tracing::info!(
                    target: "discovery",
                    "{} - failed: {}",
                    profile.label(),
                    outcome.error_detail.as_deref().unwrap_or("unknown error")
                );
            }

            on_attempt(index, &outcome);
            attempts.push(outcome);
        }

        let report = DiscoveryReport::new(host, attempts, DISCOVERY_CANDIDATES.len());
        tracing::info!(
            target: "discovery",
            "Auto-discovery complete for {}: {}/{} working configuration(s)",
            report.host(),
            report.success_count(),
            report.total_attempted()
        );
        Ok(report)
    }
}

/// Resolves once the flag reads `true`. A dropped sender never cancels.
async fn wait_for_cancel(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_table_is_in_fixed_order() {
        let expected = [
            (587, EncryptionMode::StartTlsOrPlain, "STARTTLS (587)"),
            (465, EncryptionMode::ImplicitTls, "SSL/TLS (465)"),
            (25, EncryptionMode::StartTlsOrPlain, "STARTTLS (25)"),
            (2525, EncryptionMode::StartTlsOrPlain, "STARTTLS (2525)"),
            (25, EncryptionMode::Unencrypted, "Unencrypted (25)"),
            (587, EncryptionMode::Unencrypted, "Unencrypted (587)"),
            (2525, EncryptionMode::Unencrypted, "Unencrypted (2525)"),
        ];
        for (candidate, (port, mode, label)) in DISCOVERY_CANDIDATES.iter().zip(expected) {
            assert_eq!(candidate.port, port);
            assert_eq!(candidate.encryption, mode);
            assert_eq!(candidate.label, label);
        }
    }

    #[test]
    fn candidate_profiles_carry_fixed_timeouts() {
        let profile = DISCOVERY_CANDIDATES[1].profile("smtp.example.com").unwrap();
        assert_eq!(profile.label(), "SSL/TLS (465)");
        assert_eq!(
            profile.connect_timeout(),
            Some(std::time::Duration::from_millis(DISCOVERY_TIMEOUT_MS))
        );
        assert_eq!(profile.greeting_timeout(), profile.connect_timeout());
    }

    #[tokio::test]
    async fn wait_for_cancel_ignores_dropped_sender() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let waited = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            wait_for_cancel(&mut rx),
        )
        .await;
        assert!(waited.is_err());
    }
}

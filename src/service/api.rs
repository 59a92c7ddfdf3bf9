//! Request/response shapes of the two public operations and the handlers
//! that validate input, drive the core and project its results.
//!
//! The shapes are kept compatible with existing callers; fields marked
//! "additive" below are extensions that older callers simply ignore.

use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::{
    AttemptOutcome, AttemptStatus, ConnectionProfile, Credentials, DiscoveryReport,
    EncryptionMode, ErrorKind,
};
use crate::service::content::{discovery_message, single_test_message};
use crate::service::guidance::{guidance_for, Guidance};
use crate::utils::smtp::parse_mailbox;
use crate::verification::discovery::{Discovery, MessageFactory};
use crate::verification::verifier::{isolate, Verifier};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::process::Command;
use tokio::sync::watch;

/// Body of `POST /api/test-smtp`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SingleTestRequest {
    #[serde(default)]
    pub host: Option<String>,
    /// Number or numeric string.
    #[serde(default)]
    pub port: Option<Value>,
    /// `"true"`, `"false"`, `"none"` or a boolean.
    #[serde(default)]
    pub secure: Option<Value>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub pass: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

/// Body of `POST /api/auto-test-smtp`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AutoDiscoveryRequest {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub pass: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendDetails {
    pub message_id: String,
    pub response: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleTestResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<SendDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Additive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Additive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<Guidance>,
}

impl SingleTestResponse {
    pub fn from_outcome(outcome: &AttemptOutcome) -> Self {
        match outcome.status {
            AttemptStatus::VerifiedAndSent => Self {
                success: true,
                message: "Connection verified and email sent successfully!".to_string(),
                details: Some(SendDetails {
                    message_id: outcome.message_id.clone().unwrap_or_default(),
                    response: outcome.transport_response_line.clone().unwrap_or_default(),
                }),
                error: None,
                error_kind: None,
                guidance: None,
            },
            AttemptStatus::Verified => Self {
                success: true,
                message: "Connection verified successfully!".to_string(),
                details: None,
                error: None,
                error_kind: None,
                guidance: None,
            },
            AttemptStatus::Failed | AttemptStatus::NotAttempted => {
                let kind = outcome.error_kind.unwrap_or(ErrorKind::Other);
                Self {
                    success: false,
                    message: "SMTP Test Failed".to_string(),
                    details: None,
                    error: Some(
                        outcome
                            .error_detail
                            .clone()
                            .unwrap_or_else(|| "Unknown error occurred".to_string()),
                    ),
                    error_kind: Some(kind),
                    guidance: Some(guidance_for(kind)),
                }
            }
        }
    }

    /// Shape used for input that was rejected before any I/O.
    pub fn invalid(err: &AppError) -> Self {
        Self {
            success: false,
            message: "Invalid request".to_string(),
            details: None,
            error: Some(err.to_string()),
            error_kind: None,
            guidance: None,
        }
    }
}

/// One entry of the discovery `results` array.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResultItem {
    pub config: String,
    pub port: u16,
    /// True only for implicit TLS.
    pub secure: bool,
    /// `"success"`, `"failed"` or `"skipped"`.
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Additive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl From<&AttemptOutcome> for DiscoveryResultItem {
    fn from(outcome: &AttemptOutcome) -> Self {
        let status = match outcome.status {
            AttemptStatus::Verified | AttemptStatus::VerifiedAndSent => "success",
            AttemptStatus::Failed => "failed",
            AttemptStatus::NotAttempted => "skipped",
        };
        Self {
            config: outcome.profile.label().to_string(),
            port: outcome.profile.port(),
            secure: outcome.profile.encryption().is_implicit_tls(),
            status,
            message_id: outcome.message_id.clone(),
            error: outcome.error_detail.clone(),
            error_kind: outcome.error_kind,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoDiscoveryResponse {
    pub success: bool,
    pub message: String,
    pub total_tests: usize,
    pub successful_configs: usize,
    pub results: Vec<DiscoveryResultItem>,
}

impl From<&DiscoveryReport> for AutoDiscoveryResponse {
    fn from(report: &DiscoveryReport) -> Self {
        Self {
            success: true,
            message: format!(
                "Auto-discovery complete. Found {} working configuration(s).",
                report.success_count()
            ),
            total_tests: report.total_attempted(),
            successful_configs: report.success_count(),
            results: report.attempts().iter().map(DiscoveryResultItem::from).collect(),
        }
    }
}

/// Body of `GET /api/version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub hash: String,
    pub date: String,
    pub version: String,
}

impl VersionInfo {
    /// Reads the last commit from `git`; "Unknown" when unavailable.
    pub fn detect() -> Self {
        let git = |format: &str| -> Option<String> {
            let format_arg = format!("--format={}", format);
            let output = Command::new("git")
                .args(["log", "-1", format_arg.as_str()])
                .output()
                .ok()?;
            if !output.status.success() {
                return None;
            }
            let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
            (!value.is_empty()).then_some(value)
        };

        let hash = git("%h");
        let date = git("%cd");
        if hash.is_none() {
            tracing::warn!(target: "api", "Could not retrieve git info");
        }
        Self {
            hash: hash.unwrap_or_else(|| "Unknown".to_string()),
            date: date.unwrap_or_else(|| "Unknown".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

fn required(field: &str, value: Option<&str>) -> Result<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AppError::Validation(format!("Missing {}", field))),
    }
}

/// Accepts a JSON number or a numeric string in 1..=65535.
pub fn parse_port(value: Option<&Value>) -> Result<u16> {
    let invalid = |raw: &dyn std::fmt::Display| {
        AppError::Validation(format!("Invalid port '{}': expected 1-65535", raw))
    };
    let port = match value {
        None | Some(Value::Null) => return Err(AppError::Validation("Missing port".to_string())),
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| invalid(n))?,
        Some(Value::String(s)) => s.trim().parse::<u64>().map_err(|_| invalid(s))?,
        Some(other) => return Err(invalid(other)),
    };
    match u16::try_from(port) {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(invalid(&port)),
    }
}

/// Maps the `secure` flag to an encryption mode.
///
/// Unrecognized or missing values fall back to STARTTLS-or-plain.
pub fn parse_secure(value: Option<&Value>) -> EncryptionMode {
    match value {
        Some(Value::Bool(true)) => EncryptionMode::ImplicitTls,
        Some(Value::Bool(false)) => EncryptionMode::StartTlsOrPlain,
        Some(Value::String(s)) if s == "true" => EncryptionMode::ImplicitTls,
        Some(Value::String(s)) if s == "false" => EncryptionMode::StartTlsOrPlain,
        Some(Value::String(s)) if s == "none" => EncryptionMode::Unencrypted,
        other => {
            tracing::warn!(
                target: "api",
                "Unrecognized secure value {:?}, assuming STARTTLS",
                other
            );
            EncryptionMode::StartTlsOrPlain
        }
    }
}

/// Runs the single-test operation.
///
/// `Err` is returned only for malformed input, before any network I/O; SMTP
/// failures come back as a response with `success: false`.
pub async fn handle_single_test<V: Verifier + Sync>(
    verifier: &V,
    config: &Config,
    request: SingleTestRequest,
) -> Result<SingleTestResponse> {
    let host = required("host", request.host.as_deref())?;
    let port = parse_port(request.port.as_ref())?;
    let encryption = parse_secure(request.secure.as_ref());
    let to = required("recipient (to)", request.to.as_deref())?;

    let profile = ConnectionProfile::new(host, port, encryption)?.with_timeouts(
        config.single_connect_timeout_ms(),
        config.single_greeting_timeout_ms(),
    );
    let credentials = Credentials::new(
        request.user.unwrap_or_default(),
        request.pass.unwrap_or_default(),
    );
    let message = single_test_message(
        &profile,
        &credentials,
        request.from.as_deref().unwrap_or_default(),
        &to,
    );
    parse_mailbox("sender", &message.from)?;
    parse_mailbox("recipient", &message.to)?;

    tracing::info!(
        target: "api",
        "Attempting SMTP connection to {}:{} ({}) for {}",
        profile.host(),
        profile.port(),
        profile.encryption(),
        credentials.user()
    );

    let outcome = isolate(
        &profile,
        verifier.attempt(&profile, &credentials, Some(&message)),
    )
    .await;
    Ok(SingleTestResponse::from_outcome(&outcome))
}

/// Runs the auto-discovery operation. Always answers with the full report
/// unless the input itself is malformed.
///
/// `on_attempt` observes each outcome as soon as it is recorded.
pub async fn handle_auto_discovery<V, F>(
    discovery: &Discovery<V>,
    request: AutoDiscoveryRequest,
    cancel: Option<watch::Receiver<bool>>,
    on_attempt: F,
) -> Result<AutoDiscoveryResponse>
where
    V: Verifier + Sync,
    F: FnMut(usize, &AttemptOutcome),
{
    let host = required("host", request.host.as_deref())?;
    let to = required("recipient (to)", request.to.as_deref())?;
    let credentials = Credentials::new(
        request.user.unwrap_or_default(),
        request.pass.unwrap_or_default(),
    );
    let from = request.from.unwrap_or_default();

    let sender = if from.trim().is_empty() {
        credentials.user().to_string()
    } else {
        from.clone()
    };
    parse_mailbox("sender", &sender)?;
    parse_mailbox("recipient", &to)?;

    let factory = |profile: &ConnectionProfile| discovery_message(profile, &credentials, &from, &to);
    let message_for: &MessageFactory<'_> = &factory;
    let report = discovery
        .run_with(&host, &credentials, message_for, cancel, on_attempt)
        .await?;
    Ok(AutoDiscoveryResponse::from(&report))
}

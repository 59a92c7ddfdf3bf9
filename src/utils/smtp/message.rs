//! Builds the lettre message for a test send.

use crate::core::error::{AppError, Result};
use crate::core::models::MessageSpec;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::Message;
use rand::Rng;

/// Parses a mailbox (`addr@example.com` or `Name <addr@example.com>`).
pub fn parse_mailbox(field: &str, value: &str) -> Result<Mailbox> {
    value
        .trim()
        .parse::<Mailbox>()
        .map_err(|e| AppError::Validation(format!("Invalid {} address '{}': {}", field, value, e)))
}

/// Generates a unique `Message-ID` value scoped to the sender's domain.
pub fn generate_message_id(from: &str) -> String {
    let domain = from
        .rsplit_once('@')
        .map(|(_, d)| d.trim_end_matches('>').trim())
        .filter(|d| !d.is_empty())
        .unwrap_or("localhost");
    let nonce: u64 = rand::thread_rng().gen();
    format!(
        "<{}.{:016x}@{}>",
        chrono::Utc::now().timestamp_millis(),
        nonce,
        domain
    )
}

/// Builds a plain-text message carrying the given `Message-ID`.
pub fn build_message(spec: &MessageSpec, message_id: &str) -> Result<Message> {
    let from = parse_mailbox("sender", &spec.from)?;
    let to = parse_mailbox("recipient", &spec.to)?;

    Message::builder()
        .message_id(Some(message_id.to_string()))
        .from(from)
        .to(to)
        .subject(spec.subject.clone())
        .date_now()
        .header(ContentType::TEXT_PLAIN)
        .body(spec.body.clone())
        .map_err(|e| AppError::Validation(format!("Could not build test message: {}", e)))
}

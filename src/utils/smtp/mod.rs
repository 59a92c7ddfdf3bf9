//! SMTP helpers shared by the verifier: failure classification, test
//! message construction and the implicit-TLS client.

pub mod message;
pub mod result;
pub mod tls;

pub use message::{build_message, generate_message_id, parse_mailbox};
pub use result::{AttemptFailure, AttemptPhase};
pub use tls::{client_config, TlsTransport};

//! SMTP verification: the single-attempt verifier and the discovery
//! orchestrator built on top of it.

pub mod discovery;
pub mod verifier;

pub use discovery::{Candidate, Discovery, DISCOVERY_CANDIDATES, DISCOVERY_TIMEOUT_MS};
pub use verifier::{isolate, SmtpVerifier, Verifier};

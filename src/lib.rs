//! Core library for smtp-probe.
//!
//! Verifies SMTP submission credentials against one connection profile, and
//! auto-discovers which of a fixed set of port/encryption combinations a
//! server accepts.
//!
//! ```no_run
//! use smtp_probe_core::{Config, Credentials, Discovery, MessageSpec, SmtpVerifier};
//!
//! # async fn run() -> smtp_probe_core::Result<()> {
//! let config = Config::default();
//! let discovery = Discovery::new(SmtpVerifier::new(&config));
//! let credentials = Credentials::new("user@example.com", "secret");
//! let message = MessageSpec::new("", "me@example.com", "Hello", "Hello", &credentials);
//!
//! let report = discovery.run("smtp.example.com", &credentials, &message).await?;
//! println!("{}/{} working", report.success_count(), report.total_attempted());
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod service;
pub mod utils;
pub mod verification;

pub use crate::core::config::{Config, ConfigBuilder};
pub use crate::core::error::{AppError, Result};
pub use crate::core::models::{
    AttemptOutcome, AttemptStatus, ConnectionProfile, Credentials, DiscoveryReport,
    EncryptionMode, ErrorKind, MessageSpec,
};
pub use crate::verification::{Discovery, SmtpVerifier, Verifier, DISCOVERY_CANDIDATES};

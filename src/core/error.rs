//! Defines the custom error types for the smtp-probe application.
//!
//! Note that SMTP-level failures during an attempt are *not* represented here:
//! those are classified into [`ErrorKind`](crate::core::models::ErrorKind) and
//! recorded inside an attempt outcome so that one bad attempt never aborts
//! the caller.

use std::io;
use thiserror::Error;

/// The primary error type for configuration, input and service plumbing.
#[derive(Error, Debug)]
pub enum AppError {
    /// Error occurring during configuration loading or validation.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// Error initializing necessary components (e.g., listeners, subscribers).
    #[error("Initialization Error: {0}")]
    Initialization(String),

    /// Error related to file input/output operations.
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    /// Error during JSON serialization or deserialization.
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error parsing the TOML configuration file.
    #[error("TOML Parsing Error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Malformed caller input, rejected before any network I/O.
    #[error("Invalid Input: {0}")]
    Validation(String),

    /// Error raised while running the HTTP service.
    #[error("Server Error: {0}")]
    Server(String),

    /// An underlying error that doesn't fit other categories, using anyhow.
    #[error("Generic Error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl AppError {
    /// Returns true if this error stems from caller input rather than the environment.
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

//! Defines the core runtime `Config` struct, its defaults, and related utilities.
//! Submodules handle loading, building, and validation.

pub(crate) mod builder;
pub(crate) mod file;
pub(crate) mod loading;
pub(crate) mod validation;

pub use builder::ConfigBuilder;
pub use file::ConfigFile;
pub use loading::{find_config_file, load_config_builder};

use std::time::Duration;

/// Default EHLO name announced to servers.
pub const DEFAULT_HELLO_NAME: &str = "localhost";
/// Default HTTP port for `serve`.
pub const DEFAULT_SERVER_PORT: u16 = 3000;

/// Runtime configuration settings used by the smtp-probe core logic.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Name sent with EHLO.
    pub hello_name: String,
    /// Skip certificate validation during TLS negotiation. Defaults to `true`
    /// because the tool diagnoses arbitrary and test servers.
    pub accept_invalid_certs: bool,
    /// Bound on each command after the greeting: STARTTLS, AUTH, submission and QUIT.
    pub command_timeout: Duration,

    /// Connect bound for the single-test path. Unset means unbounded.
    pub single_connect_timeout: Option<Duration>,
    /// Greeting bound for the single-test path. Unset means unbounded.
    pub single_greeting_timeout: Option<Duration>,

    /// Interface the HTTP server listens on.
    pub bind_address: String,
    /// Port the HTTP server listens on.
    pub server_port: u16,

    /// Path of the config file that was applied, if any.
    pub loaded_config_path: Option<String>,
}

impl Config {
    fn build_default() -> Self {
        Config {
            hello_name: DEFAULT_HELLO_NAME.to_string(),
            accept_invalid_certs: true,
            command_timeout: Duration::from_secs(60),
            single_connect_timeout: None,
            single_greeting_timeout: None,
            bind_address: "0.0.0.0".to_string(),
            server_port: DEFAULT_SERVER_PORT,
            loaded_config_path: None,
        }
    }

    /// Single-test connect bound in milliseconds, as stored on a profile.
    pub fn single_connect_timeout_ms(&self) -> Option<u64> {
        self.single_connect_timeout.map(|d| d.as_millis() as u64)
    }

    pub fn single_greeting_timeout_ms(&self) -> Option<u64> {
        self.single_greeting_timeout.map(|d| d.as_millis() as u64)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::build_default()
    }
}

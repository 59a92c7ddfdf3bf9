//! Command-line argument definitions.

use clap::{Args, Parser, Subcommand, ValueEnum};
use smtp_probe_core::utils::logging::LogFormat;

#[derive(Parser, Debug)]
#[command(
    name = "smtp-probe",
    version,
    about = "Verify SMTP credentials and discover working port/encryption combinations"
)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Test one host/port/encryption combination and send a test email.
    Test(TestArgs),
    /// Try every known port/encryption combination against one host.
    Discover(DiscoverArgs),
    /// Serve the HTTP API.
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CredentialArgs {
    /// SMTP username. Leave empty to skip authentication.
    #[arg(short, long, env = "SMTP_USER", default_value = "")]
    pub user: String,

    /// SMTP password.
    #[arg(short, long, env = "SMTP_PASS", default_value = "", hide_env_values = true)]
    pub pass: String,

    /// Sender address; defaults to the username.
    #[arg(long, default_value = "")]
    pub from: String,
}

#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Validate server certificates instead of accepting any.
    #[arg(long)]
    pub strict_tls: bool,

    /// EHLO name announced to the server.
    #[arg(long)]
    pub hello_name: Option<String>,

    /// Bound on each SMTP command after the greeting, in milliseconds.
    #[arg(long)]
    pub command_timeout_ms: Option<u64>,
}

#[derive(Args, Debug)]
pub struct TestArgs {
    #[arg(long)]
    pub host: String,

    #[arg(long, default_value = "587")]
    pub port: String,

    /// Encryption: true (SSL/TLS), false (STARTTLS when offered) or none.
    #[arg(long, default_value = "false")]
    pub secure: String,

    #[command(flatten)]
    pub credentials: CredentialArgs,

    /// Recipient of the test email. Required unless --no-send.
    #[arg(long)]
    pub to: Option<String>,

    /// Only verify connection and authentication.
    #[arg(long)]
    pub no_send: bool,

    #[arg(long)]
    pub connect_timeout_ms: Option<u64>,

    #[arg(long)]
    pub greeting_timeout_ms: Option<u64>,

    #[command(flatten)]
    pub session: SessionArgs,

    /// Print the JSON response instead of a summary.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    #[arg(long)]
    pub host: String,

    #[command(flatten)]
    pub credentials: CredentialArgs,

    /// Recipient of the test emails sent for each working combination.
    #[arg(long)]
    pub to: String,

    #[command(flatten)]
    pub session: SessionArgs,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    #[arg(long)]
    pub bind: Option<String>,

    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

mod cli;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands, CredentialArgs, DiscoverArgs, ServeArgs, SessionArgs, TestArgs};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use smtp_probe_core::core::config::load_config_builder;
use smtp_probe_core::service::api::{
    handle_auto_discovery, handle_single_test, parse_port, parse_secure, AutoDiscoveryRequest,
    AutoDiscoveryResponse, SingleTestRequest, SingleTestResponse,
};
use smtp_probe_core::service::server::{serve, AppState};
use smtp_probe_core::utils::logging::init_logging;
use smtp_probe_core::verification::isolate;
use smtp_probe_core::{
    AttemptOutcome, ConfigBuilder, ConnectionProfile, Credentials, Discovery, SmtpVerifier,
    Verifier, DISCOVERY_CANDIDATES,
};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format.into())?;

    let builder = load_config_builder(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Test(args) => run_test(builder, args).await,
        Commands::Discover(args) => run_discover(builder, args).await,
        Commands::Serve(args) => run_serve(builder, args).await,
    }
}

fn apply_session_args(builder: ConfigBuilder, session: &SessionArgs) -> ConfigBuilder {
    builder
        .accept_invalid_certs(session.strict_tls.then_some(false))
        .hello_name(session.hello_name.clone())
        .command_timeout_ms(session.command_timeout_ms)
}

fn credentials_of(args: &CredentialArgs) -> Credentials {
    Credentials::new(args.user.clone(), args.pass.clone())
}

async fn run_test(builder: ConfigBuilder, args: TestArgs) -> anyhow::Result<ExitCode> {
    let config = apply_session_args(builder, &args.session)
        .connect_timeout_ms(args.connect_timeout_ms)
        .greeting_timeout_ms(args.greeting_timeout_ms)
        .build()?;
    let verifier = SmtpVerifier::new(&config);

    let response = if args.no_send {
        let port = parse_port(Some(&Value::String(args.port.clone())))?;
        let encryption = parse_secure(Some(&Value::String(args.secure.clone())));
        let profile = ConnectionProfile::new(args.host.as_str(), port, encryption)?
            .with_timeouts(
                config.single_connect_timeout_ms(),
                config.single_greeting_timeout_ms(),
            );
        let credentials = credentials_of(&args.credentials);
        let outcome = isolate(&profile, verifier.attempt(&profile, &credentials, None)).await;
        SingleTestResponse::from_outcome(&outcome)
    } else {
        let request = SingleTestRequest {
            host: Some(args.host.clone()),
            port: Some(Value::String(args.port.clone())),
            secure: Some(Value::String(args.secure.clone())),
            user: Some(args.credentials.user.clone()),
            pass: Some(args.credentials.pass.clone()),
            from: Some(args.credentials.from.clone()),
            to: args.to.clone(),
        };
        handle_single_test(&verifier, &config, request).await?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_single(&response);
    }
    Ok(if response.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_single(response: &SingleTestResponse) {
    if response.success {
        println!("[OK] {}", response.message);
        if let Some(ref details) = response.details {
            println!("  Message-ID: {}", details.message_id);
            println!("  Response:   {}", details.response);
        }
        return;
    }

    println!("[FAILED] {}", response.message);
    if let Some(ref error) = response.error {
        println!("  Error: {}", error);
    }
    if let Some(guidance) = response.guidance {
        println!();
        println!("{}:", guidance.title);
        for tip in guidance.tips {
            println!("  - {}", tip);
        }
    }
}

fn outcome_marker(outcome: &AttemptOutcome) -> &'static str {
    if outcome.is_success() {
        "[OK]    "
    } else if outcome.error_kind.is_some() {
        "[FAILED]"
    } else {
        "[SKIPPED]"
    }
}

async fn run_discover(builder: ConfigBuilder, args: DiscoverArgs) -> anyhow::Result<ExitCode> {
    let config = apply_session_args(builder, &args.session).build()?;
    let discovery = Discovery::new(SmtpVerifier::new(&config));

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling discovery");
            let _ = cancel_tx.send(true);
        }
    });

    let progress = if args.json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(DISCOVERY_CANDIDATES.len() as u64)
    };
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    progress.enable_steady_tick(Duration::from_millis(120));
    progress.set_message(format!("Testing {}", DISCOVERY_CANDIDATES[0].label));

    let request = AutoDiscoveryRequest {
        host: Some(args.host.clone()),
        user: Some(args.credentials.user.clone()),
        pass: Some(args.credentials.pass.clone()),
        from: Some(args.credentials.from.clone()),
        to: Some(args.to.clone()),
    };
    let response = handle_auto_discovery(&discovery, request, Some(cancel_rx), |index, outcome| {
        progress.inc(1);
        if let Some(next) = DISCOVERY_CANDIDATES.get(index + 1) {
            progress.set_message(format!("Testing {}", next.label));
        }
        progress.println(format!("{} {}", outcome_marker(outcome), outcome.profile.label()));
    })
    .await?;
    progress.finish_and_clear();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_discovery(&response);
    }
    Ok(if response.successful_configs > 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_discovery(response: &AutoDiscoveryResponse) {
    println!("{}", response.message);
    println!();
    for item in &response.results {
        let detail = item
            .message_id
            .as_deref()
            .or(item.error.as_deref())
            .unwrap_or("");
        println!("  {:<20} {:<8} {}", item.config, item.status, detail);
    }
}

async fn run_serve(builder: ConfigBuilder, args: ServeArgs) -> anyhow::Result<ExitCode> {
    let config = apply_session_args(builder, &args.session)
        .server_port(args.port)
        .bind_address(args.bind.clone())
        .build()?;
    let verifier = SmtpVerifier::new(&config);
    let state = Arc::new(AppState::new(config, verifier));
    serve(state).await?;
    Ok(ExitCode::SUCCESS)
}

//! Warden authorization server
//!
//! # Usage
//!
//! ```bash
//! # Start with default settings (0.0.0.0:8080, ./policies.yaml)
//! warden-server
//!
//! # Several policy files, custom host and port
//! warden-server --policies svc1.yaml,svc2.yaml --host 127.0.0.1 --port 9090
//!
//! # Enable debug logging
//! RUST_LOG=debug warden-server
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Logging level (trace, debug, info, warn, error)
//! - `WARDEN_HOST`: Server host (default: 0.0.0.0)
//! - `WARDEN_PORT`: Server port (default: 8080)
//! - `WARDEN_POLICIES`: Comma-separated policy files (default: policies.yaml)
//! - `WARDEN_JSON_LOGS`: Enable JSON logging
//! - `WARDEN_TRUST_FORWARDED_FOR`: Take the client address from `X-Forwarded-For`

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warden_api_server::{server::ServerBuilder, state::AppState};
use warden_authz::{AuthzEngine, PolicySource};

/// Warden authorization server
#[derive(Parser, Debug)]
#[command(
    name = "warden-server",
    version,
    about = "Policy-based authorization service",
    long_about = None
)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "WARDEN_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short = 'p', long, default_value = "8080", env = "WARDEN_PORT")]
    port: u16,

    /// Policy files, one audience each
    #[arg(
        long,
        default_value = "policies.yaml",
        env = "WARDEN_POLICIES",
        value_delimiter = ','
    )]
    policies: Vec<PathBuf>,

    /// Take the client address from X-Forwarded-For; only behind a trusted proxy
    #[arg(long, env = "WARDEN_TRUST_FORWARDED_FOR")]
    trust_forwarded_for: bool,

    /// Enable JSON logging format
    #[arg(long, env = "WARDEN_JSON_LOGS")]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info", env = "RUST_LOG")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args)?;

    info!("Starting warden {}", env!("CARGO_PKG_VERSION"));

    let sources: Vec<PolicySource> = args.policies.iter().map(PolicySource::file).collect();
    let state = AppState::new(Arc::new(AuthzEngine::default()), sources)
        .with_trusted_forwarding(args.trust_forwarded_for);
    state.reload().await.context("Failed to load policies")?;
    info!(audiences = ?state.engine.registry().audiences(), "Policies loaded");

    let server = ServerBuilder::new()
        .host(&args.host)
        .port(args.port)
        .state(Arc::new(state))
        .build()?;

    if let Err(e) = server.run().await {
        error!("Server error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Initialize tracing/logging subsystem
fn init_tracing(args: &Args) -> Result<()> {
    let log_level = args.log_level.parse::<tracing::Level>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', using 'info'", args.log_level);
        tracing::Level::INFO
    });

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let http = if log_level <= tracing::Level::DEBUG { "debug" } else { "info" };
        format!(
            "warden_server={lvl},warden_api_server={lvl},warden_authz={lvl},warden::audit=info,tower_http={http}",
            lvl = log_level
        )
        .into()
    });

    if args.json_logs {
        // JSON structured logging for production
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()?;
    }

    Ok(())
}

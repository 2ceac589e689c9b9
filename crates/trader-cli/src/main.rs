//! # trader CLI entry point
//!
//! Parses arguments, installs logging, builds the client from config and
//! credential files, and dispatches to the subcommand handler.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use trader_cli::commands::{self, Command};
use trader_cli::config::CliConfig;
use trader_client::Trader;

/// Client for a paired remote trading service.
///
/// Keeps a certificate-pinned connection to one paired peer, reports its
/// market data and connectivity, and submits transfers with idempotent retry.
#[derive(Parser, Debug)]
#[command(name = "trader", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Path to a YAML configuration file. Falls back to TRADER_* variables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// PEM client certificate. Overrides the configured path.
    #[arg(long, global = true, requires = "key")]
    cert: Option<PathBuf>,

    /// PEM client private key. Overrides the configured path.
    #[arg(long, global = true, requires = "cert")]
    key: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn init_tracing(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let config = CliConfig::load(cli.config.as_deref())?.with_credential_overrides(cli.cert, cli.key)?;
    let credentials = config.load_credentials()?;
    let trader = Trader::new(config.trader, credentials).context("failed to build client")?;

    let interrupt = CancellationToken::new();
    let on_signal = interrupt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted");
            on_signal.cancel();
        }
    });

    let code = commands::run(&trader, cli.command, interrupt).await;
    trader.shutdown();
    code
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "trader CLI starting");

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

//! Subcommand arguments and handlers.
//!
//! Every handler pairs with the peer named on the command line, runs one
//! operation and returns the process exit code.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use trader_client::{SubmitError, Trader, TraderEvent};
use trader_core::{Fingerprint, PairingSession, TransferRequest};

/// Identity of the paired remote.
#[derive(Args, Debug, Clone)]
pub struct PairingArgs {
    /// Host name or IP address of the paired remote.
    #[arg(long)]
    pub host: String,

    /// Port of the paired remote.
    #[arg(long, default_value_t = 3000)]
    pub port: u16,

    /// SHA-256 fingerprint of the remote's certificate (hex, `:` optional).
    #[arg(long)]
    pub fingerprint: Fingerprint,
}

impl PairingArgs {
    pub fn session(&self) -> PairingSession {
        PairingSession::new(self.host.clone(), self.port, self.fingerprint)
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Poll the remote and print connectivity and market events as JSON lines.
    Poll {
        #[command(flatten)]
        pairing: PairingArgs,

        /// Exit after this many events. Runs until interrupted if unset.
        #[arg(long)]
        count: Option<usize>,
    },

    /// Submit a transfer, retrying until it settles or the send timeout passes.
    Send {
        #[command(flatten)]
        pairing: PairingArgs,

        /// Destination address.
        #[arg(long)]
        to: String,

        /// Amount in the asset's smallest unit.
        #[arg(long)]
        satoshis: u64,

        /// Fiat currency code.
        #[arg(long, default_value = "EUR")]
        currency: String,

        /// Fiat amount paid for the transfer.
        #[arg(long)]
        fiat: Decimal,
    },

    /// Report an operational event.
    Event {
        #[command(flatten)]
        pairing: PairingArgs,

        /// Event type, e.g. `doorOpened`.
        #[arg(long = "type")]
        event_type: String,

        /// Free-form note.
        #[arg(long, default_value = "")]
        note: String,
    },

    /// Submit an identity record (JSON file) and print the remote's answer.
    VerifyUser {
        #[command(flatten)]
        pairing: PairingArgs,

        /// JSON file holding the identity record.
        #[arg(long)]
        file: PathBuf,
    },
}

/// Execute `command` against `trader`. `interrupt` fires on Ctrl-C.
pub async fn run(trader: &Trader, command: Command, interrupt: CancellationToken) -> Result<u8> {
    match command {
        Command::Poll { pairing, count } => {
            trader.pair(pairing.session());
            run_poll(trader, count, interrupt).await
        }
        Command::Send {
            pairing,
            to,
            satoshis,
            currency,
            fiat,
        } => {
            trader.pair(pairing.session());
            let transfer = TransferRequest::new(to, satoshis, currency, fiat);
            run_send(trader, &transfer, &interrupt).await
        }
        Command::Event {
            pairing,
            event_type,
            note,
        } => {
            trader.pair(pairing.session());
            trader
                .report_event(event_type, note)
                .await
                .context("event report task failed")?;
            Ok(0)
        }
        Command::VerifyUser { pairing, file } => {
            trader.pair(pairing.session());
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let identity: serde_json::Value = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not valid JSON", file.display()))?;
            let answer = trader
                .verify_user(&identity)
                .await
                .context("identity verification failed")?;
            println!("{}", serde_json::to_string_pretty(&answer)?);
            Ok(0)
        }
    }
}

async fn run_poll(trader: &Trader, count: Option<usize>, interrupt: CancellationToken) -> Result<u8> {
    let mut events = trader.subscribe();
    let poller = trader.start_polling()?;
    let mut seen = 0usize;

    let code = loop {
        let event = tokio::select! {
            _ = interrupt.cancelled() => break 0,
            event = events.recv() => event,
        };
        match event {
            Ok(event) => {
                println!("{}", describe(&event));
                seen += 1;
                if matches!(event, TraderEvent::PairingLost) {
                    break 2;
                }
                if count.is_some_and(|limit| seen >= limit) {
                    break 0;
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "event output fell behind");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break 1,
        }
    };

    poller.shutdown().await;
    Ok(code)
}

async fn run_send(
    trader: &Trader,
    transfer: &TransferRequest,
    interrupt: &CancellationToken,
) -> Result<u8> {
    match trader.send_transfer(transfer, interrupt).await {
        Ok(tx_hash) => {
            println!("{tx_hash}");
            Ok(0)
        }
        Err(SubmitError::Rejected(e)) if e.is_insufficient_funds() => {
            tracing::error!(tx_id = %transfer.tx_id, "insufficient funds");
            Ok(3)
        }
        Err(e) => Err(e).with_context(|| format!("transfer {} failed", transfer.tx_id)),
    }
}

/// JSON line for one event.
pub fn describe(event: &TraderEvent) -> serde_json::Value {
    match event {
        TraderEvent::ConnectivityUp => serde_json::json!({"event": "connectivityUp"}),
        TraderEvent::ConnectivityDown => serde_json::json!({"event": "connectivityDown"}),
        TraderEvent::PairingLost => serde_json::json!({"event": "pairingLost"}),
        TraderEvent::MarketDataUpdated(snapshot) => serde_json::json!({
            "event": "marketDataUpdated",
            "snapshot": snapshot,
        }),
    }
}

//! # trader-cli: Command-Line Front End
//!
//! Wires configuration and credential files into a [`trader_client::Trader`]
//! and exposes its operations as subcommands.
//!
//! ## Subcommands
//!
//! - `poll`: run the health poller and print events as JSON lines
//! - `send`: submit a transfer with idempotent retry
//! - `event`: report an operational event
//! - `verify-user`: submit an identity record and print the answer
//!
//! ## Crate Policy
//!
//! - Argument parsing lives here; behavior lives in `trader-client`.
//! - Errors are `anyhow` with context; library errors keep their types.

pub mod commands;
pub mod config;

//! # trader-core: Foundational Types for the Paired Trader Client
//!
//! Leaf crate of the workspace. Defines the data model shared by the
//! transport, polling and submission layers in `trader-client`:
//!
//! - [`PairingSession`] and [`Fingerprint`]: the trust anchor established
//!   at pairing time.
//! - [`MarketSnapshot`]: exchange rate, balance and limits reported by the
//!   remote peer, always replaced as a whole.
//! - [`HealthDetector`]: the UP / SUSPECT / DOWN state machine that turns a
//!   sequence of poll outcomes into connectivity signals.
//! - [`ClassifiedError`]: the error taxonomy every component uses to decide
//!   between retry, abort and surfacing.
//! - Outbound records: [`TransferRequest`], [`EventReport`], [`TradeRecord`].
//!
//! ## Crate Policy
//!
//! - No I/O and no async runtime. Time is always passed in by the caller.
//! - No `unsafe` code.
//! - No `.unwrap()` outside tests.

pub mod error;
pub mod health;
pub mod market;
pub mod pairing;
pub mod records;

pub use error::{ClassifiedError, ErrorKind, INSUFFICIENT_FUNDS};
pub use health::{HealthDetector, HealthSignal, HealthState, PollObservation};
pub use market::MarketSnapshot;
pub use pairing::{Fingerprint, FingerprintError, PairingSession};
pub use records::{EventReport, TradeRecord, TransferRequest, TransferResult};

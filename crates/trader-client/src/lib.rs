//! # trader-client: Resilient Client for a Paired Trading Service
//!
//! Talks to a single paired remote over HTTPS with certificate fingerprint
//! pinning, keeps a live view of the remote's market data and connectivity,
//! and submits money-moving calls with idempotent retry.
//!
//! ## Layers
//!
//! - [`exchange`]: the raw HTTP round trip ([`ReqwestExchange`]).
//! - [`transport`]: one request with the pin enforced ([`PinnedTransport`]).
//! - [`request`]: pairing-aware calls mapped onto
//!   [`ClassifiedError`](trader_core::ClassifiedError) ([`RequestClient`]).
//! - [`poller`]: periodic `GET /poll` feeding the health detector and the
//!   [`EventBus`] ([`NetworkHealthPoller`]).
//! - [`retry`]: deadline-bounded resubmission ([`IdempotentRetrySender`]).
//!
//! [`Trader`] wires these together around one [`SharedState`].
//!
//! ## Example
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use trader_client::{ClientCredentials, Trader, TraderConfig};
//! use trader_core::{Fingerprint, PairingSession};
//!
//! let config = TraderConfig::from_env()?;
//! let creds = ClientCredentials::new(std::fs::read("client.pem")?, std::fs::read("client.key")?);
//! let trader = Trader::new(config, Some(creds))?;
//!
//! let fingerprint: Fingerprint = "AB:CD:...".parse()?;
//! trader.pair(PairingSession::new("10.0.0.7", 3000, fingerprint));
//! let poller = trader.start_polling()?;
//! # poller.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod events;
pub mod exchange;
pub mod poller;
pub mod request;
pub mod retry;
pub mod state;
pub mod transport;

use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::Method;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use trader_core::{
    ClassifiedError, EventReport, HealthState, MarketSnapshot, PairingSession, TradeRecord,
    TransferRequest,
};

pub use config::{ClientCredentials, ConfigError, Protocol, Settings, TraderConfig};
pub use events::{EventBus, TraderEvent};
pub use exchange::{ExchangeError, ExchangeRequest, HttpExchange, RawResponse, ReqwestExchange};
pub use poller::{NetworkHealthPoller, PollTick, PollerError, PollerHandle};
pub use request::{paths, RequestClient};
pub use retry::{IdempotentRetrySender, RetryPolicy, SubmitError};
pub use state::{SharedState, StalePoll, StateView};
pub use transport::{PinnedTransport, TransportResponse};

/// Client for one paired remote.
///
/// Cheap to clone; clones share state, event bus and background tasks.
#[derive(Debug, Clone)]
pub struct Trader {
    config: TraderConfig,
    client: RequestClient,
    events: EventBus,
    background: CancellationToken,
    /// Stop token of the poller started by `start_polling`, if any.
    active_poller: Arc<Mutex<Option<CancellationToken>>>,
}

impl Trader {
    /// Build a client on the reqwest backend.
    pub fn new(
        config: TraderConfig,
        credentials: Option<ClientCredentials>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let exchange = ReqwestExchange::new(&config, credentials.as_ref())?;
        Ok(Self::with_exchange(config, Arc::new(exchange)))
    }

    /// Build a client on a caller-supplied exchange.
    pub fn with_exchange(config: TraderConfig, exchange: Arc<dyn HttpExchange>) -> Self {
        let transport = PinnedTransport::new(exchange, config.protocol);
        let state = SharedState::new(config.settings.poll_timeout());
        Self {
            client: RequestClient::new(transport, state),
            events: EventBus::new(),
            background: CancellationToken::new(),
            active_poller: Arc::new(Mutex::new(None)),
            config,
        }
    }

    pub fn config(&self) -> &TraderConfig {
        &self.config
    }

    pub fn request_client(&self) -> &RequestClient {
        &self.client
    }

    fn state(&self) -> &SharedState {
        self.client.state()
    }

    /// Install a pairing. Requests go to this peer from now on.
    pub fn pair(&self, session: PairingSession) {
        tracing::info!(host = %session.host, port = session.port, fingerprint = %session.fingerprint, "paired");
        self.state().pair(session);
    }

    /// Forget the current pairing.
    pub fn unpair(&self) -> Option<PairingSession> {
        let previous = self.state().unpair();
        if previous.is_some() {
            tracing::info!("unpaired");
        }
        previous
    }

    pub fn is_paired(&self) -> bool {
        self.state().is_paired()
    }

    pub fn session(&self) -> Option<PairingSession> {
        self.state().session()
    }

    pub fn market_snapshot(&self) -> Option<MarketSnapshot> {
        self.state().market()
    }

    pub fn health(&self) -> HealthState {
        self.state().health()
    }

    /// Session, market data and health read together.
    pub fn view(&self) -> StateView {
        self.state().view()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TraderEvent> {
        self.events.subscribe()
    }

    /// A poller bound to this client's state and event bus.
    pub fn poller(&self) -> NetworkHealthPoller {
        NetworkHealthPoller::new(
            self.client.clone(),
            self.events.clone(),
            self.config.settings.poll_interval(),
        )
    }

    /// Spawn the poller on the current runtime.
    ///
    /// One poller per client: fails while a handle from an earlier call is
    /// still live. Stopping or dropping that handle frees the slot.
    pub fn start_polling(&self) -> Result<PollerHandle, PollerError> {
        let mut active = self.active_poller.lock();
        if active.as_ref().is_some_and(|token| !token.is_cancelled()) {
            return Err(PollerError::AlreadyRunning);
        }
        let handle = self.poller().spawn();
        *active = Some(handle.cancel_token());
        Ok(handle)
    }

    fn sender(&self) -> IdempotentRetrySender {
        IdempotentRetrySender::new(self.client.clone(), self.config.settings.retry_interval())
    }

    /// Submit a transfer, retrying until the configured send timeout.
    pub async fn send_transfer(
        &self,
        transfer: &TransferRequest,
        cancel: &CancellationToken,
    ) -> Result<String, SubmitError> {
        self.sender()
            .submit(transfer, self.config.settings.send_timeout(), cancel)
            .await
    }

    /// Ask the remote to verify an identity record; its answer is returned
    /// unchanged.
    pub async fn verify_user(
        &self,
        identity: &serde_json::Value,
    ) -> Result<serde_json::Value, ClassifiedError> {
        self.client
            .call(Method::POST, paths::VERIFY_USER, Some(identity))
            .await
    }

    /// Report a transaction for verification. Fire-and-forget.
    pub fn verify_transaction(&self, record: serde_json::Value) -> JoinHandle<()> {
        self.fire_and_forget(paths::VERIFY_TRANSACTION, record)
    }

    /// Report an operational event. Fire-and-forget.
    pub fn report_event(
        &self,
        event_type: impl Into<String>,
        note: impl Into<String>,
    ) -> JoinHandle<()> {
        let report = EventReport::new(event_type, note);
        match serde_json::to_value(&report) {
            Ok(body) => self.fire_and_forget(paths::EVENT, body),
            Err(e) => {
                tracing::error!(error = %e, "failed to encode event report");
                tokio::spawn(async {})
            }
        }
    }

    /// Report a completed trade in the background, retrying until the send
    /// timeout. Outcomes are logged only.
    pub fn trade(&self, record: TradeRecord) -> JoinHandle<()> {
        let client = self.client.clone();
        let policy = RetryPolicy::new(
            self.config.settings.retry_interval(),
            self.config.settings.send_timeout(),
        );
        let cancel = self.background.child_token();

        tokio::spawn(async move {
            let trade_id = record.trade_id;
            let outcome = policy
                .run(&cancel, || {
                    client.call_with::<_, serde_json::Value>(Method::POST, paths::TRADE, &record)
                })
                .await;
            match outcome {
                Ok(_) => tracing::info!(%trade_id, "trade recorded"),
                Err(e) => tracing::error!(%trade_id, error = %e, "trade not recorded"),
            }
        })
    }

    fn fire_and_forget(&self, path: &'static str, body: serde_json::Value) -> JoinHandle<()> {
        let client = self.client.clone();
        let cancel = self.background.child_token();

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                result = client.call::<serde_json::Value>(Method::POST, path, Some(&body)) => result,
            };
            if let Err(e) = result {
                tracing::error!(path, error = %e, "background report failed");
            }
        })
    }

    /// Abandon background reports still in flight or waiting to retry.
    pub fn shutdown(&self) {
        self.background.cancel();
    }
}

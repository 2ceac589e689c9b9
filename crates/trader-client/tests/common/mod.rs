//! Scripted [`HttpExchange`] shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};
use trader_client::{
    ExchangeError, ExchangeRequest, HttpExchange, Protocol, RawResponse, Settings, Trader,
    TraderConfig,
};
use trader_core::{Fingerprint, PairingSession};

pub const SERVER_CERT: &[u8] = b"paired-server-certificate";

/// Replays queued outcomes in order; the last one repeats forever.
pub struct ScriptedExchange {
    script: Mutex<VecDeque<Result<RawResponse, ExchangeError>>>,
    requests: Mutex<Vec<String>>,
    bodies: Mutex<Vec<Option<serde_json::Value>>>,
}

impl ScriptedExchange {
    pub fn new(script: Vec<Result<RawResponse, ExchangeError>>) -> Arc<Self> {
        assert!(!script.is_empty(), "script needs at least one outcome");
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            bodies: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    pub fn bodies(&self) -> Vec<Option<serde_json::Value>> {
        self.bodies.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl HttpExchange for ScriptedExchange {
    async fn exchange(&self, request: ExchangeRequest<'_>) -> Result<RawResponse, ExchangeError> {
        self.requests
            .lock()
            .push(format!("{} {}", request.method, request.url.path()));
        self.bodies.lock().push(request.body.cloned());
        let mut script = self.script.lock();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        }
    }
}

/// Answers every request with `response`, but only once the test calls
/// [`GatedExchange::release`]. `started` fires when a request arrives.
pub struct GatedExchange {
    response: Result<RawResponse, ExchangeError>,
    pub started: Notify,
    gate: Semaphore,
}

impl GatedExchange {
    pub fn new(response: Result<RawResponse, ExchangeError>) -> Arc<Self> {
        Arc::new(Self {
            response,
            started: Notify::new(),
            gate: Semaphore::new(0),
        })
    }

    /// Let one held request complete.
    pub fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl HttpExchange for GatedExchange {
    async fn exchange(&self, _request: ExchangeRequest<'_>) -> Result<RawResponse, ExchangeError> {
        self.started.notify_one();
        self.gate.acquire().await.unwrap().forget();
        self.response.clone()
    }
}

pub fn json(status: u16, body: serde_json::Value) -> Result<RawResponse, ExchangeError> {
    Ok(RawResponse {
        status,
        body: serde_json::to_vec(&body).unwrap(),
        peer_certificate: Some(SERVER_CERT.to_vec()),
    })
}

pub fn refused() -> Result<RawResponse, ExchangeError> {
    Err(ExchangeError("connection refused".into()))
}

pub fn settings(poll_timeout_ms: u64, send_timeout_ms: u64, retry_interval_ms: u64) -> Settings {
    Settings {
        poll_interval_ms: 1000,
        poll_timeout_ms,
        send_timeout_ms,
        retry_interval_ms,
    }
}

/// HTTPS trader over `exchange`, paired with the scripted server's
/// certificate.
pub fn paired_trader(settings: Settings, exchange: Arc<dyn HttpExchange>) -> Trader {
    let mut config = TraderConfig::new(settings);
    config.protocol = Protocol::Https;
    let trader = Trader::with_exchange(config, exchange);
    trader.pair(PairingSession::new(
        "trader.local",
        3000,
        Fingerprint::of_certificate(SERVER_CERT),
    ));
    trader
}

pub fn snapshot_body(rate: i64) -> serde_json::Value {
    serde_json::json!({
        "rate": rate,
        "fiat": 250,
        "locale": {"currency": "EUR"},
        "txLimit": 1000
    })
}

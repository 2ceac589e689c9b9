//! # Certificate-Pinned Transport
//!
//! Wraps one [`HttpExchange`] round trip against the paired host and
//! enforces the pairing's certificate fingerprint.
//!
//! ## Security Invariant
//!
//! On HTTPS every response is checked against the pinned fingerprint before
//! its status or body is handed to anyone. A mismatch, or a TLS response with
//! no peer certificate, fails the call with `SecurityViolation` even if the
//! remote answered 200 with a well-formed body. There is no per-request
//! bypass; only the plaintext protocol (non-production) skips the check.

use std::sync::Arc;

use reqwest::Method;
use trader_core::{ClassifiedError, Fingerprint, PairingSession};
use url::Url;

use crate::config::Protocol;
use crate::exchange::{ExchangeRequest, HttpExchange};

/// Status and body of a response whose peer passed the pin check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Single-request transport with fingerprint pinning.
#[derive(Clone)]
pub struct PinnedTransport {
    exchange: Arc<dyn HttpExchange>,
    protocol: Protocol,
}

impl std::fmt::Debug for PinnedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinnedTransport")
            .field("protocol", &self.protocol)
            .finish_non_exhaustive()
    }
}

impl PinnedTransport {
    pub fn new(exchange: Arc<dyn HttpExchange>, protocol: Protocol) -> Self {
        Self { exchange, protocol }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Send `method path` with an optional JSON body to the paired host.
    ///
    /// Transport failures are `NetworkDown` and carry no partial response.
    pub async fn send(
        &self,
        session: &PairingSession,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<TransportResponse, ClassifiedError> {
        let url = endpoint_url(self.protocol, session, path)?;
        let raw = self
            .exchange
            .exchange(ExchangeRequest { method, url, body })
            .await
            .map_err(|e| ClassifiedError::network_down(e.to_string()))?;

        if self.protocol.is_tls() {
            verify_pin(&session.fingerprint, raw.peer_certificate.as_deref())?;
        }

        Ok(TransportResponse {
            status: raw.status,
            body: raw.body,
        })
    }
}

/// Compare the presented certificate against the pinned fingerprint.
fn verify_pin(pinned: &Fingerprint, presented: Option<&[u8]>) -> Result<(), ClassifiedError> {
    let Some(der) = presented else {
        tracing::error!(%pinned, "TLS peer presented no certificate");
        return Err(ClassifiedError::security_violation(
            "unauthorized server certificate: none presented",
        ));
    };

    let observed = Fingerprint::of_certificate(der);
    if observed.matches(pinned) {
        Ok(())
    } else {
        tracing::error!(%pinned, %observed, "TLS peer certificate does not match pairing");
        Err(ClassifiedError::security_violation(format!(
            "unauthorized server certificate: expected {pinned}, got {observed}"
        )))
    }
}

/// `{scheme}://{host}:{port}{path}` for the paired host.
fn endpoint_url(
    protocol: Protocol,
    session: &PairingSession,
    path: &str,
) -> Result<Url, ClassifiedError> {
    // Bare IPv6 literals need brackets in the authority.
    let host = if session.host.contains(':') && !session.host.starts_with('[') {
        format!("[{}]", session.host)
    } else {
        session.host.clone()
    };
    let base = format!("{}://{}:{}", protocol.scheme(), host, session.port);
    Url::parse(&base)
        .and_then(|base| base.join(path))
        .map_err(|e| {
            ClassifiedError::network_down(format!("invalid endpoint {base}{path}: {e}"))
        })
}

//! # Request Client
//!
//! Turns `(method, path, body)` plus the current pairing into a typed value
//! or a [`ClassifiedError`].
//!
//! ## Outcome Mapping
//!
//! | Outcome | Result |
//! |---------|--------|
//! | transport failure | `NetworkDown` / `SecurityViolation`, unchanged |
//! | 404 | pairing cleared, `Unpaired` |
//! | other non-200 | `Protocol` with status and the body's `err` text |
//! | 200 with `err` | `Business(errType)` |
//! | 200 otherwise | body decoded into the requested type |
//!
//! The 404 path is the only place this component mutates the pairing.

use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use trader_core::{ClassifiedError, PairingSession};

use crate::state::SharedState;
use crate::transport::{PinnedTransport, TransportResponse};

/// Remote endpoint paths.
pub mod paths {
    pub const POLL: &str = "/poll";
    pub const SEND: &str = "/send";
    pub const EVENT: &str = "/event";
    pub const VERIFY_USER: &str = "/verify_user";
    pub const VERIFY_TRANSACTION: &str = "/verify_transaction";
    pub const TRADE: &str = "/trade";
}

/// Business error name used when the remote omits `errType`.
const UNSPECIFIED_ERROR_TYPE: &str = "Unspecified";

/// Longest raw body excerpt quoted in a protocol error.
const BODY_EXCERPT_LEN: usize = 256;

/// Pairing-aware request layer over [`PinnedTransport`].
#[derive(Debug, Clone)]
pub struct RequestClient {
    transport: Arc<PinnedTransport>,
    state: SharedState,
}

impl RequestClient {
    pub fn new(transport: PinnedTransport, state: SharedState) -> Self {
        Self {
            transport: Arc::new(transport),
            state,
        }
    }

    /// Issue one call against the paired remote.
    ///
    /// Fails with `Unpaired` without touching the network if no pairing is
    /// active; callers are expected to check pairing state first.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, ClassifiedError> {
        let session = self
            .state
            .session()
            .ok_or_else(|| ClassifiedError::unpaired("no active pairing session"))?;
        self.call_for_session(&session, method, path, body).await
    }

    /// `call` against an already-captured `session`, so the caller can tell
    /// afterwards whether the pairing changed while the call was in flight.
    pub(crate) async fn call_for_session<T: DeserializeOwned>(
        &self,
        session: &PairingSession,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, ClassifiedError> {
        tracing::debug!(%method, path, host = %session.host, "remote call");
        let resp = match self.transport.send(session, method.clone(), path, body).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(%method, path, error = %e, "remote call failed");
                return Err(e);
            }
        };

        if resp.status == 404 {
            if self.state.clear_session_if(session) {
                tracing::warn!(host = %session.host, "remote no longer recognizes pairing; session cleared");
            }
            return Err(ClassifiedError::unpaired("server has unpaired"));
        }

        let result = interpret(resp);
        if let Err(e) = &result {
            tracing::warn!(%method, path, error = %e, "remote call rejected");
        }
        result
    }

    /// `call` with the body serialized from any `Serialize` value.
    pub async fn call_with<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClassifiedError> {
        let body = serde_json::to_value(body)
            .map_err(|e| ClassifiedError::protocol(format!("failed to encode request body: {e}")))?;
        self.call(method, path, Some(&body)).await
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }
}

/// Map a non-404 response onto the result taxonomy.
fn interpret<T: DeserializeOwned>(resp: TransportResponse) -> Result<T, ClassifiedError> {
    let parsed = parse_body(&resp.body);

    if resp.status != 200 {
        let detail = match &parsed {
            Ok(value) => error_text(value).unwrap_or_else(|| body_excerpt(&resp.body)),
            Err(_) => body_excerpt(&resp.body),
        };
        return Err(ClassifiedError::protocol(format!(
            "server returned {}: {detail}",
            resp.status
        )));
    }

    let value = parsed
        .map_err(|e| ClassifiedError::protocol(format!("malformed response body: {e}")))?;

    if let Some(message) = error_text(&value) {
        let name = value
            .get("errType")
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNSPECIFIED_ERROR_TYPE);
        return Err(ClassifiedError::business(name, message));
    }

    serde_json::from_value(value)
        .map_err(|e| ClassifiedError::protocol(format!("unexpected response shape: {e}")))
}

/// Empty bodies decode as JSON `null`.
fn parse_body(body: &[u8]) -> Result<serde_json::Value, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_slice(body)
}

/// The application-level `err` field, if set to anything meaningful.
fn error_text(value: &serde_json::Value) -> Option<String> {
    match value.get("err")? {
        serde_json::Value::Null | serde_json::Value::Bool(false) => None,
        serde_json::Value::String(s) if s.is_empty() => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn body_excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut excerpt: String = text.chars().take(BODY_EXCERPT_LEN).collect();
    if text.chars().count() > BODY_EXCERPT_LEN {
        excerpt.push('…');
    }
    excerpt
}

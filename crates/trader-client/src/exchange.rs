//! # HTTP Exchange Primitive
//!
//! The black-box transport underneath [`crate::transport::PinnedTransport`]:
//! send one request, get back the status, the raw body and the DER
//! certificate the peer presented on the connection.
//!
//! [`ReqwestExchange`] is the production implementation (reqwest + rustls).
//! Tests substitute their own [`HttpExchange`] to script responses and peer
//! certificates without real TLS endpoints.

use async_trait::async_trait;
use reqwest::Method;
use url::Url;

use crate::config::{ClientCredentials, ConfigError, TraderConfig};

/// One outbound request.
#[derive(Debug, Clone)]
pub struct ExchangeRequest<'a> {
    pub method: Method,
    pub url: Url,
    pub body: Option<&'a serde_json::Value>,
}

/// A completed exchange. No interpretation of the status has happened yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
    /// DER certificate of the TLS peer; `None` on plaintext connections.
    pub peer_certificate: Option<Vec<u8>>,
}

/// The exchange could not be established or completed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ExchangeError(pub String);

/// Send a request and return the raw response.
///
/// Implementations must be `Send + Sync` so they can be shared behind an
/// `Arc` by the poller and concurrent submissions.
#[async_trait]
pub trait HttpExchange: Send + Sync {
    async fn exchange(&self, request: ExchangeRequest<'_>) -> Result<RawResponse, ExchangeError>;
}

/// reqwest-backed exchange with rustls, client identity and TLS info.
#[derive(Debug, Clone)]
pub struct ReqwestExchange {
    http: reqwest::Client,
}

impl ReqwestExchange {
    /// Build the HTTP client for `config`.
    ///
    /// HTTPS requires `credentials`. With `reject_unauthorized` disabled,
    /// CA validation is skipped but the fingerprint pin still applies.
    ///
    /// Redirects are never followed: a 3xx is returned as-is, so every
    /// request reaches only the paired host and its pin is checked on the
    /// response that is actually interpreted.
    pub fn new(
        config: &TraderConfig,
        credentials: Option<&ClientCredentials>,
    ) -> Result<Self, ConfigError> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(config.request_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .tls_info(true);

        if config.protocol.is_tls() {
            let credentials = credentials.ok_or(ConfigError::MissingCredentials)?;
            builder = builder.identity(credentials.to_identity()?);
            if !config.reject_unauthorized {
                tracing::warn!("CA validation disabled; relying on fingerprint pinning alone");
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        let http = builder
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl HttpExchange for ReqwestExchange {
    async fn exchange(&self, request: ExchangeRequest<'_>) -> Result<RawResponse, ExchangeError> {
        let mut builder = self.http.request(request.method.clone(), request.url.clone());
        if let Some(body) = request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(|e| {
            ExchangeError(format!("{} {} failed: {e}", request.method, request.url.path()))
        })?;

        let status = resp.status().as_u16();
        let peer_certificate = resp
            .extensions()
            .get::<reqwest::tls::TlsInfo>()
            .and_then(|info| info.peer_certificate())
            .map(<[u8]>::to_vec);
        let body = resp
            .bytes()
            .await
            .map_err(|e| ExchangeError(format!("failed to read response body: {e}")))?;

        Ok(RawResponse {
            status,
            body: body.to_vec(),
            peer_certificate,
        })
    }
}

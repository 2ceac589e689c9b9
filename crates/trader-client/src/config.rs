//! Trader client configuration.
//!
//! Timing settings (poll interval, grace period, send timeout, retry
//! interval) have no built-in defaults: they must come from the deployment's
//! configuration. Transport policy defaults to HTTPS with CA validation on.
//!
//! Configuration can be built explicitly, loaded from `TRADER_*` environment
//! variables, or parsed from YAML.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Default per-request timeout, in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Wire protocol used to reach the paired remote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Plaintext HTTP. Non-production use only; disables pinning.
    Http,
    /// HTTPS with client certificate and fingerprint pinning.
    #[default]
    Https,
}

impl Protocol {
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Https)
    }
}

impl std::str::FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(ConfigError::InvalidValue {
                key: "protocol".into(),
                value: other.into(),
            }),
        }
    }
}

/// Timing settings, all in milliseconds on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Interval between polls.
    pub poll_interval_ms: u64,
    /// Grace period a transport failure may persist before connectivity
    /// loss is reported.
    pub poll_timeout_ms: u64,
    /// Deadline for an idempotent transfer submission, from its start.
    pub send_timeout_ms: u64,
    /// Wait between submission attempts.
    pub retry_interval_ms: u64,
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// Configuration for a [`crate::Trader`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraderConfig {
    #[serde(default)]
    pub protocol: Protocol,
    /// Reject peer certificates that fail CA validation. Pinning applies
    /// regardless of this flag.
    #[serde(default = "default_reject_unauthorized")]
    pub reject_unauthorized: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    pub settings: Settings,
}

fn default_reject_unauthorized() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl TraderConfig {
    /// HTTPS configuration with default transport policy.
    pub fn new(settings: Settings) -> Self {
        Self {
            protocol: Protocol::Https,
            reject_unauthorized: true,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            settings,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `TRADER_PROTOCOL` (`http` | `https`, default: `https`)
    /// - `TRADER_REJECT_UNAUTHORIZED` (default: `true`)
    /// - `TRADER_REQUEST_TIMEOUT_SECS` (default: 30)
    /// - `TRADER_POLL_INTERVAL_MS` (required)
    /// - `TRADER_POLL_TIMEOUT_MS` (required)
    /// - `TRADER_SEND_TIMEOUT_MS` (required)
    /// - `TRADER_RETRY_INTERVAL_MS` (required)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let protocol = match lookup("TRADER_PROTOCOL") {
            Some(raw) => raw.parse()?,
            None => Protocol::default(),
        };
        let reject_unauthorized = match lookup("TRADER_REJECT_UNAUTHORIZED") {
            Some(raw) => parse_bool("TRADER_REJECT_UNAUTHORIZED", &raw)?,
            None => true,
        };
        let request_timeout_secs = match lookup("TRADER_REQUEST_TIMEOUT_SECS") {
            Some(raw) => parse_u64("TRADER_REQUEST_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };
        let required = |key: &str| -> Result<u64, ConfigError> {
            let raw = lookup(key).ok_or_else(|| ConfigError::MissingSetting(key.to_string()))?;
            parse_u64(key, &raw)
        };

        let config = Self {
            protocol,
            reject_unauthorized,
            request_timeout_secs,
            settings: Settings {
                poll_interval_ms: required("TRADER_POLL_INTERVAL_MS")?,
                poll_timeout_ms: required("TRADER_POLL_TIMEOUT_MS")?,
                send_timeout_ms: required("TRADER_SEND_TIMEOUT_MS")?,
                retry_interval_ms: required("TRADER_RETRY_INTERVAL_MS")?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would spin or never fire.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settings.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "poll_interval_ms".into(),
                value: "0".into(),
            });
        }
        if self.settings.retry_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "retry_interval_ms".into(),
                value: "0".into(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "request_timeout_secs".into(),
                value: "0".into(),
            });
        }
        Ok(())
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}

/// Client certificate and private key presented on TLS connections.
///
/// Both are PEM encoded. Custom `Debug` implementation redacts the key.
#[derive(Clone)]
pub struct ClientCredentials {
    certificate_pem: Vec<u8>,
    private_key_pem: Zeroizing<Vec<u8>>,
}

impl ClientCredentials {
    pub fn new(certificate_pem: Vec<u8>, private_key_pem: Vec<u8>) -> Self {
        Self {
            certificate_pem,
            private_key_pem: Zeroizing::new(private_key_pem),
        }
    }

    pub fn certificate_pem(&self) -> &[u8] {
        &self.certificate_pem
    }

    /// Build the reqwest identity (key followed by certificate chain).
    pub(crate) fn to_identity(&self) -> Result<reqwest::Identity, ConfigError> {
        let mut pem = Zeroizing::new(Vec::with_capacity(
            self.private_key_pem.len() + self.certificate_pem.len() + 1,
        ));
        pem.extend_from_slice(&self.private_key_pem);
        pem.push(b'\n');
        pem.extend_from_slice(&self.certificate_pem);
        reqwest::Identity::from_pem(&pem).map_err(|e| ConfigError::InvalidCredentials(e.to_string()))
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("certificate_pem", &format_args!("<{} bytes>", self.certificate_pem.len()))
            .field("private_key_pem", &"[REDACTED]")
            .finish()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required setting {0} is not set")]
    MissingSetting(String),
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("https requires a client certificate and key")]
    MissingCredentials,
    #[error("invalid client credentials: {0}")]
    InvalidCredentials(String),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

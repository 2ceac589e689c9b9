//! Configuration and credential loading for the `trader` binary.
//!
//! A YAML file given with `--config` takes precedence. Without one, the
//! client configuration comes from `TRADER_*` environment variables and the
//! credential paths from `TRADER_CERT_FILE` / `TRADER_KEY_FILE`.
//!
//! ```yaml
//! protocol: https
//! reject_unauthorized: true
//! request_timeout_secs: 30
//! settings:
//!   poll_interval_ms: 5000
//!   poll_timeout_ms: 20000
//!   send_timeout_ms: 60000
//!   retry_interval_ms: 2000
//! credentials:
//!   cert_file: /etc/trader/client.pem
//!   key_file: /etc/trader/client.key
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use trader_client::{ClientCredentials, TraderConfig};

/// Paths of the PEM client certificate and private key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPaths {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

/// Everything the binary needs to build a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(flatten)]
    pub trader: TraderConfig,
    #[serde(default)]
    pub credentials: Option<CredentialPaths>,
}

impl CliConfig {
    /// Load from `path` if given, otherwise from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::from_env(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config
            .trader
            .validate()
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self> {
        let trader = TraderConfig::from_env().context("failed to load config from environment")?;
        let credentials = match (
            std::env::var_os("TRADER_CERT_FILE"),
            std::env::var_os("TRADER_KEY_FILE"),
        ) {
            (Some(cert), Some(key)) => Some(CredentialPaths {
                cert_file: cert.into(),
                key_file: key.into(),
            }),
            _ => None,
        };
        Ok(Self {
            trader,
            credentials,
        })
    }

    /// Replace the configured credential paths when both are given.
    pub fn with_credential_overrides(
        mut self,
        cert_file: Option<PathBuf>,
        key_file: Option<PathBuf>,
    ) -> Result<Self> {
        match (cert_file, key_file) {
            (Some(cert_file), Some(key_file)) => {
                self.credentials = Some(CredentialPaths {
                    cert_file,
                    key_file,
                });
                Ok(self)
            }
            (None, None) => Ok(self),
            _ => anyhow::bail!("--cert and --key must be given together"),
        }
    }

    /// Read the credential files, if any are configured.
    pub fn load_credentials(&self) -> Result<Option<ClientCredentials>> {
        let Some(paths) = &self.credentials else {
            return Ok(None);
        };
        let cert = std::fs::read(&paths.cert_file).with_context(|| {
            format!("failed to read client certificate {}", paths.cert_file.display())
        })?;
        let key = std::fs::read(&paths.key_file)
            .with_context(|| format!("failed to read client key {}", paths.key_file.display()))?;
        Ok(Some(ClientCredentials::new(cert, key)))
    }
}

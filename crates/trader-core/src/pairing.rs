//! # Pairing Session and Certificate Fingerprints
//!
//! A pairing binds this client to exactly one remote service instance. The
//! binding is anchored by the SHA-256 fingerprint of the remote's TLS
//! certificate, recorded at pairing time and checked on every request.
//!
//! ## Fingerprint Format
//!
//! Fingerprints are parsed from 64 hex digits, with or without `:`
//! separators, in either case. They display as upper-case colon-separated
//! pairs (`AB:CD:...`), the format printed by `openssl x509 -fingerprint`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Length of a SHA-256 fingerprint in bytes.
pub const FINGERPRINT_LEN: usize = 32;

/// Errors parsing a textual fingerprint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FingerprintError {
    #[error("fingerprint must be {expected} hex digits, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("fingerprint contains non-hex character {0:?}")]
    InvalidCharacter(char),
}

/// SHA-256 fingerprint of a DER-encoded X.509 certificate.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Wrap raw fingerprint bytes.
    pub fn from_bytes(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    /// Fingerprint a DER-encoded certificate.
    pub fn of_certificate(der: &[u8]) -> Self {
        let hash = Sha256::digest(der);
        let mut bytes = [0u8; FINGERPRINT_LEN];
        bytes.copy_from_slice(&hash);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// Constant-time equality against another fingerprint.
    pub fn matches(&self, other: &Fingerprint) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl std::str::FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: Vec<char> = s.trim().chars().filter(|c| *c != ':').collect();
        if let Some(bad) = digits.iter().find(|c| !c.is_ascii_hexdigit()) {
            return Err(FingerprintError::InvalidCharacter(*bad));
        }
        if digits.len() != FINGERPRINT_LEN * 2 {
            return Err(FingerprintError::InvalidLength {
                expected: FINGERPRINT_LEN * 2,
                actual: digits.len(),
            });
        }

        let mut bytes = [0u8; FINGERPRINT_LEN];
        for (byte, pair) in bytes.iter_mut().zip(digits.chunks(2)) {
            // Both digits were validated above, so to_digit cannot fail.
            let hi = pair[0].to_digit(16).unwrap_or_default() as u8;
            let lo = pair[1].to_digit(16).unwrap_or_default() as u8;
            *byte = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = FingerprintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

/// Connection details of the paired remote service.
///
/// Set once when pairing succeeds and cleared when the remote reports the
/// pairing unknown. No request other than pairing itself may be issued
/// while no session exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingSession {
    /// Remote host name or address.
    pub host: String,
    /// Remote TCP port.
    pub port: u16,
    /// Pinned certificate fingerprint of the remote.
    pub fingerprint: Fingerprint,
}

impl PairingSession {
    pub fn new(host: impl Into<String>, port: u16, fingerprint: Fingerprint) -> Self {
        Self {
            host: host.into(),
            port,
            fingerprint,
        }
    }
}

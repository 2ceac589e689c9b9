//! # Error Taxonomy: Classified Remote-Call Failures
//!
//! Every failure produced by the transport, request and polling layers is a
//! [`ClassifiedError`]. The [`ErrorKind`] decides what happens next:
//!
//! | Kind | Meaning | Typical handling |
//! |------|---------|------------------|
//! | `NetworkDown` | Exchange could not be established or completed | Transient, retry-eligible |
//! | `Unpaired` | Remote no longer recognizes this pairing | Re-pair required |
//! | `SecurityViolation` | Peer certificate does not match the pin | Never retried, never ignored |
//! | `Business(name)` | Remote rejected the request at application level | Fatal for `InsufficientFunds` |
//! | `Protocol` | Unexpected status or response shape | Surfaced as a confirmed outage |

use thiserror::Error;

/// Business error name the remote uses when a transfer cannot be funded.
pub const INSUFFICIENT_FUNDS: &str = "InsufficientFunds";

/// Classification of a failed remote call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection refused, DNS failure, reset or timeout.
    NetworkDown,
    /// The remote answered 404: this pairing is unknown to it.
    Unpaired,
    /// TLS peer fingerprint mismatch.
    SecurityViolation,
    /// Application-level error reported in a 200 body, carrying the
    /// remote-provided error type name.
    Business(String),
    /// Unexpected HTTP status or undecodable body.
    Protocol,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkDown => f.write_str("network down"),
            Self::Unpaired => f.write_str("unpaired"),
            Self::SecurityViolation => f.write_str("security violation"),
            Self::Business(name) => write!(f, "business error {name}"),
            Self::Protocol => f.write_str("protocol error"),
        }
    }
}

/// A failed remote call with its classification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ClassifiedError {
    kind: ErrorKind,
    message: String,
}

impl ClassifiedError {
    /// Create an error of an arbitrary kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network_down(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkDown, message)
    }

    pub fn unpaired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unpaired, message)
    }

    pub fn security_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SecurityViolation, message)
    }

    pub fn business(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Business(name.into()), message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    /// The classification.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Human-readable detail, without the kind prefix.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the failure is a transport-level blip that may clear on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, ErrorKind::NetworkDown)
    }

    /// The remote-provided error type name, for business errors.
    pub fn business_name(&self) -> Option<&str> {
        match &self.kind {
            ErrorKind::Business(name) => Some(name),
            _ => None,
        }
    }

    /// Whether the remote refused a transfer for lack of funds.
    pub fn is_insufficient_funds(&self) -> bool {
        self.business_name() == Some(INSUFFICIENT_FUNDS)
    }
}

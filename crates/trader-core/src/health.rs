//! # Network Health Detector
//!
//! Turns consecutive poll outcomes into connectivity signals without
//! flapping on single transient failures.
//!
//! ## States
//!
//! ```text
//!            NetworkDown                 NetworkDown, now - since > grace
//!   UP ────────────────────▶ SUSPECT ─────────────────────────────────▶ DOWN
//!   ▲                          │  ▲                                      │
//!   │        success           │  └── NetworkDown within grace           │
//!   ├──────────────────────────┘                                         │
//!   │                         success                                    │
//!   └────────────────────────────────────────────────────────────────────┘
//!
//!   any state ── Protocol / Business / SecurityViolation ──▶ DOWN
//! ```
//!
//! `Unpaired` produces a pairing-lost signal and leaves the state alone.
//! Only the entry into DOWN signals connectivity loss, so a sustained outage
//! surfaces once rather than once per poll.

use std::time::{Duration, Instant};

use crate::error::{ClassifiedError, ErrorKind};

/// The client's belief about remote reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Last poll succeeded (also the initial belief).
    Up,
    /// At least one transport failure since `since`, still within grace.
    Suspect { since: Instant },
    /// Connectivity loss has been confirmed and signalled.
    Down,
}

impl HealthState {
    pub fn is_up(&self) -> bool {
        matches!(self, Self::Up)
    }

    pub fn is_down(&self) -> bool {
        matches!(self, Self::Down)
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Up => "UP",
            Self::Suspect { .. } => "SUSPECT",
            Self::Down => "DOWN",
        };
        f.write_str(s)
    }
}

/// A poll outcome reduced to what the detector needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollObservation {
    /// Poll returned a valid snapshot.
    Success,
    /// Transport-level failure.
    NetworkDown,
    /// Remote forgot the pairing.
    Unpaired,
    /// Remote answered but erred or refused; a confirmed outage.
    Rejected,
}

impl PollObservation {
    /// Classify a failed poll.
    pub fn from_error(err: &ClassifiedError) -> Self {
        match err.kind() {
            ErrorKind::NetworkDown => Self::NetworkDown,
            ErrorKind::Unpaired => Self::Unpaired,
            ErrorKind::SecurityViolation | ErrorKind::Business(_) | ErrorKind::Protocol => {
                Self::Rejected
            }
        }
    }
}

/// Notification produced by a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthSignal {
    ConnectivityUp,
    ConnectivityDown,
    PairingLost,
}

/// Two-tier transient-vs-confirmed outage detector.
#[derive(Debug, Clone)]
pub struct HealthDetector {
    state: HealthState,
    grace: Duration,
}

impl HealthDetector {
    /// Create a detector in the UP state with the given grace period.
    pub fn new(grace: Duration) -> Self {
        Self {
            state: HealthState::Up,
            grace,
        }
    }

    pub fn state(&self) -> HealthState {
        self.state
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Feed one poll outcome observed at `now`.
    ///
    /// Returns the signal to deliver to observers, if any. A successful poll
    /// always yields [`HealthSignal::ConnectivityUp`].
    pub fn observe(&mut self, observation: PollObservation, now: Instant) -> Option<HealthSignal> {
        match observation {
            PollObservation::Success => {
                self.state = HealthState::Up;
                Some(HealthSignal::ConnectivityUp)
            }
            PollObservation::Unpaired => Some(HealthSignal::PairingLost),
            PollObservation::Rejected => self.enter_down(),
            PollObservation::NetworkDown => match self.state {
                HealthState::Up => {
                    self.state = HealthState::Suspect { since: now };
                    None
                }
                HealthState::Suspect { since } => {
                    if now.saturating_duration_since(since) > self.grace {
                        self.enter_down()
                    } else {
                        None
                    }
                }
                HealthState::Down => None,
            },
        }
    }

    fn enter_down(&mut self) -> Option<HealthSignal> {
        let was_down = self.state.is_down();
        self.state = HealthState::Down;
        if was_down {
            None
        } else {
            Some(HealthSignal::ConnectivityDown)
        }
    }
}

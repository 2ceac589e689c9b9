//! # Shared Client State
//!
//! Pairing session, market snapshot and health state live behind a single
//! lock so that readers always observe a consistent view: never a new
//! snapshot next to a stale health state, never half a snapshot.
//!
//! The lock is `parking_lot::RwLock` and is never held across `.await`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use trader_core::{
    ClassifiedError, ErrorKind, HealthDetector, HealthSignal, HealthState, MarketSnapshot,
    PairingSession, PollObservation,
};

#[derive(Debug)]
struct ClientState {
    session: Option<PairingSession>,
    market: Option<MarketSnapshot>,
    health: HealthDetector,
}

/// A consistent copy of the client state at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct StateView {
    pub session: Option<PairingSession>,
    pub market: Option<MarketSnapshot>,
    pub health: HealthState,
}

/// Cloneable handle to the client state.
#[derive(Debug, Clone)]
pub struct SharedState {
    inner: Arc<RwLock<ClientState>>,
}

impl SharedState {
    /// Unpaired state with no market data, health UP.
    pub fn new(grace: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ClientState {
                session: None,
                market: None,
                health: HealthDetector::new(grace),
            })),
        }
    }

    pub fn view(&self) -> StateView {
        let guard = self.inner.read();
        StateView {
            session: guard.session.clone(),
            market: guard.market.clone(),
            health: guard.health.state(),
        }
    }

    pub fn session(&self) -> Option<PairingSession> {
        self.inner.read().session.clone()
    }

    pub fn is_paired(&self) -> bool {
        self.inner.read().session.is_some()
    }

    pub fn market(&self) -> Option<MarketSnapshot> {
        self.inner.read().market.clone()
    }

    pub fn health(&self) -> HealthState {
        self.inner.read().health.state()
    }

    /// Install a new pairing, replacing any previous one.
    pub fn pair(&self, session: PairingSession) {
        self.inner.write().session = Some(session);
    }

    /// Drop the pairing unconditionally.
    pub fn unpair(&self) -> Option<PairingSession> {
        self.inner.write().session.take()
    }

    /// Drop the pairing only if it is still `expected`.
    ///
    /// A request that observed a 404 must not clear a newer pairing
    /// installed while it was in flight.
    pub fn clear_session_if(&self, expected: &PairingSession) -> bool {
        let mut guard = self.inner.write();
        if guard.session.as_ref() == Some(expected) {
            guard.session = None;
            true
        } else {
            false
        }
    }

    /// Apply one poll outcome atomically.
    ///
    /// `issued_for` is the pairing the poll was sent under. If the pairing
    /// has changed since, the outcome is discarded and nothing is touched.
    /// The one exception is an `Unpaired` outcome whose own 404 cleared that
    /// pairing: it still reports the loss.
    ///
    /// On success the snapshot is replaced as a whole; on failure it is left
    /// untouched. Returns the health signal the transition produced.
    pub fn apply_poll(
        &self,
        issued_for: &PairingSession,
        outcome: Result<MarketSnapshot, &ClassifiedError>,
        now: Instant,
    ) -> Result<Option<HealthSignal>, StalePoll> {
        let mut guard = self.inner.write();
        let current = guard.session.as_ref() == Some(issued_for);
        let cleared_by_this_poll = guard.session.is_none()
            && matches!(&outcome, Err(err) if err.kind() == &ErrorKind::Unpaired);
        if !current && !cleared_by_this_poll {
            return Err(StalePoll);
        }

        Ok(match outcome {
            Ok(snapshot) => {
                guard.market = Some(snapshot);
                guard.health.observe(PollObservation::Success, now)
            }
            Err(err) => guard.health.observe(PollObservation::from_error(err), now),
        })
    }
}

/// A poll outcome arrived after the pairing it was issued under was
/// replaced or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("poll result belongs to a pairing that is no longer active")]
pub struct StalePoll;

//! Observer notifications published by the poller.
//!
//! Delivered over a `tokio::sync::broadcast` channel; every subscriber sees
//! every event published after it subscribed. Slow subscribers lose the
//! oldest events rather than blocking the poller.

use tokio::sync::broadcast;
use trader_core::{HealthSignal, MarketSnapshot};

/// Events buffered per subscriber before the oldest are dropped.
const EVENT_BUFFER: usize = 64;

/// Connectivity and market-state change notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum TraderEvent {
    /// A poll succeeded.
    ConnectivityUp,
    /// Connectivity loss confirmed (sustained transport failure or remote
    /// rejection).
    ConnectivityDown,
    /// The remote no longer recognizes this pairing.
    PairingLost,
    /// A new market snapshot replaced the previous one.
    MarketDataUpdated(MarketSnapshot),
}

impl From<HealthSignal> for TraderEvent {
    fn from(signal: HealthSignal) -> Self {
        match signal {
            HealthSignal::ConnectivityUp => Self::ConnectivityUp,
            HealthSignal::ConnectivityDown => Self::ConnectivityDown,
            HealthSignal::PairingLost => Self::PairingLost,
        }
    }
}

/// Fan-out of [`TraderEvent`]s to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TraderEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TraderEvent> {
        self.tx.subscribe()
    }

    /// Publish to current subscribers. Having none is not an error.
    pub fn publish(&self, event: TraderEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("no subscribers for trader event");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

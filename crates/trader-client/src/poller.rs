//! # Network Health Poller
//!
//! Polls `GET /poll` on a fixed interval (first tick immediately), feeds each
//! outcome to the health detector and publishes the resulting events.
//!
//! ## Scheduling
//!
//! The poller is a single task: a tick's request completes before the next
//! tick is awaited, so polls never overlap. Ticks missed while a slow poll
//! was in flight are skipped rather than fired in a burst.
//!
//! ## Cancellation
//!
//! [`PollerHandle::stop`] cancels the task. A poll in flight at that moment
//! is dropped at its network await; its result never reaches the shared
//! state or the subscribers.
//!
//! A [`crate::Trader`] runs at most one poller at a time; a second
//! [`crate::Trader::start_polling`] fails with [`PollerError::AlreadyRunning`]
//! until the first handle is stopped or dropped.
//!
//! ## Pairing Changes
//!
//! Each poll remembers the pairing it was sent under. A result that comes
//! back after that pairing was replaced or removed is discarded without
//! touching state or notifying anyone.

use std::time::Duration;

use reqwest::Method;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use trader_core::{ClassifiedError, HealthSignal, MarketSnapshot, PairingSession};

use crate::events::{EventBus, TraderEvent};
use crate::request::{paths, RequestClient};
use crate::state::{SharedState, StalePoll};

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollTick {
    /// No pairing; nothing was sent.
    Skipped,
    /// A poll completed and produced this health signal, if any.
    Polled(Option<HealthSignal>),
    /// A poll completed after its pairing changed; the result was dropped.
    Discarded,
}

/// Errors starting a background poller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollerError {
    #[error("a poller is already running for this client")]
    AlreadyRunning,
}

type PollOutcome = (PairingSession, Result<MarketSnapshot, ClassifiedError>);

/// Periodic poller driving the health detector.
#[derive(Debug, Clone)]
pub struct NetworkHealthPoller {
    client: RequestClient,
    events: EventBus,
    interval: Duration,
}

impl NetworkHealthPoller {
    pub fn new(client: RequestClient, events: EventBus, interval: Duration) -> Self {
        Self {
            client,
            events,
            interval,
        }
    }

    fn state(&self) -> &SharedState {
        self.client.state()
    }

    /// Run one tick: poll if paired and apply the outcome.
    pub async fn poll_once(&self) -> PollTick {
        match self.fetch().await {
            Some((session, outcome)) => match self.apply(&session, outcome) {
                Ok(signal) => PollTick::Polled(signal),
                Err(StalePoll) => PollTick::Discarded,
            },
            None => PollTick::Skipped,
        }
    }

    /// Issue the poll request under the current pairing; `None` if unpaired.
    async fn fetch(&self) -> Option<PollOutcome> {
        let Some(session) = self.state().session() else {
            tracing::trace!("not paired; skipping poll");
            return None;
        };
        let outcome = self
            .client
            .call_for_session(&session, Method::GET, paths::POLL, None)
            .await;
        Some((session, outcome))
    }

    /// Update state and notify observers for one completed poll.
    fn apply(
        &self,
        issued_for: &PairingSession,
        outcome: Result<MarketSnapshot, ClassifiedError>,
    ) -> Result<Option<HealthSignal>, StalePoll> {
        let now = Instant::now().into_std();
        let applied = match &outcome {
            Ok(snapshot) => self.state().apply_poll(issued_for, Ok(snapshot.clone()), now),
            Err(err) => self.state().apply_poll(issued_for, Err(err), now),
        };
        let signal = match applied {
            Ok(signal) => signal,
            Err(stale) => {
                tracing::debug!(host = %issued_for.host, "pairing changed during poll; result discarded");
                return Err(stale);
            }
        };

        match outcome {
            Ok(snapshot) => {
                self.events.publish(TraderEvent::MarketDataUpdated(snapshot));
                if let Some(signal) = signal {
                    self.events.publish(signal.into());
                }
            }
            Err(err) => {
                match signal {
                    Some(HealthSignal::ConnectivityDown) => {
                        tracing::warn!(error = %err, "connectivity to paired remote lost");
                    }
                    Some(HealthSignal::PairingLost) => {
                        tracing::warn!("pairing lost");
                    }
                    _ => {
                        tracing::debug!(error = %err, health = %self.state().health(), "poll failed");
                    }
                }
                if let Some(signal) = signal {
                    self.events.publish(signal.into());
                }
            }
        }
        Ok(signal)
    }

    /// Start polling on a background task.
    ///
    /// Only [`crate::Trader::start_polling`] spawns, so that one client never
    /// runs two pollers at once.
    pub(crate) fn spawn(self) -> PollerHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(interval = ?self.interval, "poller started");

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let outcome = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    outcome = self.fetch() => outcome,
                };

                if token.is_cancelled() {
                    break;
                }
                if let Some((session, outcome)) = outcome {
                    let _ = self.apply(&session, outcome);
                }
            }

            tracing::info!("poller stopped");
        });

        PollerHandle {
            cancel,
            task: Some(task),
        }
    }
}

/// Handle to a running poller. Dropping it stops the poller.
#[derive(Debug)]
pub struct PollerHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Stop the recurring timer. Late results of an in-flight poll are
    /// discarded.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token cancelled when this poller stops.
    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop and wait for the poller task to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("poller task failed: {e}");
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

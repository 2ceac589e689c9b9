//! Health transitions and event delivery of the network-health poller.

mod common;

use std::time::Duration;

use common::{json, paired_trader, refused, settings, snapshot_body, GatedExchange, ScriptedExchange};
use rust_decimal::Decimal;
use tokio::sync::broadcast::error::TryRecvError;
use trader_client::{PollTick, PollerError, TraderEvent};
use trader_core::{Fingerprint, HealthSignal, HealthState, PairingSession};

fn drain(rx: &mut tokio::sync::broadcast::Receiver<TraderEvent>) -> Vec<TraderEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn success_replaces_snapshot_then_confirms_connectivity() {
    let exchange = ScriptedExchange::new(vec![json(200, snapshot_body(42_000))]);
    let trader = paired_trader(settings(5000, 5000, 1000), exchange.clone());
    let mut rx = trader.subscribe();

    let tick = trader.poller().poll_once().await;
    assert_eq!(tick, PollTick::Polled(Some(HealthSignal::ConnectivityUp)));

    let snapshot = trader.market_snapshot().unwrap();
    assert_eq!(snapshot.exchange_rate, Decimal::from(42_000));
    assert_eq!(snapshot.transaction_limit, Some(Decimal::from(1000)));

    let events = drain(&mut rx);
    assert_eq!(
        events,
        [
            TraderEvent::MarketDataUpdated(snapshot),
            TraderEvent::ConnectivityUp
        ]
    );
    assert_eq!(exchange.requests(), ["GET /poll"]);
}

#[tokio::test(start_paused = true)]
async fn unpaired_tick_sends_nothing() {
    let exchange = ScriptedExchange::new(vec![json(200, snapshot_body(1))]);
    let trader = paired_trader(settings(5000, 5000, 1000), exchange.clone());
    trader.unpair();

    assert_eq!(trader.poller().poll_once().await, PollTick::Skipped);
    assert_eq!(exchange.request_count(), 0);
    assert!(trader.health().is_up());
}

#[tokio::test(start_paused = true)]
async fn single_blip_within_grace_does_not_report_down() {
    let exchange = ScriptedExchange::new(vec![
        refused(),
        refused(),
        json(200, snapshot_body(1)),
    ]);
    let trader = paired_trader(settings(5000, 5000, 1000), exchange);
    let poller = trader.poller();
    let mut rx = trader.subscribe();

    poller.poll_once().await;
    assert!(matches!(trader.health(), HealthState::Suspect { .. }));

    tokio::time::advance(Duration::from_secs(3)).await;
    assert_eq!(poller.poll_once().await, PollTick::Polled(None));
    assert!(matches!(trader.health(), HealthState::Suspect { .. }));

    poller.poll_once().await;
    assert!(trader.health().is_up());
    assert!(!drain(&mut rx).contains(&TraderEvent::ConnectivityDown));
}

#[tokio::test(start_paused = true)]
async fn sustained_failure_past_grace_reports_down_once() {
    let exchange = ScriptedExchange::new(vec![refused()]);
    let trader = paired_trader(settings(5000, 5000, 1000), exchange);
    let poller = trader.poller();
    let mut rx = trader.subscribe();
    let snapshot_before = trader.market_snapshot();

    poller.poll_once().await;
    tokio::time::advance(Duration::from_secs(6)).await;
    assert_eq!(
        poller.poll_once().await,
        PollTick::Polled(Some(HealthSignal::ConnectivityDown))
    );
    assert!(trader.health().is_down());

    tokio::time::advance(Duration::from_secs(6)).await;
    assert_eq!(poller.poll_once().await, PollTick::Polled(None));

    assert_eq!(drain(&mut rx), [TraderEvent::ConnectivityDown]);
    assert_eq!(trader.market_snapshot(), snapshot_before);
}

#[tokio::test(start_paused = true)]
async fn protocol_failure_is_down_immediately() {
    let exchange = ScriptedExchange::new(vec![json(500, serde_json::json!({"err": "db offline"}))]);
    let trader = paired_trader(settings(5000, 5000, 1000), exchange);
    let mut rx = trader.subscribe();

    trader.poller().poll_once().await;
    assert!(trader.health().is_down());
    assert_eq!(drain(&mut rx), [TraderEvent::ConnectivityDown]);
}

#[tokio::test(start_paused = true)]
async fn pin_mismatch_is_down_immediately() {
    let exchange = ScriptedExchange::new(vec![Ok(trader_client::RawResponse {
        status: 200,
        body: serde_json::to_vec(&snapshot_body(1)).unwrap(),
        peer_certificate: Some(b"impostor".to_vec()),
    })]);
    let trader = paired_trader(settings(5000, 5000, 1000), exchange);

    trader.poller().poll_once().await;
    assert!(trader.health().is_down());
    assert!(trader.market_snapshot().is_none());
}

#[tokio::test(start_paused = true)]
async fn not_found_loses_pairing_and_stops_polling() {
    let exchange = ScriptedExchange::new(vec![json(404, serde_json::json!({}))]);
    let trader = paired_trader(settings(5000, 5000, 1000), exchange.clone());
    let poller = trader.poller();
    let mut rx = trader.subscribe();

    assert_eq!(
        poller.poll_once().await,
        PollTick::Polled(Some(HealthSignal::PairingLost))
    );
    assert!(!trader.is_paired());
    assert!(trader.health().is_up());
    assert_eq!(drain(&mut rx), [TraderEvent::PairingLost]);

    assert_eq!(poller.poll_once().await, PollTick::Skipped);
    assert_eq!(exchange.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn spawned_poller_ticks_on_interval_until_stopped() {
    let exchange = ScriptedExchange::new(vec![json(200, snapshot_body(7))]);
    let trader = paired_trader(settings(5000, 5000, 1000), exchange.clone());

    let handle = trader.start_polling().unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    handle.shutdown().await;

    // Ticks at 0s, 1s and 2s.
    assert_eq!(exchange.request_count(), 3);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(exchange.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_stops_polling() {
    let exchange = ScriptedExchange::new(vec![json(200, snapshot_body(7))]);
    let trader = paired_trader(settings(5000, 5000, 1000), exchange.clone());
    let mut rx = trader.subscribe();

    drop(trader.start_polling().unwrap());
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(exchange.request_count(), 0);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test(start_paused = true)]
async fn second_poller_is_refused_while_first_runs() {
    let exchange = ScriptedExchange::new(vec![json(200, snapshot_body(7))]);
    let trader = paired_trader(settings(5000, 5000, 1000), exchange.clone());

    let handle = trader.start_polling().unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(
        trader.clone().start_polling().unwrap_err(),
        PollerError::AlreadyRunning
    );

    // Ticks at 0s, 1s and 2s from the single running poller.
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(exchange.request_count(), 3);

    handle.shutdown().await;
    let restarted = trader.start_polling().unwrap();
    restarted.shutdown().await;
}

#[tokio::test]
async fn re_pairing_during_poll_discards_the_result() {
    let exchange = GatedExchange::new(json(200, snapshot_body(9)));
    let trader = paired_trader(settings(5000, 5000, 1000), exchange.clone());
    let mut rx = trader.subscribe();

    let poller = trader.poller();
    let tick = tokio::spawn(async move { poller.poll_once().await });
    exchange.started.notified().await;

    trader.pair(PairingSession::new(
        "other.local",
        3000,
        Fingerprint::of_certificate(b"other-server-certificate"),
    ));
    exchange.release();

    assert_eq!(tick.await.unwrap(), PollTick::Discarded);
    assert!(trader.market_snapshot().is_none());
    assert!(trader.health().is_up());
    assert_eq!(trader.session().unwrap().host, "other.local");
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn unpair_during_failing_poll_reports_nothing() {
    let exchange = GatedExchange::new(json(500, serde_json::json!({"err": "db offline"})));
    let trader = paired_trader(settings(5000, 5000, 1000), exchange.clone());
    let mut rx = trader.subscribe();

    let poller = trader.poller();
    let tick = tokio::spawn(async move { poller.poll_once().await });
    exchange.started.notified().await;

    trader.unpair();
    exchange.release();

    assert_eq!(tick.await.unwrap(), PollTick::Discarded);
    assert!(trader.health().is_up());
    assert!(drain(&mut rx).is_empty());
}

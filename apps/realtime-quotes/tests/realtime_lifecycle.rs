//! Realtime Manager Lifecycle Tests
//!
//! Drives the connection state machine, refresh loop, heartbeat, backoff
//! and network handling against a scripted source on a paused clock.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::time::Duration;

use rust_decimal_macros::dec;

use common::{Harness, settle};
use realtime_quotes::infrastructure::mock::sample_quote;
use realtime_quotes::{
    ConnectionChange, ConnectionState, EventKind, QuoteSourceError, RealtimeEvent, SyncError,
};

// =============================================================================
// Connect and Refresh
// =============================================================================

#[tokio::test(start_paused = true)]
async fn connect_starts_refresh_for_existing_subscriptions() {
    let h = Harness::new();
    h.source.set_quote("SHOP.TO", sample_quote("SHOP.TO", dec!(101.25)));
    assert!(h.service.subscribe("shop.to").unwrap());

    h.service.connect().await;
    settle().await;

    assert_eq!(h.state(), ConnectionState::Connected);
    assert_eq!(
        h.events.changes(),
        vec![
            (ConnectionState::Connecting, ConnectionChange::Attempt),
            (ConnectionState::Connected, ConnectionChange::Established),
        ]
    );
    assert_eq!(h.source.batch_calls(), 1);
    assert_eq!(h.source.last_batch(), vec!["SHOP.TO"]);

    let update = h
        .events
        .all()
        .into_iter()
        .find_map(|e| match e {
            RealtimeEvent::PriceUpdate { symbol, quote, .. } => Some((symbol, quote.price)),
            _ => None,
        })
        .unwrap();
    assert_eq!(update, ("SHOP.TO".to_string(), dec!(101.25)));
    assert!(h.service.connection_state().last_update_time.is_some());
}

#[tokio::test(start_paused = true)]
async fn refresh_runs_every_thirty_seconds() {
    let h = Harness::new();
    h.service.subscribe("RY.TO").unwrap();
    h.service.connect().await;
    settle().await;
    assert_eq!(h.source.batch_calls(), 1);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(h.source.batch_calls(), 2);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.source.batch_calls(), 3);
    assert_eq!(h.events.count(EventKind::PriceUpdateCompleted), 3);
}

#[tokio::test(start_paused = true)]
async fn subscribing_while_connected_arms_refresh() {
    let h = Harness::new();
    h.service.connect().await;
    settle().await;
    assert_eq!(h.source.batch_calls(), 0);
    assert_eq!(h.events.count(EventKind::PriceUpdatesStarted), 0);

    h.service.subscribe("TD.TO").unwrap();
    settle().await;

    assert_eq!(h.events.count(EventKind::PriceUpdatesStarted), 1);
    assert_eq!(h.source.batch_calls(), 1);

    // A second symbol joins the running loop instead of arming another.
    h.service.subscribe("BMO.TO").unwrap();
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(h.events.count(EventKind::PriceUpdatesStarted), 1);
    assert_eq!(h.source.last_batch(), vec!["BMO.TO", "TD.TO"]);
}

#[tokio::test(start_paused = true)]
async fn removing_last_subscription_stops_refresh() {
    let h = Harness::new();
    h.service.subscribe("ENB.TO").unwrap();
    h.service.connect().await;
    settle().await;

    assert!(h.service.unsubscribe("enb.to").unwrap());
    assert!(!h.service.unsubscribe("ENB.TO").unwrap());
    assert_eq!(h.events.count(EventKind::PriceUpdatesStopped), 1);

    let calls = h.source.batch_calls();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.source.batch_calls(), calls);
    assert_eq!(h.state(), ConnectionState::Connected);

    let completed = h.events.count(EventKind::PriceUpdateCompleted);
    h.service.subscribe("ENB.TO").unwrap();
    settle().await;
    assert_eq!(h.events.count(EventKind::PriceUpdatesStarted), 2);
    assert_eq!(h.events.count(EventKind::PriceUpdateCompleted), completed + 1);
}

#[tokio::test(start_paused = true)]
async fn one_arm_covers_symbols_subscribed_before_connect() {
    let h = Harness::new();
    h.service.subscribe("SHOP.TO").unwrap();
    h.service.subscribe("RY.TO").unwrap();

    h.service.connect().await;
    settle().await;

    let armed: Vec<_> = h
        .events
        .all()
        .into_iter()
        .filter_map(|e| match e {
            RealtimeEvent::PriceUpdatesStarted { symbols, .. } => Some(symbols),
            _ => None,
        })
        .collect();
    assert_eq!(armed, vec![vec!["RY.TO".to_string(), "SHOP.TO".to_string()]]);

    let batch_sizes: Vec<_> = h
        .events
        .all()
        .into_iter()
        .filter_map(|e| match e {
            RealtimeEvent::PriceUpdateCompleted { quotes, .. } => Some(quotes.len()),
            _ => None,
        })
        .collect();
    assert_eq!(batch_sizes, vec![2]);
}

#[tokio::test(start_paused = true)]
async fn slow_batches_never_overlap() {
    let h = Harness::new();
    h.service.subscribe("CNQ.TO").unwrap();
    h.service.connect().await;
    settle().await;
    assert_eq!(h.source.batch_calls(), 1);

    // Batches from t=30 take longer than the refresh period.
    h.source.set_latency(Duration::from_secs(45));
    tokio::time::sleep(Duration::from_secs(100)).await;

    assert_eq!(h.source.batch_calls(), 3);
    assert_eq!(h.source.peak_batches_in_flight(), 1);

    // The tick missed during the slow cycle fires as soon as it ends.
    let starts: Vec<_> = h
        .events
        .timed()
        .into_iter()
        .filter(|(_, e)| e.kind() == EventKind::PriceUpdateStarted)
        .map(|(at, _)| at)
        .collect();
    assert_eq!(starts.len(), 3);
    let gap = starts[2] - starts[1];
    assert!(
        (Duration::from_secs(44)..=Duration::from_secs(46)).contains(&gap),
        "gap {gap:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn response_arriving_after_destroy_is_ignored() {
    let h = Harness::new();
    h.service.subscribe("SU.TO").unwrap();
    h.service.connect().await;
    settle().await;

    h.source.set_latency(Duration::from_secs(45));
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(h.source.batch_calls(), 2);

    h.service.destroy();
    h.events.clear();
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert!(h.events.all().is_empty(), "{:?}", h.events.kinds());
    assert_eq!(h.source.batch_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn duplicate_and_invalid_subscriptions() {
    let h = Harness::new();
    assert!(h.service.subscribe("cnr.to").unwrap());
    assert!(!h.service.subscribe(" CNR.TO ").unwrap());
    assert!(h.service.subscribe("   ").is_err());

    assert_eq!(h.service.subscriptions(), vec!["CNR.TO"]);
    assert_eq!(h.events.count(EventKind::SymbolSubscribed), 1);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test(start_paused = true)]
async fn partial_failure_keeps_connection() {
    let h = Harness::new();
    h.source.fail_symbol("BAD.TO", QuoteSourceError::network("timeout"));
    h.service.subscribe("RY.TO").unwrap();
    h.service.subscribe("BAD.TO").unwrap();

    h.service.connect().await;
    settle().await;

    let kinds = h.events.kinds();
    let completed = kinds
        .iter()
        .position(|k| *k == EventKind::PriceUpdateCompleted)
        .unwrap();
    let error = kinds
        .iter()
        .position(|k| *k == EventKind::PriceUpdateError)
        .unwrap();
    assert!(completed < error);
    assert_eq!(h.events.count(EventKind::PriceUpdate), 1);
    assert_eq!(h.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn batch_failure_drops_connection_and_retries() {
    let h = Harness::new();
    h.service.subscribe("SU.TO").unwrap();
    h.service.connect().await;
    settle().await;
    h.events.clear();

    h.source.fail_batch(QuoteSourceError::network("connection reset"));
    tokio::time::sleep(Duration::from_secs(35)).await;

    let changes = h.events.changes();
    assert!(matches!(
        changes.first(),
        Some((ConnectionState::Disconnected, ConnectionChange::Lost { .. }))
    ));
    assert_eq!(h.events.count(EventKind::PriceUpdateError), 1);

    // The probe still succeeds, so the first retry reconnects.
    assert_eq!(h.state(), ConnectionState::Connected);
    assert_eq!(h.service.connection_state().reconnect_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn rate_limited_batch_keeps_connection() {
    let h = Harness::new();
    h.service.subscribe("SU.TO").unwrap();
    h.source.fail_batch(QuoteSourceError::RateLimited {
        message: "slow down".to_string(),
    });
    h.service.connect().await;
    settle().await;

    assert_eq!(h.events.count(EventKind::PriceUpdateError), 1);
    assert_eq!(h.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn backoff_doubles_until_exhausted() {
    let h = Harness::new();
    h.source.fail_probe(QuoteSourceError::network("unreachable"));

    h.service.connect().await;
    tokio::time::sleep(Duration::from_secs(120)).await;

    let timed = h.events.timed();
    let mut attempts = Vec::new();
    let mut gaps = Vec::new();
    for (i, (at, event)) in timed.iter().enumerate() {
        if let RealtimeEvent::ConnectionStateChanged {
            change: ConnectionChange::Reconnecting { attempt, max_attempts },
            ..
        } = event
        {
            assert_eq!(*max_attempts, 5);
            attempts.push(*attempt);
            let next_attempt = timed[i + 1..]
                .iter()
                .find(|(_, e)| {
                    matches!(
                        e,
                        RealtimeEvent::ConnectionStateChanged {
                            change: ConnectionChange::Attempt,
                            ..
                        }
                    )
                })
                .map(|(t, _)| *t)
                .unwrap();
            gaps.push(next_attempt - *at);
        }
    }

    assert_eq!(attempts, vec![1, 2, 3, 4, 5]);
    assert_eq!(gaps, [1, 2, 4, 8, 16].map(Duration::from_secs).to_vec());
    assert_eq!(
        h.events.last_change(),
        Some(ConnectionChange::RetriesExhausted { max_attempts: 5 })
    );
    assert_eq!(h.state(), ConnectionState::Disconnected);
    assert_eq!(h.source.probe_calls(), 6);

    // Terminal: nothing else happens on its own.
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(h.source.probe_calls(), 6);
}

#[tokio::test(start_paused = true)]
async fn explicit_connect_after_exhaustion_starts_over() {
    let h = Harness::new();
    h.source.fail_probe(QuoteSourceError::network("unreachable"));
    h.service.connect().await;
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.service.connection_state().reconnect_attempts, 5);

    h.source.heal_probe();
    h.service.connect().await;

    assert_eq!(h.state(), ConnectionState::Connected);
    assert_eq!(h.service.connection_state().reconnect_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn missing_credentials_are_not_retried() {
    let h = Harness::new();
    h.source.fail_probe(QuoteSourceError::MissingCredentials);

    h.service.connect().await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(h.source.probe_calls(), 1);
    assert!(matches!(
        h.events.last_change(),
        Some(ConnectionChange::Failed { .. })
    ));
    assert_eq!(h.state(), ConnectionState::Disconnected);
}

// =============================================================================
// Heartbeat
// =============================================================================

#[tokio::test(start_paused = true)]
async fn heartbeat_fires_every_minute() {
    let h = Harness::new();
    h.service.connect().await;

    tokio::time::sleep(Duration::from_secs(59)).await;
    assert_eq!(h.events.count(EventKind::Heartbeat), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.events.count(EventKind::Heartbeat), 1);
    assert!(h.service.connection_state().last_heartbeat.is_some());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.events.count(EventKind::Heartbeat), 2);
}

#[tokio::test(start_paused = true)]
async fn heartbeat_failure_drops_connection() {
    let h = Harness::new();
    h.service.connect().await;
    h.source.fail_probe(QuoteSourceError::network("dns failure"));

    tokio::time::sleep(Duration::from_secs(61)).await;

    assert_eq!(h.events.count(EventKind::HeartbeatFailed), 1);
    assert!(h.events.changes().iter().any(|(state, change)| {
        *state == ConnectionState::Disconnected && matches!(change, ConnectionChange::Lost { .. })
    }));
    assert_ne!(h.state(), ConnectionState::Connected);

    h.source.heal_probe();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.state(), ConnectionState::Connected);
}

// =============================================================================
// Network
// =============================================================================

#[tokio::test(start_paused = true)]
async fn offline_stops_everything_and_online_reconnects() {
    let h = Harness::new();
    h.service.subscribe("RY.TO").unwrap();
    h.service.connect().await;
    settle().await;
    h.events.clear();

    h.network.set_online(false);
    settle().await;

    let snapshot = h.service.connection_state();
    assert!(!snapshot.is_online);
    assert_eq!(snapshot.state, ConnectionState::Disconnected);
    assert_eq!(
        h.events.kinds()[..3],
        [
            EventKind::NetworkStateChanged,
            EventKind::PriceUpdatesStopped,
            EventKind::ConnectionStateChanged,
        ]
    );
    assert_eq!(h.events.last_change(), Some(ConnectionChange::Offline));

    let calls = h.source.batch_calls();
    assert_eq!(h.service.sync_data().await.unwrap_err(), SyncError::NotConnected);
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(h.source.batch_calls(), calls);

    h.network.set_online(true);
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(h.state(), ConnectionState::Connected);
    assert_eq!(h.events.count(EventKind::PriceUpdatesStarted), 1);
    assert_eq!(h.source.batch_calls(), calls + 1);
}

#[tokio::test(start_paused = true)]
async fn failure_while_offline_postpones_retry() {
    let h = Harness::new();
    h.network.set_online(false);
    settle().await;
    h.source.fail_probe(QuoteSourceError::network("offline"));

    h.service.connect().await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.source.probe_calls(), 1);
    assert_eq!(h.events.count(EventKind::ConnectionStateChanged), 2);

    h.source.heal_probe();
    h.network.set_online(true);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.state(), ConnectionState::Connected);
}

// =============================================================================
// Sync and Teardown
// =============================================================================

#[tokio::test(start_paused = true)]
async fn sync_requires_connection() {
    let h = Harness::new();
    h.service.subscribe("RY.TO").unwrap();

    assert_eq!(h.service.sync_data().await.unwrap_err(), SyncError::NotConnected);
    assert_eq!(h.source.batch_calls(), 0);
    assert_eq!(h.events.count(EventKind::SyncStarted), 0);
}

#[tokio::test(start_paused = true)]
async fn sync_fetches_every_subscription() {
    let h = Harness::new();
    h.service.subscribe("RY.TO").unwrap();
    h.service.subscribe("TD.TO").unwrap();
    h.service.connect().await;
    settle().await;

    let batch = h.service.sync_data().await.unwrap();
    assert_eq!(batch.len(), 2);
    assert!(batch.success());
    assert_eq!(h.events.count(EventKind::SyncStarted), 1);
    assert_eq!(h.events.count(EventKind::SyncCompleted), 1);

    h.source.fail_batch(QuoteSourceError::RateLimited {
        message: "slow down".to_string(),
    });
    let error = h.service.sync_data().await.unwrap_err();
    assert!(matches!(error, SyncError::Source(QuoteSourceError::RateLimited { .. })));
    assert_eq!(h.events.count(EventKind::SyncError), 1);
}

#[tokio::test(start_paused = true)]
async fn disconnect_is_user_initiated() {
    let h = Harness::new();
    h.service.subscribe("RY.TO").unwrap();
    h.service.connect().await;
    settle().await;

    h.service.disconnect();
    assert_eq!(h.state(), ConnectionState::Disconnected);
    assert_eq!(h.events.last_change(), Some(ConnectionChange::UserInitiated));

    let calls = h.source.batch_calls();
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(h.source.batch_calls(), calls);
    assert_eq!(h.source.probe_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn destroy_silences_everything() {
    let h = Harness::new();
    h.service.subscribe("RY.TO").unwrap();
    h.service.connect().await;
    settle().await;

    h.service.destroy();
    h.service.destroy();
    let seen = h.events.all().len();

    assert!(h.service.is_destroyed());
    assert_eq!(h.state(), ConnectionState::Disconnected);
    assert!(!h.service.subscribe("TD.TO").unwrap());
    assert_eq!(h.service.sync_data().await.unwrap_err(), SyncError::Destroyed);

    h.network.set_online(false);
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(h.events.all().len(), seen);
    assert_eq!(h.source.batch_calls(), 1);
}

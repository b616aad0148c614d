//! Realtime Quotes Binary
//!
//! Loads the persisted watchlist, keeps a live connection to Alpha Vantage
//! and logs every quote update until interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin realtime-quotes
//! ```
//!
//! # Settings
//!
//! `ALPHA_VANTAGE_API_KEY` is needed for quotes; without it every connect
//! attempt fails with missing credentials. Everything else is optional:
//!
//! - `ALPHA_VANTAGE_BASE_URL`: Query endpoint (default: <https://www.alphavantage.co/query>)
//! - `QUOTES_REFRESH_INTERVAL_SECS`: Refresh period (default: 30)
//! - `QUOTES_HEARTBEAT_INTERVAL_SECS`: Heartbeat period (default: 60)
//! - `QUOTES_RECONNECT_BASE_MS`: First backoff delay (default: 1000)
//! - `QUOTES_MAX_RECONNECT_ATTEMPTS`: Backoff attempts (default: 5)
//! - `QUOTES_RATE_LIMIT_MS`: Minimum spacing between upstream calls (default: 12000)
//! - `QUOTES_BATCH_DELAY_MS`: Delay between symbols in a batch (default: 100)
//! - `QUOTES_NETWORK_PROBE_ADDR`: Reachability target (default: www.alphavantage.co:443)
//! - `QUOTES_HEALTH_PORT`: Health check HTTP port (default: 8083)
//! - `QUOTES_WATCHLIST_PATH`: Watchlist file (default: watchlist.json)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `RUST_LOG`: tracing filter directives

use std::sync::Arc;

use anyhow::Context;
use realtime_quotes::application::events::RealtimeEvent;
use realtime_quotes::infrastructure::alphavantage::AlphaVantageClient;
use realtime_quotes::infrastructure::health::{HealthServer, HealthServerState};
use realtime_quotes::infrastructure::network::TcpReachabilityMonitor;
use realtime_quotes::infrastructure::storage::JsonFileStore;
use realtime_quotes::infrastructure::telemetry;
use realtime_quotes::{
    MarketDataService, RealtimeConfig, RealtimeDataService, ServiceConfig, Watchlist, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let _telemetry_guard = telemetry::init().context("failed to initialize telemetry")?;

    tracing::info!("Starting realtime quotes service");

    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Prometheus recorder not installed");
    }

    let config = ServiceConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let client = Arc::new(
        AlphaVantageClient::new(config.alpha_vantage_config())
            .context("failed to build Alpha Vantage client")?,
    );
    let market_data = Arc::new(MarketDataService::with_batch_delay(
        client,
        config.batch_delay(),
    ));
    let network = TcpReachabilityMonitor::spawn(config.network.clone(), shutdown_token.child_token());

    let service = RealtimeDataService::new(RealtimeConfig::from(&config), market_data, network);
    service.init();

    let _logger = service.on_any(log_event);

    let watchlist = Watchlist::load(Arc::new(JsonFileStore::new(&config.watchlist_path)));
    for symbol in watchlist.symbols() {
        if let Err(e) = service.subscribe(&symbol) {
            tracing::warn!(symbol = %symbol, error = %e, "Skipping watchlist entry");
        }
    }
    tracing::info!(symbols = watchlist.len(), "Watchlist subscribed");

    let health_server = HealthServer::new(
        config.server.health_port,
        Arc::new(HealthServerState::new(
            env!("CARGO_PKG_VERSION").to_owned(),
            service.clone(),
        )),
        shutdown_token.child_token(),
    );
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health endpoint exited");
        }
    });

    service.connect().await;

    tracing::info!("Realtime quotes ready");

    let received = await_shutdown().await;
    tracing::info!(signal = received, "Shutting down");

    service.destroy();
    shutdown_token.cancel();

    tracing::info!("Realtime quotes stopped");
    Ok(())
}

/// Log one realtime event at a level matching its severity.
fn log_event(event: &RealtimeEvent) {
    match event {
        RealtimeEvent::PriceUpdate { symbol, quote, .. } => {
            tracing::info!(
                symbol = %symbol,
                price = %quote.price,
                change_percent = %quote.change_percent,
                "Price update"
            );
        }
        RealtimeEvent::ConnectionStateChanged { state, change, .. } => {
            tracing::info!(state = state.as_str(), change = ?change, "Connection state changed");
        }
        RealtimeEvent::PriceUpdateError { error, .. }
        | RealtimeEvent::HeartbeatFailed { error, .. }
        | RealtimeEvent::SyncError { error, .. } => {
            tracing::warn!(kind = %event.kind(), error = %error, "Realtime error");
        }
        other => tracing::debug!(kind = %other.kind(), "Realtime event"),
    }
}

fn log_config(config: &ServiceConfig) {
    tracing::info!(
        base_url = %config.alpha_vantage.base_url,
        has_api_key = config.alpha_vantage.api_key.is_some(),
        refresh_secs = config.realtime.refresh_interval.as_secs(),
        heartbeat_secs = config.realtime.heartbeat_interval.as_secs(),
        health_port = config.server.health_port,
        watchlist = %config.watchlist_path.display(),
        "Settings resolved"
    );
}

/// Read `.env` from the working directory, else from the nearest ancestor
/// that has one.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }
    let Ok(cwd) = std::env::current_dir() else {
        return;
    };
    if let Some(found) = cwd
        .ancestors()
        .skip(1)
        .map(|dir| dir.join(".env"))
        .find(|candidate| candidate.is_file())
    {
        let _ = dotenvy::from_path(found);
    }
}

/// Resolve on SIGINT or SIGTERM and name the signal. A handler that cannot
/// be installed never resolves.
async fn await_shutdown() -> &'static str {
    let interrupt = async {
        match signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                tracing::error!(error = %e, "Cannot listen for SIGINT");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal as unix_signal};
        match unix_signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                "SIGTERM"
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    }
}

#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Live TSX quotes over a polled REST API.
//!
//! The upstream API is stateless, so "connected" is a logical state: the
//! last probe or batch fetch succeeded. [`RealtimeDataService`] owns that
//! state, refreshes every subscribed symbol on a timer, heartbeats the
//! upstream, backs off on failure and reports everything as
//! [`RealtimeEvent`]s.
//!
//! ```text
//! Alpha Vantage ──► MarketDataService ──► RealtimeDataService ──► EventBus ──► listeners
//!                                          ▲       ▲
//!                        NetworkStatus ────┘       └──── Watchlist (tsx_watchlist)
//! ```
//!
//! `domain` has the plain types, `application` the manager and the ports
//! it drives, `infrastructure` the HTTP client, stores, network monitors
//! and process plumbing.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Symbols, connection states and market types.
pub mod domain;

/// Realtime manager, events and ports.
pub mod application;

/// Adapters and process plumbing.
pub mod infrastructure;

pub use domain::connection::{ConnectionSnapshot, ConnectionState};
pub use domain::market::{ChartPeriod, MarketStatus, PricePoint, Quote, StockMatch, TsxSession};
pub use domain::subscription::{Symbol, SymbolError};

pub use application::events::{ConnectionChange, EventKind, RealtimeEvent};
pub use application::ports::{
    BatchQuotes, KeyValueStore, NetworkStatus, QuoteSource, QuoteSourceError, StockDataPort,
};

pub use application::services::{
    EventBus, ListenerHandle, ListenerId, MarketDataService, RealtimeConfig, RealtimeDataService,
    SyncError, Watchlist,
};

pub use infrastructure::config::{ConfigError, ServiceConfig};
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};
pub use infrastructure::metrics::init_metrics;
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};

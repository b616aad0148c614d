//! Adapters behind the application ports, plus process plumbing.
//!
//! `alphavantage`, `network`, `storage` and `mock` implement ports.
//! `config`, `health`, `metrics` and `telemetry` are used by the binary.

/// REST client for market data.
pub mod alphavantage;

/// Environment settings.
pub mod config;

/// `/health`, `/readyz` and `/metrics` endpoint.
pub mod health;

/// Prometheus recorder and metric names.
pub mod metrics;

/// Scripted quote source.
pub mod mock;

/// Reachability monitors.
pub mod network;

/// Watchlist persistence.
pub mod storage;

/// Tracing subscriber setup.
pub mod telemetry;

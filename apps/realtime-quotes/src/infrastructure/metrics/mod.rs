//! Prometheus Metrics Module
//!
//! Exposes service metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Connection**: logical connection state, reconnect attempts, heartbeats
//! - **Subscriptions**: number of polled symbols
//! - **Refresh**: refresh cycle outcomes and durations, manual syncs
//! - **Upstream**: Alpha Vantage request counts, latency and cache hits
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port. Recording
//! before [`init_metrics`] is a no-op.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::connection::ConnectionState;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Later calls return the same handle.
///
/// # Errors
///
/// Returns [`BuildError`] if another global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Connection
    describe_gauge!(
        "realtime_quotes_connection_state",
        "Logical connection state (0=disconnected, 1=connecting, 2=connected, 3=reconnecting)"
    );
    describe_counter!(
        "realtime_quotes_reconnects_total",
        "Total reconnection attempts"
    );
    describe_gauge!(
        "realtime_quotes_reconnect_attempt",
        "Attempt number of the current backoff sequence"
    );
    describe_counter!(
        "realtime_quotes_heartbeats_total",
        "Heartbeat probes by outcome"
    );

    // Subscriptions
    describe_gauge!(
        "realtime_quotes_subscriptions",
        "Number of subscribed symbols"
    );

    // Refresh
    describe_counter!(
        "realtime_quotes_refresh_cycles_total",
        "Refresh cycles by outcome"
    );
    describe_histogram!(
        "realtime_quotes_refresh_duration_seconds",
        "Time to fetch one refresh batch"
    );
    describe_counter!("realtime_quotes_syncs_total", "Manual syncs by outcome");

    // Upstream
    describe_counter!(
        "realtime_quotes_upstream_requests_total",
        "Alpha Vantage requests by function and outcome"
    );
    describe_histogram!(
        "realtime_quotes_upstream_request_seconds",
        "Alpha Vantage request latency"
    );
    describe_counter!(
        "realtime_quotes_cache_lookups_total",
        "Response cache lookups by kind and result"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Outcome label for a refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Every symbol returned a quote.
    Success,
    /// Some symbols failed.
    Partial,
    /// Nothing came back.
    Failed,
}

impl RefreshOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

const fn outcome(ok: bool) -> &'static str {
    if ok { "success" } else { "failure" }
}

/// Update the connection state gauge.
pub fn set_connection_state(state: ConnectionState) {
    gauge!("realtime_quotes_connection_state").set(state.as_gauge());
}

/// Update the subscription gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscription_count(count: usize) {
    gauge!("realtime_quotes_subscriptions").set(count as f64);
}

/// Record one reconnect attempt.
pub fn record_reconnect_attempt(attempt: u32) {
    counter!("realtime_quotes_reconnects_total").increment(1);
    gauge!("realtime_quotes_reconnect_attempt").set(f64::from(attempt));
}

/// Record a heartbeat probe.
pub fn record_heartbeat(ok: bool) {
    counter!("realtime_quotes_heartbeats_total", "outcome" => outcome(ok)).increment(1);
}

/// Record a manual sync.
pub fn record_sync(ok: bool) {
    counter!("realtime_quotes_syncs_total", "outcome" => outcome(ok)).increment(1);
}

/// Record a completed refresh cycle.
pub fn record_refresh_cycle(result: RefreshOutcome, duration: Duration) {
    counter!("realtime_quotes_refresh_cycles_total", "outcome" => result.as_str()).increment(1);
    histogram!("realtime_quotes_refresh_duration_seconds").record(duration.as_secs_f64());
}

/// Record one upstream HTTP request.
pub fn record_upstream_request(function: &'static str, ok: bool, duration: Duration) {
    counter!(
        "realtime_quotes_upstream_requests_total",
        "function" => function,
        "outcome" => outcome(ok)
    )
    .increment(1);
    histogram!(
        "realtime_quotes_upstream_request_seconds",
        "function" => function
    )
    .record(duration.as_secs_f64());
}

/// Record a response cache lookup.
pub fn record_cache_lookup(kind: &'static str, hit: bool) {
    counter!(
        "realtime_quotes_cache_lookups_total",
        "kind" => kind,
        "result" => if hit { "hit" } else { "miss" }
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================

//! Health and Metrics HTTP Endpoint
//!
//! Reports the realtime manager's connection snapshot and serves the
//! Prometheus registry.
//!
//! # Endpoints
//!
//! - `GET /health` - JSON report: connection snapshot, TSX session, uptime
//! - `GET /healthz` - liveness, always `OK`
//! - `GET /readyz` - `READY` while connected, 503 otherwise
//! - `GET /metrics` - Prometheus text exposition

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::RealtimeDataService;
use crate::domain::connection::{ConnectionSnapshot, ConnectionState};
use crate::domain::market::MarketStatus;
use crate::infrastructure::metrics::get_metrics_handle;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

// =============================================================================
// Report
// =============================================================================

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Classification of the snapshot.
    pub status: HealthStatus,
    /// Crate version.
    pub version: String,
    /// Seconds since the state was created.
    pub uptime_secs: u64,
    /// When the report was built.
    pub checked_at: DateTime<Utc>,
    /// True once the manager has been torn down.
    pub destroyed: bool,
    /// TSX session by the local clock.
    pub market: MarketStatus,
    /// Manager snapshot.
    pub connection: ConnectionSnapshot,
}

/// Coarse service health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Connected and online.
    Healthy,
    /// A connect or backoff step is in progress.
    Degraded,
    /// Disconnected, offline or destroyed.
    Unhealthy,
}

impl HealthStatus {
    /// Classify a connection snapshot.
    #[must_use]
    pub const fn from_snapshot(snapshot: &ConnectionSnapshot) -> Self {
        if !snapshot.is_online {
            return Self::Unhealthy;
        }
        match snapshot.state {
            ConnectionState::Connected => Self::Healthy,
            ConnectionState::Connecting | ConnectionState::Reconnecting => Self::Degraded,
            ConnectionState::Disconnected => Self::Unhealthy,
        }
    }

    /// Status code for `/health`. Degraded still answers 200 so that a
    /// retrying service is not restarted by its supervisor.
    #[must_use]
    pub const fn http_status(self) -> StatusCode {
        match self {
            Self::Healthy | Self::Degraded => StatusCode::OK,
            Self::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

// =============================================================================
// Server State
// =============================================================================

/// What the handlers read from.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    service: RealtimeDataService,
}

impl HealthServerState {
    /// State reporting on `service`.
    #[must_use]
    pub fn new(version: String, service: RealtimeDataService) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            service,
        }
    }

    fn report(&self) -> HealthReport {
        let connection = self.service.connection_state();
        let destroyed = self.service.is_destroyed();
        let status = if destroyed {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::from_snapshot(&connection)
        };

        HealthReport {
            status,
            version: self.version.clone(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            checked_at: Utc::now(),
            destroyed,
            market: MarketStatus::now(),
            connection,
        }
    }
}

// =============================================================================
// Server
// =============================================================================

/// Routes served by [`HealthServer`]. Public so tests can drive it with
/// `tower::ServiceExt::oneshot`.
pub fn router(state: Arc<HealthServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(|| async { "OK" }))
        .route("/readyz", get(ready))
        .route("/metrics", get(prometheus))
        .with_state(state)
}

/// HTTP server for the health routes.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Server on `0.0.0.0:port` that stops when `cancel` fires.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Bind and serve until cancelled.
    ///
    /// # Errors
    ///
    /// [`HealthServerError::BindFailed`] if the port is taken,
    /// [`HealthServerError::ServerFailed`] if serving aborts.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let Self {
            port,
            state,
            cancel,
        } = self;

        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|e| HealthServerError::BindFailed(port, e.to_string()))?;
        tracing::info!(port, "Health endpoint listening");

        axum::serve(listener, router(state))
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!(port, "Health endpoint stopped");
        Ok(())
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn health(State(state): State<Arc<HealthServerState>>) -> Response {
    let report = state.report();
    (report.status.http_status(), Json(report)).into_response()
}

async fn ready(State(state): State<Arc<HealthServerState>>) -> Response {
    if state.service.connection_state().is_connected() {
        (StatusCode::OK, "READY").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY").into_response()
    }
}

async fn prometheus() -> Response {
    match get_metrics_handle() {
        Some(handle) => (
            [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// The port could not be bound.
    #[error("health port {0} unavailable: {1}")]
    BindFailed(u16, String),

    /// Serving stopped with an error.
    #[error("health server failed: {0}")]
    ServerFailed(String),
}

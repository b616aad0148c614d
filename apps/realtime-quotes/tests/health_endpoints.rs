//! Health Endpoint Tests
//!
//! Exercises the health router in-process.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use realtime_quotes::infrastructure::health::router;
use realtime_quotes::infrastructure::mock::ScriptedQuoteSource;
use realtime_quotes::infrastructure::network::ManualNetworkStatus;
use realtime_quotes::{HealthServerState, RealtimeConfig, RealtimeDataService, init_metrics};

fn service() -> RealtimeDataService {
    RealtimeDataService::new(
        RealtimeConfig::default(),
        Arc::new(ScriptedQuoteSource::new()),
        Arc::new(ManualNetworkStatus::new(true)),
    )
}

async fn get(service: &RealtimeDataService, uri: &str) -> (StatusCode, String) {
    let state = Arc::new(HealthServerState::new("test".to_string(), service.clone()));
    let response = router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn liveness_is_always_ok() {
    let (status, body) = get(&service(), "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn readiness_follows_connection() {
    let service = service();
    let (status, body) = get(&service, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, "NOT READY");

    service.connect().await;
    let (status, body) = get(&service, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "READY");

    service.destroy();
}

#[tokio::test]
async fn health_reports_snapshot() {
    let service = service();
    service.subscribe("RY.TO").unwrap();

    let (status, body) = get(&service, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "unhealthy");
    assert_eq!(json["version"], "test");
    assert_eq!(json["connection"]["state"], "disconnected");
    assert_eq!(json["connection"]["subscribed_symbols"][0], "RY.TO");

    service.connect().await;
    let (status, body) = get(&service, "/health").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["connection"]["state"], "connected");

    service.destroy();
    let (status, _) = get(&service, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn metrics_render_prometheus_text() {
    init_metrics().unwrap();
    let service = service();
    service.connect().await;

    let (status, body) = get(&service, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("realtime_quotes_"));

    service.destroy();
}

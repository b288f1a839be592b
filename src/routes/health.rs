use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// Root endpoint - basic status
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "Xtream Catalog Server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "runtime": "rust"
    }))
}

/// Catalog cache stats
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CatalogStats {
    entries: usize,
    in_flight: usize,
    ttl_secs: u64,
}

/// Health check response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    uptime: u64,
    accounts: usize,
    playlists: usize,
    catalog: CatalogStats,
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cache = state.query.cache();
    let stats = cache.stats();

    Json(HealthResponse {
        status: "ok",
        uptime: state.start_time.elapsed().as_secs(),
        accounts: state.accounts.account_count(),
        playlists: state.accounts.document_count(),
        catalog: CatalogStats {
            entries: stats.entries,
            in_flight: stats.in_flight,
            ttl_secs: cache.ttl().as_secs(),
        },
    })
}

/// GET /metrics - Prometheus metrics
pub async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                b"Internal Server Error".to_vec(),
            )
        }
    }
}

/// Readiness probe. Not ready until at least one account is known.
pub async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.accounts.account_count() > 0 {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready - no accounts loaded")
    }
}

/// Liveness probe
pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, "alive")
}

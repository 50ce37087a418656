//! Observability and admin handlers.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /health`: gateway process health
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "routes": state.routes().len(),
    }))
}

/// `GET /health/live`: liveness probe
pub async fn liveness() -> &'static str {
    "ok"
}

/// `GET /health/ready`: readiness probe; ready once routes are loaded
pub async fn readiness(State(state): State<AppState>) -> Response {
    if state.routes().is_empty() {
        return (StatusCode::SERVICE_UNAVAILABLE, "no routes configured").into_response();
    }
    (StatusCode::OK, "ready").into_response()
}

/// `GET /gateway/status`: breakers, upstream health, cache and metrics
pub async fn gateway_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "breakers": state.breakers.snapshots(),
        "services": state.health.all_health(),
        "cache": {
            "entries": state.cache.len(),
            "stats": state.cache.stats(),
        },
        "metrics": {
            "summary": state.collector.summary(),
            "services": state.collector.all_metrics(),
        },
    }))
}

/// `GET /metrics`: Prometheus text exposition
pub async fn metrics(State(state): State<AppState>) -> Response {
    // Health gauges are sampled at scrape time rather than per request.
    for (service, health) in state.health.all_health() {
        state
            .prometheus
            .set_upstream_health(&service, health.healthy);
    }

    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.prometheus.gather(),
    )
        .into_response()
}

/// `POST /gateway/breakers/:service/reset`: force one breaker closed
pub async fn reset_breaker(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.breakers.reset(&service) {
        return Err(ApiError::not_found(format!(
            "No circuit breaker for service: {service}"
        )));
    }
    info!(service = %service, "Breaker reset via admin endpoint");
    Ok(Json(json!({ "service": service, "state": "closed" })))
}

/// `POST /gateway/cache/clear`: drop all cached responses
pub async fn clear_cache(State(state): State<AppState>) -> Json<serde_json::Value> {
    let entries = state.cache.len();
    state.cache.clear();
    info!(entries, "Cache cleared via admin endpoint");
    Json(json!({ "cleared": entries }))
}

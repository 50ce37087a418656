//! Router assembly.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::middleware::{cors_layer, logging_middleware, request_id_middleware};
use crate::proxy::proxy_handler;
use crate::state::AppState;

/// Build the gateway router.
///
/// Observability and admin endpoints are explicit routes; everything else
/// falls through to the proxy dispatcher, which resolves the path against
/// the route table.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/health/live", get(handlers::liveness))
        .route("/health/ready", get(handlers::readiness))
        .route("/gateway/status", get(handlers::gateway_status))
        .route("/gateway/breakers/:service/reset", post(handlers::reset_breaker))
        .route("/gateway/cache/clear", post(handlers::clear_cache))
        .route("/metrics", get(handlers::metrics))
        .fallback(proxy_handler)
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors_layer())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use gateway_config::GatewayConfig;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let state = AppState::builder(GatewayConfig::default()).build().unwrap();
        create_router(state)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = test_router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unrouted_path_is_404() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/no/such/route")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_response_carries_request_id() {
        let response = test_router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_status_endpoint_shape() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/gateway/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json.get("breakers").is_some());
        assert!(json.get("cache").is_some());
        assert!(json.get("metrics").is_some());
    }

    #[tokio::test]
    async fn test_reset_unknown_breaker_is_404() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/gateway/breakers/nope/reset")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

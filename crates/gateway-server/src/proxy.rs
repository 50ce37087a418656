//! The request dispatcher.
//!
//! Every proxied request flows through the same pipeline:
//!
//! 1. Resolve a route rule for the path, or answer 404.
//! 2. Enforce the rule's auth policy; verified claims become trusted
//!    `x-user-*` headers on the upstream request.
//! 3. Fail fast with 503 only when the service's breaker is open AND the
//!    health monitor agrees the upstream is down. An open breaker alone
//!    lets the request through so a healthy upstream can close it again.
//! 4. Consult the cache for cacheable GETs. A hit is served directly and
//!    touches neither the breaker nor the request metrics.
//! 5. Forward upstream, classify the outcome for the breaker (2xx/3xx
//!    success, 5xx failure, other 4xx neutral), cache successful GETs and
//!    invalidate configured patterns after successful writes.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use gateway_core::{
    AuthClaims, CachedResponse, GatewayError, REQUEST_ID_HEADER, USER_EMAIL_HEADER,
    USER_ID_HEADER, USER_ROLES_HEADER,
};
use gateway_resilience::ResponseCache;
use gateway_routing::RouteRule;
use gateway_telemetry::{BreakerState, RequestMetric};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::extractors::{OptionalBearerToken, RequestId};
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Headers never forwarded in either direction.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

/// Proxy entry point, mounted as the router fallback
pub async fn proxy_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    OptionalBearerToken(token): OptionalBearerToken,
    request: Request,
) -> Response {
    match dispatch(&state, &request_id, token, request).await {
        Ok(response) => response,
        Err(err) => ApiError::from(err)
            .with_request_id(request_id)
            .into_response(),
    }
}

async fn dispatch(
    state: &AppState,
    request_id: &str,
    token: Option<String>,
    request: Request,
) -> Result<Response, GatewayError> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let query = request.uri().query().map(String::from);

    let routes = state.routes();
    let Some(rule) = routes.resolve(&path) else {
        return Err(GatewayError::no_route(&path));
    };

    let claims = authenticate(state, rule, &method, token).await?;

    // The availability gate comes before the cache: a service judged down
    // must answer 503 even when a fresh entry could satisfy the request.
    let breaker = state.breakers.get_or_create(&rule.service);
    if breaker.state() == gateway_resilience::CircuitState::Open
        && !state.health.is_healthy(&rule.service)
    {
        info!(service = %rule.service, "Failing fast: breaker open and upstream unhealthy");
        record_request(state, &method, &path, rule, StatusCode::SERVICE_UNAVAILABLE, 0);
        return Err(GatewayError::service_unavailable(&rule.service));
    }

    // Identity-scoped cache lookup; a hit skips breaker accounting.
    let cacheable = method == Method::GET && rule.cacheable;
    let cache_key = cacheable.then(|| {
        ResponseCache::generate_key(
            method.as_str(),
            &path,
            query.as_deref(),
            claims.as_ref().map(|c| c.user_id.as_str()),
        )
    });
    if let Some(key) = &cache_key {
        if let Some(cached) = state.cache.get(key) {
            debug!(key = %key, "Cache hit");
            state.prometheus.record_cache_lookup(true);
            return Ok(cached_response(&cached, "HIT"));
        }
        state.prometheus.record_cache_lookup(false);
    }

    let headers = request.headers().clone();
    let body = to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| GatewayError::internal(format!("Failed to read request body: {e}")))?;

    let url = upstream_url(rule, &path, query.as_deref());
    let started = Instant::now();
    let outcome = state
        .client
        .request(method.clone(), &url)
        .headers(forward_headers(&headers, request_id, claims.as_ref()))
        .body(body)
        .send()
        .await;
    let duration_ms = started.elapsed().as_millis() as u64;

    let response = match outcome {
        Ok(upstream) => upstream,
        Err(err) => {
            warn!(service = %rule.service, url = %url, error = %err, "Upstream call failed");
            breaker.record_failure();
            state
                .prometheus
                .record_error(&rule.service, "transport_error");
            record_request(
                state,
                &method,
                &path,
                rule,
                StatusCode::SERVICE_UNAVAILABLE,
                duration_ms,
            );
            sync_breaker_gauge(state, &rule.service);
            return Err(GatewayError::service_unavailable(&rule.service));
        }
    };

    let status = response.status();
    if status.is_success() || status.is_redirection() {
        breaker.record_success();
    } else if status.is_server_error() {
        breaker.record_failure();
        state
            .prometheus
            .record_error(&rule.service, "upstream_error");
    }
    sync_breaker_gauge(state, &rule.service);
    record_request(state, &method, &path, rule, status, duration_ms);

    let response_headers = response.headers().clone();
    let response_body = response
        .bytes()
        .await
        .map_err(|e| GatewayError::transport(&rule.service, e.to_string()))?;

    if let Some(key) = &cache_key {
        if status == StatusCode::OK {
            let entry = cache_entry(status, &response_headers, &response_body);
            match rule.cache_ttl {
                Some(ttl) => state.cache.insert_with_ttl(key.clone(), entry, ttl),
                None => state.cache.insert(key.clone(), entry),
            }
        }
    }

    if is_mutating(&method) && (status.is_success() || status.is_redirection()) {
        for pattern in &rule.invalidate_on_write {
            state.cache.remove_pattern(pattern);
        }
    }

    Ok(proxied_response(
        status,
        &response_headers,
        response_body,
        cacheable.then_some("MISS"),
    ))
}

/// Apply the route's auth policy, returning claims when a token verified.
///
/// A token on a route that does not require one is still verified when
/// present, so caches stay identity-scoped; its failure is not an error.
async fn authenticate(
    state: &AppState,
    rule: &RouteRule,
    method: &Method,
    token: Option<String>,
) -> Result<Option<AuthClaims>, GatewayError> {
    if rule.auth.requires_auth(method) {
        let token = token
            .ok_or_else(|| GatewayError::authentication("Missing bearer token"))?;
        return Ok(Some(state.verifier.verify(&token).await?));
    }

    match token {
        Some(token) => Ok(state.verifier.verify(&token).await.ok()),
        None => Ok(None),
    }
}

fn upstream_url(rule: &RouteRule, path: &str, query: Option<&str>) -> String {
    let base = rule.upstream.trim_end_matches('/');
    let upstream_path = rule.upstream_path(path);
    match query {
        Some(q) => format!("{base}{upstream_path}?{q}"),
        None => format!("{base}{upstream_path}"),
    }
}

/// Headers for the upstream request: caller headers minus hop-by-hop,
/// authorization and any spoofed identity headers, plus the request id and
/// the trusted identity of the verified caller.
fn forward_headers(
    incoming: &HeaderMap,
    request_id: &str,
    claims: Option<&AuthClaims>,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in incoming {
        let lower = name.as_str().to_ascii_lowercase();
        if HOP_BY_HOP.contains(&lower.as_str())
            || lower == "authorization"
            || lower.starts_with("x-user-")
        {
            continue;
        }
        headers.insert(name.clone(), value.clone());
    }

    if let Ok(value) = HeaderValue::from_str(request_id) {
        headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    if let Some(claims) = claims {
        if let Ok(value) = HeaderValue::from_str(&claims.user_id) {
            headers.insert(HeaderName::from_static(USER_ID_HEADER), value);
        }
        if let Some(email) = &claims.email {
            if let Ok(value) = HeaderValue::from_str(email) {
                headers.insert(HeaderName::from_static(USER_EMAIL_HEADER), value);
            }
        }
        if !claims.roles.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&claims.roles.join(",")) {
                headers.insert(HeaderName::from_static(USER_ROLES_HEADER), value);
            }
        }
    }
    headers
}

fn is_mutating(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn record_request(
    state: &AppState,
    method: &Method,
    path: &str,
    rule: &RouteRule,
    status: StatusCode,
    duration_ms: u64,
) {
    state.collector.record(RequestMetric::new(
        method.as_str(),
        path,
        status.as_u16(),
        duration_ms,
        &rule.service,
    ));
    state.prometheus.record_request(
        &rule.service,
        method.as_str(),
        status.as_u16(),
        std::time::Duration::from_millis(duration_ms),
    );
}

fn sync_breaker_gauge(state: &AppState, service: &str) {
    if let Some(breaker) = state.breakers.get(service) {
        let gauge_state = match breaker.state() {
            gateway_resilience::CircuitState::Closed => BreakerState::Closed,
            gateway_resilience::CircuitState::Open => BreakerState::Open,
            gateway_resilience::CircuitState::HalfOpen => BreakerState::HalfOpen,
        };
        state.prometheus.set_breaker_state(service, gauge_state);
    }
}

fn cache_entry(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> CachedResponse {
    let mut entry = CachedResponse::new(status.as_u16(), body.to_vec());
    if let Some(content_type) = headers.get("content-type").and_then(|v| v.to_str().ok()) {
        entry = entry.with_header("content-type", content_type);
    }
    entry
}

fn cached_response(cached: &CachedResponse, cache_state: &str) -> Response {
    let mut builder = axum::http::Response::builder()
        .status(StatusCode::from_u16(cached.status).unwrap_or(StatusCode::OK));
    for (name, value) in &cached.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder = builder.header("x-cache", cache_state);
    builder
        .body(Body::from(cached.body.clone()))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn proxied_response(
    status: StatusCode,
    headers: &HeaderMap,
    body: axum::body::Bytes,
    cache_state: Option<&str>,
) -> Response {
    let mut builder = axum::http::Response::builder().status(status);
    for (name, value) in headers {
        if HOP_BY_HOP.contains(&name.as_str().to_ascii_lowercase().as_str()) {
            continue;
        }
        builder = builder.header(name, value);
    }
    if let Some(cache_state) = cache_state {
        builder = builder.header("x-cache", cache_state);
    }
    builder
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_routing::AuthPolicy;

    #[test]
    fn test_upstream_url_with_query_and_rewrite() {
        let rule = RouteRule::new("/catalogue", "catalogue", "http://catalogue:8080/")
            .with_rewrite("/v2");
        assert_eq!(
            upstream_url(&rule, "/catalogue/size", Some("tags=blue")),
            "http://catalogue:8080/v2/size?tags=blue"
        );
        let plain = RouteRule::new("/carts", "carts", "http://carts:8080");
        assert_eq!(upstream_url(&plain, "/carts/u-1", None), "http://carts:8080/carts/u-1");
    }

    #[test]
    fn test_forward_headers_strip_and_inject() {
        let mut incoming = HeaderMap::new();
        incoming.insert("authorization", HeaderValue::from_static("Bearer tok"));
        incoming.insert("x-user-id", HeaderValue::from_static("spoofed"));
        incoming.insert("content-type", HeaderValue::from_static("application/json"));
        incoming.insert("connection", HeaderValue::from_static("keep-alive"));

        let claims = AuthClaims::new("u-1")
            .with_email("u@example.com")
            .with_role("customer")
            .with_role("admin");
        let headers = forward_headers(&incoming, "req-1", Some(&claims));

        assert!(headers.get("authorization").is_none());
        assert!(headers.get("connection").is_none());
        assert_eq!(headers.get("content-type").unwrap(), "application/json");
        assert_eq!(headers.get(USER_ID_HEADER).unwrap(), "u-1");
        assert_eq!(headers.get(USER_EMAIL_HEADER).unwrap(), "u@example.com");
        assert_eq!(headers.get(USER_ROLES_HEADER).unwrap(), "customer,admin");
        assert_eq!(headers.get(REQUEST_ID_HEADER).unwrap(), "req-1");
    }

    #[test]
    fn test_anonymous_forward_has_no_identity() {
        let headers = forward_headers(&HeaderMap::new(), "req-1", None);
        assert!(headers.get(USER_ID_HEADER).is_none());
        assert_eq!(headers.get(REQUEST_ID_HEADER).unwrap(), "req-1");
    }

    #[test]
    fn test_mutating_methods() {
        assert!(!is_mutating(&Method::GET));
        assert!(!is_mutating(&Method::HEAD));
        assert!(!is_mutating(&Method::OPTIONS));
        assert!(is_mutating(&Method::POST));
        assert!(is_mutating(&Method::DELETE));
    }

    #[tokio::test]
    async fn test_auth_policy_never_ignores_bad_token() {
        let state = AppState::builder(gateway_config::GatewayConfig::default())
            .build()
            .unwrap();
        let rule = RouteRule::new("/catalogue", "catalogue", "http://catalogue:8080");

        let claims = authenticate(&state, &rule, &Method::GET, Some("garbage".into()))
            .await
            .unwrap();
        assert!(claims.is_none());
    }

    #[tokio::test]
    async fn test_auth_policy_required_rejects_missing_token() {
        let state = AppState::builder(gateway_config::GatewayConfig::default())
            .build()
            .unwrap();
        let rule = RouteRule::new("/carts", "carts", "http://carts:8080")
            .with_auth(AuthPolicy::MutatingOnly);

        assert!(authenticate(&state, &rule, &Method::GET, None).await.unwrap().is_none());
        let denied = authenticate(&state, &rule, &Method::POST, None).await;
        assert!(matches!(denied, Err(GatewayError::Authentication { .. })));
    }
}

//! Request-id tagging, API-key auth, and rate limiting — the three layers
//! the teacher's `dashflow-registry` applies via `axum::middleware::from_fn`
//! (`request_id_middleware`, `auth_context_middleware`, `rate_limit_middleware`
//! in `api/middleware.rs`). The teacher's own auth layer hashes and caches
//! per-scope API keys against a database; this engine has exactly one
//! pre-shared key (`AppConfig.api_key`), so the check here is a direct
//! comparison rather than that machinery.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use super::state::{AppState, RateLimitOutcome};
use super::types::ApiErrorBody;

const REQUEST_ID_HEADER: &str = "x-request-id";
const API_KEY_HEADER: &str = "x-api-key";

fn is_unauthenticated_path(path: &str) -> bool {
    path == "/" || path.starts_with("/health")
}

/// Status polling is exempt from the per-key rate limit (spec §6: "status
/// polling effectively unlimited").
fn is_status_poll(method: &axum::http::Method, path: &str) -> bool {
    method == axum::http::Method::GET
        && (path.starts_with("/api/v1/scoring-jobs/") || path.starts_with("/api/v1/profiles/"))
}

/// Reads (or generates) `X-Request-Id`, stashes it as a request extension,
/// and echoes it on the response — every response carries one, success or
/// error (SPEC_FULL §6).
pub async fn request_id_middleware(mut req: Request<Body>, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    req.headers_mut().insert(
        REQUEST_ID_HEADER,
        HeaderValue::from_str(&request_id).unwrap_or_else(|_| HeaderValue::from_static("invalid")),
    );

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn unauthorized() -> Response {
    let body = ApiErrorBody {
        error_code: "UNAUTHORIZED".to_string(),
        message: "missing or invalid X-API-Key".to_string(),
        details: None,
        suggestions: Vec::new(),
    };
    (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
}

/// Compares the caller-supplied `X-API-Key` against the configured
/// pre-shared key. `/health*` and `/` are exempt (spec §6 lists them
/// alongside the authenticated surface but liveness/readiness probes must
/// not themselves require credentials).
pub async fn auth_middleware(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    if is_unauthenticated_path(req.uri().path()) {
        return next.run(req).await;
    }

    let supplied = req.headers().get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    match supplied {
        Some(key) if key == state.config.api_key => next.run(req).await,
        _ => unauthorized(),
    }
}

fn rate_limited(retry_after_secs: u64) -> Response {
    let body = ApiErrorBody {
        error_code: "RATE_LIMITED".to_string(),
        message: "request rate limit exceeded".to_string(),
        details: Some(serde_json::json!({ "retry_after_secs": retry_after_secs })),
        suggestions: vec!["retry after the window resets".to_string()],
    };
    let mut response = (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
        response.headers_mut().insert("retry-after", value);
    }
    response
}

/// Enforces the `<= 100 requests per key per hour` limit (spec §6), keyed
/// on the caller's API key (falling back to `"anonymous"` pre-auth so the
/// limiter never panics on a missing header — the auth layer will have
/// already rejected that request by the time this matters in practice).
pub async fn rate_limit_middleware(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let path = req.uri().path().to_string();
    if is_unauthenticated_path(&path) || is_status_poll(req.method(), &path) {
        return next.run(req).await;
    }

    let key = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("anonymous")
        .to_string();

    match state.rate_limiter.check_and_increment(&key).await {
        RateLimitOutcome::Allowed { remaining } => {
            let mut response = next.run(req).await;
            if let Ok(value) = HeaderValue::from_str(&remaining.to_string()) {
                response.headers_mut().insert("x-ratelimit-remaining", value);
            }
            response
        }
        RateLimitOutcome::Limited { retry_after_secs } => rate_limited(retry_after_secs),
    }
}

//! Router assembly and the HTTP listener, mirroring the teacher's
//! `build_router()` / server-bootstrap split in
//! `dashflow-registry/src/api/server.rs`. Middleware order (innermost to
//! outermost): request-id, auth, rate limit, optional CORS, then the body
//! size limit applied last so it rejects oversized bodies before anything
//! else runs.

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::middleware::{auth_middleware, rate_limit_middleware, request_id_middleware};
use super::routes;
use super::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let server = state.server.clone();

    let mut router: Router<AppState> = routes::api_router()
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(TraceLayer::new_for_http());

    if server.cors_enabled {
        if server.cors_origins.is_empty() {
            tracing::warn!("cors_enabled is set but cors_origins is empty; no CORS headers will be added");
        } else {
            let origins = server
                .cors_origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect::<Vec<_>>();
            router = router.layer(CorsLayer::new().allow_methods(Any).allow_headers(Any).allow_origin(origins));
        }
    }

    router.with_state(state).layer(RequestBodyLimitLayer::new(server.max_body_size))
}

/// Binds and serves the router on `state.config.port` until the process is
/// asked to stop.
pub async fn serve(state: AppState) -> std::io::Result<()> {
    let port = state.config.port;
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "profile-forge listening");
    axum::serve(listener, router).await
}

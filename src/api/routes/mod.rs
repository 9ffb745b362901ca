//! Route tree assembly, mirroring the teacher's `api_router` (nested
//! per-resource routers merged under one prefix, health merged separately).

pub mod companies;
pub mod health;
pub mod profiles;
pub mod scoring;
pub mod templates;

use axum::Router;

use crate::api::state::AppState;

pub fn api_router() -> Router<AppState> {
    let v1 = Router::new()
        .merge(profiles::routes())
        .merge(scoring::routes())
        .nest("/companies", companies::routes())
        .nest("/templates", templates::routes());

    Router::new().nest("/api/v1", v1).merge(health::health_routes())
}

//! `/health`, `/health/detailed`, `/health/linkedin` — liveness, readiness,
//! and deep probe (spec §6, §4.9), mirroring the teacher's
//! `health_routes()`/`readiness_check()` shape but exercising this engine's
//! own dependency (the workflow client) instead of the teacher's
//! cache/search/metadata stack.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::api::state::AppState;
use crate::health::{HealthReport, HealthStatus};

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(liveness))
        .route("/health/detailed", get(readiness))
        .route("/health/linkedin", get(deep_probe))
}

#[derive(Debug, Clone, Serialize)]
struct ServiceInfo {
    name: &'static str,
    version: &'static str,
    description: &'static str,
}

async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        description: "profile ingestion, enrichment, and LLM scoring engine",
    })
}

#[derive(Debug, Clone, Serialize)]
struct Liveness {
    status: &'static str,
}

/// Always 200: process is up and accepting connections. Never touches a
/// dependency.
async fn liveness() -> Json<Liveness> {
    Json(Liveness { status: "alive" })
}

fn status_for(report: &HealthReport) -> StatusCode {
    match report.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Fast reachability probe of the workflow profile endpoint
/// ([`crate::health::HealthValidator::quick_check`]).
async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.health.quick_check().await;
    (status_for(&report), Json(report))
}

/// Full probe: fetches and adapts both a profile and an organization test
/// fixture and scores field completeness
/// ([`crate::health::HealthValidator::comprehensive_check`]).
async fn deep_probe(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.health.comprehensive_check().await;
    (status_for(&report), Json(report))
}

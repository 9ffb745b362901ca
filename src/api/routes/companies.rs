//! `/api/v1/companies` — read-only organization lookup (spec §6).

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::state::AppState;
use crate::canonical::CanonicalOrganization;
use crate::error::{AppError, Result};

pub fn routes() -> Router<AppState> {
    Router::new().route("/{id}", get(get_company))
}

async fn get_company(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<CanonicalOrganization>> {
    let organization = state
        .organizations
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::OrganizationNotFound(id.to_string()))?;
    Ok(Json(organization))
}

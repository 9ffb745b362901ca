//! `/api/v1/profiles` — list, fetch, ingest, delete (spec §6).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::state::AppState;
use crate::api::types::{IncludeCompaniesQuery, IngestProfileRequest, ProfileDetail, ProfileListQuery, ProfileListResponse};
use crate::canonical::{normalize_url, CanonicalOrganization};
use crate::error::{AppError, Result};
use crate::orchestrator::IngestionRequest;
use crate::persistence::{ListParams, Pagination, ProfileFilter, ProfileSortKey, SortOrder};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profiles", get(list_profiles).post(ingest_profile))
        .route("/profiles/{id}", get(get_profile).delete(delete_profile))
}

async fn list_profiles(
    State(state): State<AppState>,
    Query(query): Query<ProfileListQuery>,
) -> Result<Json<ProfileListResponse>> {
    let sort_by = match &query.sort_by {
        Some(raw) => ProfileSortKey::parse(raw)?,
        None => ProfileSortKey::CreatedAt,
    };
    let sort_order = SortOrder::parse(query.sort_order.as_deref())?;
    let pagination = Pagination::new(query.limit, query.offset)?;

    let linkedin_url = query.linkedin_url.map(|raw| normalize_url(&raw)).transpose()?;
    let filter = ProfileFilter {
        linkedin_url,
        name: query.name,
        company: query.company,
    };
    let params = ListParams { sort_by, sort_order, pagination };

    let page = state.profiles.list(filter, params).await?;
    let has_more = page.has_more(&pagination);
    Ok(Json(ProfileListResponse {
        items: page.items,
        total: page.total,
        limit: pagination.limit,
        offset: pagination.offset,
        has_more,
    }))
}

async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<IncludeCompaniesQuery>,
) -> Result<Json<ProfileDetail>> {
    let profile = state
        .profiles
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::ProfileNotFound(id.to_string()))?;

    let companies = if query.include_companies.unwrap_or(false) {
        Some(linked_organizations(&state, profile.id).await?)
    } else {
        None
    };

    Ok(Json(ProfileDetail { profile, companies }))
}

/// Resolves a profile's linked organizations, one entry per distinct
/// organization — several edges can point at the same organization (an
/// experience list citing it more than once), but the company list a
/// caller sees should not repeat a row.
pub(super) async fn linked_organizations(state: &AppState, profile_id: Uuid) -> Result<Vec<CanonicalOrganization>> {
    let edges = state.edges.list_for_profile(profile_id).await?;
    let mut seen = std::collections::HashSet::with_capacity(edges.len());
    let mut organizations = Vec::with_capacity(edges.len());
    for edge in edges {
        if !seen.insert(edge.organization_id) {
            continue;
        }
        if let Some(org) = state.organizations.get_by_id(edge.organization_id).await? {
            organizations.push(org);
        }
    }
    Ok(organizations)
}

async fn ingest_profile(
    State(state): State<AppState>,
    Json(request): Json<IngestProfileRequest>,
) -> Result<(StatusCode, Json<ProfileDetail>)> {
    // Validates the URL up front so a malformed value never reaches the
    // external workflow call (§6 400 invalid URL); the orchestrator still
    // fetches with the caller's raw string, per its own contract.
    normalize_url(&request.linkedin_url)?;

    let mut ingestion = IngestionRequest::new(request.linkedin_url);
    ingestion.include_organizations = request.include_companies;

    let (_request_id, enriched) = state.orchestrator.process_profile(ingestion, None).await?;

    if !enriched.created {
        return Err(AppError::ProfileAlreadyExists {
            existing_id: enriched.profile.id.to_string(),
        });
    }

    let companies = enriched.organizations.into_iter().flatten().collect();
    Ok((
        StatusCode::CREATED,
        Json(ProfileDetail {
            profile: enriched.profile,
            companies: Some(companies),
        }),
    ))
}

async fn delete_profile(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    if state.profiles.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::ProfileNotFound(id.to_string()))
    }
}

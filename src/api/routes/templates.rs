//! `/api/v1/templates` — standard CRUD over prompt templates (spec §6, §4.8).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::state::AppState;
use crate::api::types::{CreateTemplateRequest, UpdateTemplateRequest};
use crate::error::Result;
use crate::template::PromptTemplate;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_templates).post(create_template))
        .route("/{id}", get(get_template).put(update_template).delete(deactivate_template))
}

async fn list_templates(State(state): State<AppState>) -> Result<Json<Vec<PromptTemplate>>> {
    Ok(Json(state.templates.list().await?))
}

async fn get_template(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<PromptTemplate>> {
    Ok(Json(state.templates.get(id).await?))
}

async fn create_template(
    State(state): State<AppState>,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<PromptTemplate>)> {
    let template = PromptTemplate::new(
        request.name,
        request.description,
        request.category,
        request.prompt,
        request.version,
    )?;
    let created = state.templates.create(template).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateTemplateRequest>,
) -> Result<Json<PromptTemplate>> {
    let mut template = state.templates.get(id).await?;
    if let Some(name) = request.name {
        template.name = name;
    }
    if let Some(description) = request.description {
        template.description = Some(description);
    }
    if let Some(category) = request.category {
        template.category = category;
    }
    if let Some(prompt) = request.prompt {
        template.prompt = prompt;
    }
    if let Some(version) = request.version {
        template.version = version;
    }
    template.updated_at = chrono::Utc::now();

    Ok(Json(state.templates.update(template).await?))
}

async fn deactivate_template(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    state.templates.deactivate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

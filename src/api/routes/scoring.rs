//! Scoring job creation, status, and retry (spec §6, §4.7).
//!
//! Job creation always returns the freshly created `pending` snapshot —
//! the actual LLM call happens out-of-band, either synchronously right
//! after creation (when `AppConfig.enable_async_processing` is off, useful
//! for tests) or picked up by the background worker pool.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::state::AppState;
use crate::api::types::CreateScoringJobRequest;
use crate::error::Result;
use crate::scoring::ScoringJob;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profiles/{id}/score", post(create_scoring_job))
        .route("/scoring-jobs/{id}", get(get_scoring_job))
        .route("/scoring-jobs/{id}/retry", post(retry_scoring_job))
}

async fn create_scoring_job(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
    Json(request): Json<CreateScoringJobRequest>,
) -> Result<Json<ScoringJob>> {
    let job = state
        .scoring
        .create_job(
            profile_id,
            request.prompt,
            request.template_id,
            request.model,
            request.max_tokens,
            request.temperature,
        )
        .await?;

    if state.config.enable_async_processing {
        let _ = state.job_queue.send(job.id);
    } else if let Some(processed) = state.scoring.process_one(job.id).await? {
        return Ok(Json(processed));
    }

    Ok(Json(job))
}

async fn get_scoring_job(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<ScoringJob>> {
    Ok(Json(state.scoring.get_job(id).await?))
}

async fn retry_scoring_job(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<ScoringJob>> {
    let job = state.scoring.retry_job(id).await?;

    if state.config.enable_async_processing {
        let _ = state.job_queue.send(job.id);
    } else if let Some(processed) = state.scoring.process_one(job.id).await? {
        return Ok(Json(processed));
    }

    Ok(Json(job))
}

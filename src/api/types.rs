//! HTTP request/response shapes and the `AppError` → envelope mapping.
//!
//! Most read responses are the canonical types themselves ([`CanonicalProfile`],
//! [`CanonicalOrganization`], [`ScoringJob`], [`PromptTemplate`]) — they are
//! already `Serialize`, so there is no separate DTO layer for them. The
//! types here cover request bodies, the paginated list envelope, and the
//! single error envelope every failure is translated into (spec §6, §7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::canonical::{CanonicalOrganization, CanonicalProfile};
use crate::error::AppError;
use crate::scoring::ScoringJob;
use crate::template::PromptTemplate;

/// `{ error_code, message, details?, suggestions? }`, the one shape every
/// failure response takes (spec §6, §7).
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorBody {
    pub error_code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ApiErrorBody {
            error_code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
            suggestions: self.suggestion().into_iter().collect(),
        };
        (status, Json(body)).into_response()
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestProfileRequest {
    pub linkedin_url: String,
    #[serde(default = "default_true")]
    pub include_companies: bool,
}

/// `GET /api/v1/profiles/{id}` and the ingestion response: the profile plus
/// an optional embedded list of linked organizations.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileDetail {
    #[serde(flatten)]
    pub profile: CanonicalProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub companies: Option<Vec<CanonicalOrganization>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProfileListQuery {
    pub linkedin_url: Option<String>,
    pub name: Option<String>,
    pub company: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct IncludeCompaniesQuery {
    pub include_companies: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileListResponse {
    pub items: Vec<CanonicalProfile>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
    pub has_more: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateScoringJobRequest {
    pub prompt: Option<String>,
    pub template_id: Option<Uuid>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub prompt: String,
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub prompt: Option<String>,
    pub version: Option<u32>,
}

/// Re-exported so route modules don't need to import the canonical/scoring
/// crates directly just to name the response type.
pub type ScoringJobResponse = ScoringJob;
pub type TemplateResponse = PromptTemplate;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_incomplete_envelope_carries_missing_fields() {
        let err = AppError::AdapterIncomplete {
            missing_fields: vec!["full_name".to_string()],
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn profile_already_exists_envelope_is_409_with_suggestion() {
        let err = AppError::ProfileAlreadyExists {
            existing_id: "abc".to_string(),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}

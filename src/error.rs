//! Crate-wide error type.
//!
//! One flat enum, matching every fallible operation in the engine. HTTP
//! handlers map this into the public `{ error_code, message, details,
//! suggestions }` envelope; nothing downstream of `AppError` should need to
//! pattern-match on upstream error types directly.

use serde_json::Value;
use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors that can occur anywhere in the ingestion, scoring, or persistence
/// layers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    /// The supplied profile URL failed syntactic validation.
    #[error("invalid profile URL: {0}")]
    InvalidProfileUrl(String),

    /// No profile exists with the given id or normalized URL.
    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    /// No organization exists with the given id or normalized URL.
    #[error("organization not found: {0}")]
    OrganizationNotFound(String),

    /// No scoring job exists with the given id.
    #[error("scoring job not found: {0}")]
    JobNotFound(String),

    /// No prompt template exists with the given id.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// A profile with this normalized URL already exists.
    #[error("profile already exists: {existing_id}")]
    ProfileAlreadyExists {
        /// Internal id of the pre-existing profile.
        existing_id: String,
    },

    /// The adapter could not build a canonical record because essential
    /// fields were absent from the upstream payload.
    #[error("incomplete upstream payload, missing: {missing_fields:?}")]
    AdapterIncomplete {
        /// Canonical field paths that were required but absent.
        missing_fields: Vec<String>,
    },

    /// The external workflow or LLM endpoint failed. `retryable` distinguishes
    /// a transient failure (network error, 5xx, 429 — worth retrying) from a
    /// terminal one (any other 4xx — retrying would just repeat the failure).
    #[error("upstream unavailable: {message}")]
    UpstreamUnavailable { message: String, retryable: bool },

    /// A request was rejected because of a local or upstream rate limit.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// A scoring job retry was attempted but the job is not eligible.
    #[error("job not retryable: {0}")]
    JobNotRetryable(String),

    /// A listing request used a sort key outside the declared allow-list.
    #[error("invalid sort key: {0}")]
    InvalidSortKey(String),

    /// A listing request used a pagination parameter outside its bounds.
    #[error("invalid pagination: {0}")]
    InvalidPagination(String),

    /// Generic validation failure not covered by a more specific variant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unclassified internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable, caller-visible error code for the HTTP envelope.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidProfileUrl(_) => "INVALID_LINKEDIN_URL",
            AppError::ProfileNotFound(_) => "PROFILE_NOT_FOUND",
            AppError::OrganizationNotFound(_) => "ORGANIZATION_NOT_FOUND",
            AppError::JobNotFound(_) => "JOB_NOT_FOUND",
            AppError::TemplateNotFound(_) => "TEMPLATE_NOT_FOUND",
            AppError::ProfileAlreadyExists { .. } => "PROFILE_ALREADY_EXISTS",
            AppError::AdapterIncomplete { .. } => "ADAPTER_INCOMPLETE",
            AppError::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            AppError::RateLimited(_) => "RATE_LIMITED",
            AppError::JobNotRetryable(_) => "JOB_NOT_RETRYABLE",
            AppError::InvalidSortKey(_) | AppError::InvalidPagination(_) => "VALIDATION_FAILED",
            AppError::Validation(_) => "VALIDATION_FAILED",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    /// HTTP status this error should map to.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::InvalidProfileUrl(_)
            | AppError::InvalidSortKey(_)
            | AppError::InvalidPagination(_)
            | AppError::Validation(_)
            | AppError::JobNotRetryable(_) => 400,
            AppError::ProfileNotFound(_)
            | AppError::OrganizationNotFound(_)
            | AppError::JobNotFound(_)
            | AppError::TemplateNotFound(_) => 404,
            AppError::ProfileAlreadyExists { .. } => 409,
            AppError::AdapterIncomplete { .. } => 422,
            AppError::RateLimited(_) => 429,
            AppError::UpstreamUnavailable { retryable, .. } => {
                if *retryable {
                    503
                } else {
                    502
                }
            }
            AppError::Internal(_) => 500,
        }
    }

    /// Structured `details` payload for the HTTP envelope, if any.
    pub fn details(&self) -> Option<Value> {
        match self {
            AppError::ProfileAlreadyExists { existing_id } => Some(serde_json::json!({
                "existing_profile_id": existing_id,
            })),
            AppError::AdapterIncomplete { missing_fields } => Some(serde_json::json!({
                "missing_fields": missing_fields,
            })),
            _ => None,
        }
    }

    /// Optional caller-facing suggestion, if any.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            AppError::ProfileAlreadyExists { existing_id } => Some(format!(
                "use GET /api/v1/profiles/{existing_id}"
            )),
            AppError::RateLimited(_) => Some("retry after the window resets".to_string()),
            _ => None,
        }
    }

    /// Whether retrying the same operation might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::UpstreamUnavailable { retryable: true, .. } | AppError::RateLimited(_)
        )
    }
}

impl crate::retry::Retryable for AppError {
    fn is_retryable(&self) -> bool {
        AppError::is_retryable(self)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            AppError::UpstreamUnavailable {
                message: format!("network error: {err}"),
                retryable: true,
            }
        } else {
            AppError::UpstreamUnavailable {
                message: err.to_string(),
                retryable: false,
            }
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("serialization error: {err}"))
    }
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for AppError {
    fn from(err: tokio_postgres::Error) -> Self {
        AppError::Internal(format!("database error: {err}"))
    }
}

#[cfg(feature = "postgres")]
impl From<deadpool_postgres::PoolError> for AppError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        AppError::Internal(format!("pool error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_mapping_is_stable() {
        let err = AppError::ProfileNotFound("abc".to_string());
        assert_eq!(err.error_code(), "PROFILE_NOT_FOUND");
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn already_exists_carries_details_and_suggestion() {
        let err = AppError::ProfileAlreadyExists {
            existing_id: "p-1".to_string(),
        };
        assert_eq!(err.status_code(), 409);
        assert!(err.details().unwrap()["existing_profile_id"] == "p-1");
        assert!(err.suggestion().unwrap().contains("p-1"));
    }

    #[test]
    fn upstream_unavailable_retryability_is_explicit() {
        assert!(AppError::UpstreamUnavailable {
            message: "x".into(),
            retryable: true,
        }
        .is_retryable());
        assert!(!AppError::UpstreamUnavailable {
            message: "x".into(),
            retryable: false,
        }
        .is_retryable());
        assert!(!AppError::Validation("x".into()).is_retryable());
    }
}

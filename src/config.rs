//! Environment-variable driven configuration.
//!
//! Mirrors the teacher's `env_vars` helper style: one place that knows the
//! variable names and defaults, so nothing downstream touches
//! `std::env::var` directly.

use std::time::Duration;

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .ok()
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Process-wide configuration, loaded once at startup from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL for the third-party profile-fetch workflow endpoint.
    pub workflow_profile_url: String,
    /// Base URL for the third-party organization-fetch workflow endpoint.
    pub workflow_organization_url: String,
    /// Shared secret used to authenticate to the workflow service.
    pub workflow_api_key: Option<String>,
    /// Base URL for the external LLM chat-completion endpoint.
    pub llm_base_url: String,
    /// API key for the LLM endpoint.
    pub llm_api_key: Option<String>,
    /// Default model name used for scoring when the caller omits one.
    pub llm_default_model: String,
    /// Pre-shared key callers must present in `X-API-Key`.
    pub api_key: String,
    /// Port the HTTP server listens on.
    pub port: u16,
    /// Pacing interval between organization fetches within a batch.
    pub pacing: Duration,
    /// Maximum retry attempts for transient workflow/LLM failures.
    pub batch_retry_count: u32,
    /// Per-request timeout for external calls.
    pub request_timeout: Duration,
    /// Feature flag: whether ingestion should fetch organizations at all.
    pub enable_company_ingestion: bool,
    /// Feature flag: whether scoring jobs run asynchronously in the
    /// background worker pool (vs. synchronously inline, useful for tests).
    pub enable_async_processing: bool,
    /// Public test URLs used by the health validator's profile probe.
    pub health_check_profile_urls: Vec<String>,
    /// Public test URLs used by the health validator's organization probe.
    pub health_check_org_urls: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl AppConfig {
    /// Load configuration from the process environment, falling back to
    /// sane local-development defaults for everything.
    pub fn from_env() -> Self {
        Self {
            workflow_profile_url: env_string(
                "WORKFLOW_PROFILE_URL",
                "https://workflow.internal/profile",
            ),
            workflow_organization_url: env_string(
                "WORKFLOW_ORGANIZATION_URL",
                "https://workflow.internal/organization",
            ),
            workflow_api_key: std::env::var("WORKFLOW_API_KEY").ok(),
            llm_base_url: env_string("LLM_BASE_URL", "https://llm.internal/v1/chat"),
            llm_api_key: std::env::var("LLM_API_KEY").ok(),
            llm_default_model: env_string("LLM_DEFAULT_MODEL", "gpt-4o-mini"),
            api_key: env_string("API_KEY", "dev-local-key"),
            port: env_u64("PORT", 8080) as u16,
            pacing: Duration::from_secs(env_u64("PACING_SECONDS", 3)),
            batch_retry_count: env_u64("BATCH_RETRY_COUNT", 3) as u32,
            request_timeout: Duration::from_secs(env_u64("REQUEST_TIMEOUT_SECONDS", 30)),
            enable_company_ingestion: env_bool("ENABLE_COMPANY_INGESTION", true),
            enable_async_processing: env_bool("ENABLE_ASYNC_PROCESSING", true),
            health_check_profile_urls: env_list("HEALTH_CHECK_PROFILE_URLS"),
            health_check_org_urls: env_list("HEALTH_CHECK_ORG_URLS"),
        }
    }
}

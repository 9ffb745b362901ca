//! External Workflow Client (C2).
//!
//! Talks to the third-party profile/organization scraping workflow: a POST
//! with a single target URL in the body, returning a loosely-typed JSON
//! payload that the adapter layer (C3) is responsible for making sense of.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::error::AppError;
use crate::retry::{with_retry, RetryPolicy};

/// Thin wrapper over a `reqwest::Client` pointed at the two workflow base
/// URLs, applying retry/backoff and request timeouts uniformly.
#[derive(Debug, Clone)]
pub struct WorkflowClient {
    http: Client,
    profile_url: String,
    organization_url: String,
    api_key: String,
    retry_policy: RetryPolicy,
}

impl WorkflowClient {
    pub fn new(
        profile_url: String,
        organization_url: String,
        api_key: String,
        request_timeout: Duration,
        retry_count: u32,
    ) -> Self {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("reqwest client builder should not fail with static config");
        Self {
            http,
            profile_url,
            organization_url,
            api_key,
            retry_policy: RetryPolicy::exponential(retry_count),
        }
    }

    /// Fetches a raw profile payload for `url`, retrying transient failures.
    pub async fn fetch_profile(&self, url: &str) -> Result<Value, AppError> {
        with_retry(&self.retry_policy, || self.call(&self.profile_url, url)).await
    }

    /// Fetches a raw organization payload for `url`, retrying transient
    /// failures.
    pub async fn fetch_organization(&self, url: &str) -> Result<Value, AppError> {
        with_retry(&self.retry_policy, || self.call(&self.organization_url, url)).await
    }

    /// Fetches organizations for `urls` one at a time, sleeping
    /// `pacing_seconds` between requests to respect the upstream service's
    /// rate limits. Returns a list the same length as `urls`, preserving
    /// order; an individual failure becomes `None` in its slot rather than
    /// aborting the whole batch.
    pub async fn batch_fetch_organizations(
        &self,
        urls: &[String],
        pacing_seconds: u64,
    ) -> Vec<Option<Value>> {
        let mut results = Vec::with_capacity(urls.len());
        for (idx, url) in urls.iter().enumerate() {
            if idx > 0 {
                tokio::time::sleep(Duration::from_secs(pacing_seconds)).await;
            }
            match self.fetch_organization(url).await {
                Ok(payload) => results.push(Some(payload)),
                Err(err) => {
                    tracing::warn!(url = %url, error = %err, "organization fetch failed, slot left empty");
                    results.push(None);
                }
            }
        }
        results
    }

    async fn call(&self, base_url: &str, target_url: &str) -> Result<Value, AppError> {
        let response = self
            .http
            .post(base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({ "url": target_url }))
            .send()
            .await
            .map_err(AppError::from)?;

        let status = response.status();
        if status.is_success() {
            return response.json::<Value>().await.map_err(|e| AppError::UpstreamUnavailable {
                message: format!("invalid upstream payload: {e}"),
                retryable: false,
            });
        }

        let body_excerpt = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(500)
            .collect::<String>();

        Err(classify_status(status, &body_excerpt))
    }
}

fn classify_status(status: StatusCode, body_excerpt: &str) -> AppError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        AppError::RateLimited(format!("workflow endpoint rate limited: {body_excerpt}"))
    } else if status.is_server_error() {
        AppError::UpstreamUnavailable {
            message: format!("workflow endpoint returned {status}: {body_excerpt}"),
            retryable: true,
        }
    } else {
        // Any other 4xx is terminal: retrying would just repeat the failure.
        AppError::UpstreamUnavailable {
            message: format!("workflow endpoint returned non-retryable status {status}: {body_excerpt}"),
            retryable: false,
        }
    }
}

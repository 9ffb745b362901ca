//! Health Validator (C9).
//!
//! `quick_check` and `comprehensive_check` are strictly read-only probes of
//! the external workflow dependency — neither ever writes to persistence
//! (§4.9). Classification: healthy (checks pass, completeness >= 70%),
//! degraded (checks pass but latency or completeness miss the bar),
//! unhealthy (a check fails outright or the adapter raises).
//!
//! When no test URLs are configured (`HEALTH_CHECK_PROFILE_URLS` /
//! `HEALTH_CHECK_ORG_URLS` are both empty), there is nothing to probe —
//! both checks report healthy as a no-op rather than failing closed.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::adapter::{adapt_organization, adapt_profile};
use crate::canonical::{CanonicalOrganization, CanonicalProfile};
use crate::workflow_client::WorkflowClient;

const COMPLETENESS_THRESHOLD: f64 = 0.70;
const DEFAULT_LATENCY_THRESHOLD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub latency_ms: u64,
    pub completeness: Option<f64>,
    pub detail: Option<String>,
}

impl HealthReport {
    fn healthy_noop() -> Self {
        Self {
            status: HealthStatus::Healthy,
            latency_ms: 0,
            completeness: None,
            detail: Some("no health-check URLs configured".to_string()),
        }
    }

    fn unhealthy(latency: Duration, detail: String) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            latency_ms: latency.as_millis() as u64,
            completeness: None,
            detail: Some(detail),
        }
    }
}

pub struct HealthValidator {
    workflow: std::sync::Arc<WorkflowClient>,
    profile_urls: Vec<String>,
    org_urls: Vec<String>,
    latency_threshold: Duration,
}

impl HealthValidator {
    pub fn new(workflow: std::sync::Arc<WorkflowClient>, profile_urls: Vec<String>, org_urls: Vec<String>) -> Self {
        Self {
            workflow,
            profile_urls,
            org_urls,
            latency_threshold: DEFAULT_LATENCY_THRESHOLD,
        }
    }

    /// Verifies the workflow endpoint is reachable and returns a
    /// well-formed (JSON object) reply, without adapting it (§4.9).
    pub async fn quick_check(&self) -> HealthReport {
        let Some(url) = self.profile_urls.first() else {
            return HealthReport::healthy_noop();
        };
        let start = Instant::now();
        match self.workflow.fetch_profile(url).await {
            Ok(raw) if raw.is_object() => HealthReport {
                status: HealthStatus::Healthy,
                latency_ms: start.elapsed().as_millis() as u64,
                completeness: None,
                detail: None,
            },
            Ok(_) => HealthReport::unhealthy(start.elapsed(), "workflow reply was not a JSON object".to_string()),
            Err(err) => HealthReport::unhealthy(start.elapsed(), err.to_string()),
        }
    }

    /// Issues one profile fetch and one organization fetch against the
    /// configured test URLs, runs the adapter on each reply, and scores
    /// data completeness (§4.9). Never writes to persistence.
    pub async fn comprehensive_check(&self) -> HealthReport {
        if self.profile_urls.is_empty() && self.org_urls.is_empty() {
            return HealthReport::healthy_noop();
        }

        let start = Instant::now();
        let mut completeness_scores = Vec::new();

        if let Some(url) = self.profile_urls.first() {
            match self.workflow.fetch_profile(url).await {
                Err(err) => return HealthReport::unhealthy(start.elapsed(), err.to_string()),
                Ok(raw) => match adapt_profile(&raw) {
                    Err(err) => return HealthReport::unhealthy(start.elapsed(), err.to_string()),
                    Ok(profile) => completeness_scores.push(profile_completeness(&profile)),
                },
            }
        }

        if let Some(url) = self.org_urls.first() {
            match self.workflow.fetch_organization(url).await {
                Err(err) => return HealthReport::unhealthy(start.elapsed(), err.to_string()),
                Ok(raw) => match adapt_organization(&raw) {
                    Err(err) => return HealthReport::unhealthy(start.elapsed(), err.to_string()),
                    Ok(org) => completeness_scores.push(organization_completeness(&org)),
                },
            }
        }

        let latency = start.elapsed();
        let completeness = completeness_scores.iter().sum::<f64>() / completeness_scores.len().max(1) as f64;

        let status = if latency > self.latency_threshold || completeness < COMPLETENESS_THRESHOLD {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthReport {
            status,
            latency_ms: latency.as_millis() as u64,
            completeness: Some(completeness),
            detail: None,
        }
    }
}

fn profile_completeness(profile: &CanonicalProfile) -> f64 {
    let fields = [
        profile.public_handle.is_some(),
        profile.urn.is_some(),
        profile.first_name.is_some(),
        profile.last_name.is_some(),
        profile.headline.is_some(),
        profile.about.is_some(),
        profile.image_url.is_some(),
        profile.city.is_some(),
        profile.state.is_some(),
        profile.country.is_some(),
        profile.email.is_some(),
        !profile.experiences.is_empty(),
        !profile.educations.is_empty(),
        profile.follower_count.is_some(),
        profile.connection_count.is_some(),
    ];
    ratio(&fields)
}

fn organization_completeness(org: &CanonicalOrganization) -> f64 {
    let fields = [
        org.canonical_url.is_some(),
        org.tagline.is_some(),
        org.description.is_some(),
        org.website.is_some(),
        org.domain.is_some(),
        org.year_founded.is_some(),
        !org.industries.is_empty(),
        org.employee_count.is_some(),
        org.employee_range.is_some(),
        org.follower_count.is_some(),
        org.headquarters.city.is_some(),
    ];
    ratio(&fields)
}

fn ratio(fields: &[bool]) -> f64 {
    fields.iter().filter(|present| **present).count() as f64 / fields.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn validator_for(server: &MockServer, profile_urls: Vec<String>, org_urls: Vec<String>) -> HealthValidator {
        let workflow = Arc::new(WorkflowClient::new(
            format!("{}/profile", server.uri()),
            format!("{}/organization", server.uri()),
            "key".to_string(),
            std::time::Duration::from_secs(5),
            0,
        ));
        HealthValidator::new(workflow, profile_urls, org_urls)
    }

    #[tokio::test]
    async fn no_configured_urls_is_healthy_noop() {
        let server = MockServer::start().await;
        let validator = validator_for(&server, Vec::new(), Vec::new());
        let report = validator.comprehensive_check().await;
        assert_eq!(report.status, HealthStatus::Healthy);
        assert!(report.completeness.is_none());
    }

    #[tokio::test]
    async fn quick_check_reports_unhealthy_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(500)).mount(&server).await;
        let validator = validator_for(&server, vec!["https://example.com/in/probe".to_string()], Vec::new());
        let report = validator.quick_check().await;
        assert_eq!(report.status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn comprehensive_check_flags_low_completeness_as_degraded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "1",
                "full_name": "Ada",
                "url": "https://linkedin.com/in/ada",
            })))
            .mount(&server)
            .await;
        let validator = validator_for(&server, vec!["https://example.com/in/probe".to_string()], Vec::new());
        let report = validator.comprehensive_check().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(report.completeness.unwrap() < COMPLETENESS_THRESHOLD);
    }
}

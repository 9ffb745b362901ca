//! Shared helpers for building a fully-wired `AppState`/router against
//! wiremock stand-ins for the workflow and LLM endpoints, the same shape
//! `src/bin/server.rs` assembles at process startup.

use std::sync::Arc;
use std::time::Duration;

use profile_forge::api::{build_router, AppState};
use profile_forge::config::AppConfig;
use profile_forge::health::HealthValidator;
use profile_forge::llm_client::LlmClient;
use profile_forge::orchestrator::IngestionOrchestrator;
use profile_forge::organization::OrganizationService;
use profile_forge::persistence::memory::InMemoryStore;
use profile_forge::scoring::ScoringEngine;
use profile_forge::template::TemplateService;
use profile_forge::tracker::RequestTracker;
use profile_forge::workflow_client::WorkflowClient;
use wiremock::MockServer;

pub const API_KEY: &str = "test-api-key";

pub fn test_config(workflow_uri: &str, llm_uri: &str) -> AppConfig {
    AppConfig {
        workflow_profile_url: format!("{workflow_uri}/profile"),
        workflow_organization_url: format!("{workflow_uri}/organization"),
        workflow_api_key: Some("workflow-test-key".to_string()),
        llm_base_url: format!("{llm_uri}/chat"),
        llm_api_key: None,
        llm_default_model: "gpt-4o-mini".to_string(),
        api_key: API_KEY.to_string(),
        port: 0,
        pacing: Duration::from_millis(0),
        batch_retry_count: 0,
        request_timeout: Duration::from_secs(5),
        enable_company_ingestion: true,
        enable_async_processing: false,
        health_check_profile_urls: vec![format!("{workflow_uri}/profile")],
        health_check_org_urls: vec![format!("{workflow_uri}/organization")],
    }
}

/// Builds an `AppState` with in-memory stores and `enable_async_processing`
/// off, so scoring jobs created through the HTTP API run to completion
/// synchronously within the same request — no need to poll or drain a
/// worker channel from a test.
pub async fn build_state(workflow: &MockServer, llm: &MockServer) -> AppState {
    let config = Arc::new(test_config(&workflow.uri(), &llm.uri()));

    let profiles = Arc::new(InMemoryStore::new());
    let organizations = profiles.clone();
    let edges = profiles.clone();
    let jobs = profiles.clone();
    let templates_store = profiles.clone();

    let workflow_client = Arc::new(WorkflowClient::new(
        config.workflow_profile_url.clone(),
        config.workflow_organization_url.clone(),
        config.workflow_api_key.clone().unwrap_or_default(),
        config.request_timeout,
        config.batch_retry_count,
    ));
    let llm_client = Arc::new(LlmClient::new(
        config.llm_base_url.clone(),
        config.llm_api_key.clone(),
        config.request_timeout,
        config.batch_retry_count,
    ));

    let organization_service = Arc::new(OrganizationService::new(organizations.clone(), edges.clone()));
    let tracker = Arc::new(RequestTracker::default());

    let orchestrator = Arc::new(IngestionOrchestrator::new(
        workflow_client.clone(),
        profiles.clone(),
        organization_service,
        tracker.clone(),
        config.pacing.as_secs(),
        config.enable_company_ingestion,
    ));

    let template_service = Arc::new(TemplateService::new(templates_store));

    let scoring_engine = Arc::new(ScoringEngine::new(
        jobs,
        profiles.clone(),
        organizations.clone(),
        edges.clone(),
        template_service.clone(),
        llm_client,
        tracker.clone(),
        config.llm_default_model.clone(),
    ));

    let health = Arc::new(HealthValidator::new(
        workflow_client,
        config.health_check_profile_urls.clone(),
        config.health_check_org_urls.clone(),
    ));

    let (job_sender, _job_receiver) = tokio::sync::mpsc::unbounded_channel();

    AppState::new(
        config,
        profiles,
        organizations,
        edges,
        orchestrator,
        scoring_engine,
        template_service,
        health,
        tracker,
        Arc::new(job_sender),
    )
}

pub async fn build_test_router(workflow: &MockServer, llm: &MockServer) -> axum::Router {
    build_router(build_state(workflow, llm).await)
}

/// A minimal upstream profile payload with `experience_count` experiences,
/// each citing `organization_url`, rotating through a small pool so callers
/// can control how many distinct organization URLs are produced.
pub fn profile_payload(linkedin_url: &str, organization_urls: &[&str]) -> serde_json::Value {
    let experiences: Vec<serde_json::Value> = organization_urls
        .iter()
        .enumerate()
        .map(|(idx, url)| {
            serde_json::json!({
                "title": format!("Role {idx}"),
                "company_name": format!("Company {idx}"),
                "company_url": url,
                "start_year": 2015 + idx as i64,
            })
        })
        .collect();

    serde_json::json!({
        "id": "ext-1",
        "full_name": "Ada Lovelace",
        "url": linkedin_url,
        "experiences": experiences,
    })
}

pub fn organization_payload(name: &str) -> serde_json::Value {
    serde_json::json!({ "name": name })
}

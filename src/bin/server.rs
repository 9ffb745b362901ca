//! Process entry point: wires configuration, persistence, outbound
//! clients, domain services, and the HTTP server together, then spawns the
//! background scoring worker and the maintenance sweep — the binary-level
//! composition root the library crate itself stays free of.

use std::sync::Arc;
use std::time::Duration;

use profile_forge::api::AppState;
use profile_forge::health::HealthValidator;
use profile_forge::llm_client::LlmClient;
use profile_forge::orchestrator::IngestionOrchestrator;
use profile_forge::organization::OrganizationService;
use profile_forge::persistence::memory::InMemoryStore;
use profile_forge::persistence::{EdgeStore, OrganizationStore, ProfileStore, ScoringJobStore, TemplateStore};
use profile_forge::scoring::ScoringEngine;
use profile_forge::template::TemplateService;
use profile_forge::tracker::RequestTracker;
use profile_forge::workflow_client::WorkflowClient;
use profile_forge::AppConfig;
use uuid::Uuid;

type Stores = (
    Arc<dyn ProfileStore>,
    Arc<dyn OrganizationStore>,
    Arc<dyn EdgeStore>,
    Arc<dyn ScoringJobStore>,
    Arc<dyn TemplateStore>,
);

#[cfg(feature = "postgres")]
async fn build_stores() -> Stores {
    use profile_forge::persistence::postgres::PostgresStore;

    match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let store = PostgresStore::connect(&database_url)
                .await
                .expect("failed to connect to postgres");
            store.migrate().await.expect("failed to run schema migration");
            let store = Arc::new(store);
            (store.clone(), store.clone(), store.clone(), store.clone(), store)
        }
        Err(_) => {
            tracing::info!("DATABASE_URL not set, falling back to the in-memory store");
            let store = Arc::new(InMemoryStore::new());
            (store.clone(), store.clone(), store.clone(), store.clone(), store)
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn build_stores() -> Stores {
    let store = Arc::new(InMemoryStore::new());
    (store.clone(), store.clone(), store.clone(), store.clone(), store)
}

/// Consumes job ids enqueued by the API layer and drives each one to
/// completion. Multiple of these could run concurrently against the same
/// queue; one is enough for the ingestion rates this engine targets.
fn spawn_scoring_worker(mut jobs: tokio::sync::mpsc::UnboundedReceiver<Uuid>, engine: Arc<ScoringEngine>) {
    tokio::spawn(async move {
        while let Some(job_id) = jobs.recv().await {
            if let Err(err) = engine.process_one(job_id).await {
                tracing::warn!(job_id = %job_id, error = %err, "scoring job processing failed");
            }
        }
    });
}

/// Periodically evicts expired tracker entries and sweeps completed/failed
/// scoring jobs past their retention window (§4.10, §3 lifecycle).
fn spawn_maintenance_sweep(tracker: Arc<RequestTracker>, engine: Arc<ScoringEngine>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            tracker.evict_expired();
            if let Err(err) = engine.sweep_expired(chrono::Duration::days(7)).await {
                tracing::warn!(error = %err, "scoring job sweep failed");
            }
        }
    });
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Arc::new(AppConfig::from_env());
    let (profiles, organizations, edges, jobs, templates_store) = build_stores().await;

    let workflow = Arc::new(WorkflowClient::new(
        config.workflow_profile_url.clone(),
        config.workflow_organization_url.clone(),
        config.workflow_api_key.clone().unwrap_or_default(),
        config.request_timeout,
        config.batch_retry_count,
    ));
    let llm = Arc::new(LlmClient::new(
        config.llm_base_url.clone(),
        config.llm_api_key.clone(),
        config.request_timeout,
        config.batch_retry_count,
    ));

    let organization_service = Arc::new(OrganizationService::new(organizations.clone(), edges.clone()));
    let tracker = Arc::new(RequestTracker::default());

    let orchestrator = Arc::new(IngestionOrchestrator::new(
        workflow.clone(),
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
        llm,
        tracker.clone(),
        config.llm_default_model.clone(),
    ));

    let health = Arc::new(HealthValidator::new(
        workflow,
        config.health_check_profile_urls.clone(),
        config.health_check_org_urls.clone(),
    ));

    let (job_sender, job_receiver) = tokio::sync::mpsc::unbounded_channel::<Uuid>();

    let state = AppState::new(
        config.clone(),
        profiles,
        organizations,
        edges,
        orchestrator,
        scoring_engine.clone(),
        template_service,
        health,
        tracker.clone(),
        Arc::new(job_sender),
    );

    if config.enable_async_processing {
        spawn_scoring_worker(job_receiver, scoring_engine.clone());
    }
    spawn_maintenance_sweep(tracker, scoring_engine);

    if let Err(err) = profile_forge::api::serve(state).await {
        tracing::error!(error = %err, "server exited with error");
    }
}

//! S6 — scoring race safety: two concurrent workers racing to claim the
//! same pending job. Exercised at the `ScoringEngine` level rather than
//! through HTTP, since the race is about the store's compare-and-swap, not
//! the transport.

use std::sync::Arc;

use profile_forge::canonical::ProfileBuilder;
use profile_forge::llm_client::LlmClient;
use profile_forge::persistence::memory::InMemoryStore;
use profile_forge::persistence::ProfileStore;
use profile_forge::scoring::ScoringEngine;
use profile_forge::template::TemplateService;
use profile_forge::tracker::RequestTracker;
use serde_json::json;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn only_one_worker_transitions_the_job_to_processing() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "text": json!({ "tech": 5 }).to_string(),
            "tokens_used": 10,
        })))
        .mount(&llm)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let profile = ProfileBuilder {
        external_profile_id: Some("ext-1".to_string()),
        full_name: Some("Ada Lovelace".to_string()),
        canonical_url: Some("https://linkedin.com/in/ada".to_string()),
        ..Default::default()
    }
    .build()
    .unwrap();
    let (profile, _created) = store.upsert(profile).await.unwrap();

    let templates = Arc::new(TemplateService::new(store.clone()));
    let llm_client = Arc::new(LlmClient::new(llm.uri(), None, std::time::Duration::from_secs(5), 0));
    let engine = Arc::new(ScoringEngine::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        templates,
        llm_client,
        Arc::new(RequestTracker::default()),
        "gpt-4o-mini".to_string(),
    ));

    let job = engine
        .create_job(profile.id, Some("score it".to_string()), None, None, None, None)
        .await
        .unwrap();

    let (first, second) = tokio::join!(engine.process_one(job.id), engine.process_one(job.id));
    let first = first.unwrap();
    let second = second.unwrap();

    // Exactly one of the two calls actually claimed and processed the job;
    // the other observes it already gone from `pending` and yields `None`.
    let outcomes = [first, second];
    let processed = outcomes.iter().filter(|o| o.is_some()).count();
    assert_eq!(processed, 1);

    let final_job = engine.get_job(job.id).await.unwrap();
    assert_eq!(final_job.status, profile_forge::scoring::ScoringStatus::Completed);
}

#[tokio::test]
async fn create_job_enforces_per_profile_hourly_limit() {
    let llm = MockServer::start().await;
    let store = Arc::new(InMemoryStore::new());
    let profile = ProfileBuilder {
        external_profile_id: Some("ext-2".to_string()),
        full_name: Some("Grace Hopper".to_string()),
        canonical_url: Some("https://linkedin.com/in/grace".to_string()),
        ..Default::default()
    }
    .build()
    .unwrap();
    let (profile, _) = store.upsert(profile).await.unwrap();

    let templates = Arc::new(TemplateService::new(store.clone()));
    let llm_client = Arc::new(LlmClient::new(llm.uri(), None, std::time::Duration::from_secs(5), 0));
    let engine = ScoringEngine::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        templates,
        llm_client,
        Arc::new(RequestTracker::default()),
        "gpt-4o-mini".to_string(),
    );

    for _ in 0..10 {
        engine
            .create_job(profile.id, Some("score".to_string()), None, None, None, None)
            .await
            .unwrap();
    }

    let err = engine
        .create_job(profile.id, Some("score".to_string()), None, None, None, None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "RATE_LIMITED");
}

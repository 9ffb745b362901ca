//! End-to-end ingestion and scoring scenarios, driven through the HTTP
//! router against wiremock stand-ins for the workflow and LLM endpoints.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::util::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{build_test_router, organization_payload, profile_payload, API_KEY};

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn ingest_request(linkedin_url: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/profiles")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-api-key", API_KEY)
        .body(Body::from(
            json!({ "linkedin_url": linkedin_url, "include_companies": true }).to_string(),
        ))
        .unwrap()
}

// S1 — happy path: a profile with three experiences citing two distinct
// organization URLs (A, A, B). Each experience gets its own edge row (three
// edges), but A is the same organization both times, so the company list
// returned to the caller has two entries, not three.
#[tokio::test]
async fn s1_happy_path_profile_with_organizations() {
    let workflow = MockServer::start().await;
    let llm = MockServer::start().await;

    let linkedin_url = "https://www.linkedin.com/in/example1/";
    Mock::given(method("POST"))
        .and(path("/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_payload(
            linkedin_url,
            &["https://linkedin.com/company/a", "https://linkedin.com/company/a", "https://linkedin.com/company/b"],
        )))
        .mount(&workflow)
        .await;
    Mock::given(method("POST"))
        .and(path("/organization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(organization_payload("Acme")))
        .mount(&workflow)
        .await;

    let router = build_test_router(&workflow, &llm).await;
    let response = router.clone().oneshot(ingest_request(linkedin_url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let profile_id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["companies"].as_array().unwrap().len(), 2);

    let get_request = Request::builder()
        .uri(format!("/api/v1/profiles/{profile_id}?include_companies=true"))
        .header("x-api-key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(get_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await;
    assert_eq!(fetched["experiences"].as_array().unwrap().len(), 3);
    assert_eq!(fetched["companies"].as_array().unwrap().len(), 2);
}

// S2 — duplicate URL: re-ingesting the same normalized URL returns 409 with
// the pre-existing id, and does not create a second row.
#[tokio::test]
async fn s2_duplicate_url_returns_409_with_existing_id() {
    let workflow = MockServer::start().await;
    let llm = MockServer::start().await;

    let linkedin_url = "https://www.linkedin.com/in/example2/";
    Mock::given(method("POST"))
        .and(path("/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_payload(linkedin_url, &[])))
        .mount(&workflow)
        .await;

    let router = build_test_router(&workflow, &llm).await;
    let first = router.clone().oneshot(ingest_request(linkedin_url)).await.unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let first_body = body_json(first).await;
    let existing_id = first_body["id"].as_str().unwrap().to_string();

    let second = router.oneshot(ingest_request(linkedin_url)).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let second_body = body_json(second).await;
    assert_eq!(second_body["error_code"], "PROFILE_ALREADY_EXISTS");
    assert_eq!(second_body["details"]["existing_profile_id"], existing_id);
}

// S3 — adapter incompleteness: upstream payload omits `full_name`, which is
// an essential field; no profile row should be created.
#[tokio::test]
async fn s3_missing_full_name_is_422_adapter_incomplete() {
    let workflow = MockServer::start().await;
    let llm = MockServer::start().await;

    let linkedin_url = "https://www.linkedin.com/in/example3/";
    let mut payload = profile_payload(linkedin_url, &[]);
    payload.as_object_mut().unwrap().remove("full_name");
    Mock::given(method("POST"))
        .and(path("/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload))
        .mount(&workflow)
        .await;

    let router = build_test_router(&workflow, &llm).await;
    let response = router.clone().oneshot(ingest_request(linkedin_url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], "ADAPTER_INCOMPLETE");
    assert!(body["details"]["missing_fields"]
        .as_array()
        .unwrap()
        .iter()
        .any(|v| v == "full_name"));

    let list_request = Request::builder()
        .uri(format!("/api/v1/profiles?linkedin_url={linkedin_url}"))
        .header("x-api-key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(list_request).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["total"], 0);
}

// S4 — partial organization failure: one organization fetch succeeds, the
// other fails after retries; ingestion still succeeds with one linked edge.
#[tokio::test]
async fn s4_partial_organization_failure_still_ingests() {
    let workflow = MockServer::start().await;
    let llm = MockServer::start().await;

    let linkedin_url = "https://www.linkedin.com/in/example4/";
    Mock::given(method("POST"))
        .and(path("/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_payload(
            linkedin_url,
            &["https://linkedin.com/company/good", "https://linkedin.com/company/bad"],
        )))
        .mount(&workflow)
        .await;
    Mock::given(method("POST"))
        .and(path("/organization"))
        .and(body_string_contains("good"))
        .respond_with(ResponseTemplate::new(200).set_body_json(organization_payload("Good Co")))
        .mount(&workflow)
        .await;
    Mock::given(method("POST"))
        .and(path("/organization"))
        .and(body_string_contains("bad"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&workflow)
        .await;

    let router = build_test_router(&workflow, &llm).await;
    let response = router.oneshot(ingest_request(linkedin_url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let companies = body["companies"].as_array().unwrap();
    assert_eq!(companies.len(), 1, "only the successful organization fetch is linked");
    assert_eq!(companies[0]["name"], "Good Co");
}

// S5 — scoring lifecycle: create a job, it resolves synchronously since
// `enable_async_processing` is off in the test config, and the final state
// carries a parsed JSON object score with token usage and timestamps.
#[tokio::test]
async fn s5_scoring_lifecycle_completes_with_parsed_score() {
    let workflow = MockServer::start().await;
    let llm = MockServer::start().await;

    let linkedin_url = "https://www.linkedin.com/in/example5/";
    Mock::given(method("POST"))
        .and(path("/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_payload(linkedin_url, &[])))
        .mount(&workflow)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "text": json!({ "tech": 8, "leadership": 7, "fit": 9 }).to_string(),
            "tokens_used": 256,
        })))
        .mount(&llm)
        .await;

    let router = build_test_router(&workflow, &llm).await;
    let ingested = router.clone().oneshot(ingest_request(linkedin_url)).await.unwrap();
    let profile_id = body_json(ingested).await["id"].as_str().unwrap().to_string();

    let score_request = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/profiles/{profile_id}/score"))
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-api-key", API_KEY)
        .body(Body::from(
            json!({ "prompt": "score tech, leadership, fit as integers" }).to_string(),
        ))
        .unwrap();
    let response = router.clone().oneshot(score_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let job = body_json(response).await;

    assert_eq!(job["status"], "completed");
    let score = &job["parsed_score"];
    assert!(score.is_object());
    assert!(score["tech"].is_i64());
    assert!(score["leadership"].is_i64());
    assert!(score["fit"].is_i64());
    assert!(job["tokens_used"].as_u64().unwrap() > 0);

    let completed_at = job["completed_at"].as_str().unwrap();
    let started_at = job["started_at"].as_str().unwrap();
    let created_at = job["created_at"].as_str().unwrap();
    assert!(completed_at >= started_at);
    assert!(started_at >= created_at);
}

// Boundary: limit=101 is rejected with 400, limit=100 is accepted.
#[tokio::test]
async fn listing_rejects_limit_over_one_hundred() {
    let workflow = MockServer::start().await;
    let llm = MockServer::start().await;
    let router = build_test_router(&workflow, &llm).await;

    let request = Request::builder()
        .uri("/api/v1/profiles?limit=101")
        .header("x-api-key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .uri("/api/v1/profiles?limit=100")
        .header("x-api-key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unauthenticated_request_is_rejected() {
    let workflow = MockServer::start().await;
    let llm = MockServer::start().await;
    let router = build_test_router(&workflow, &llm).await;

    let request = Request::builder()
        .uri("/api/v1/profiles")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_endpoint_is_always_ok_and_unauthenticated() {
    let workflow = MockServer::start().await;
    let llm = MockServer::start().await;
    let router = build_test_router(&workflow, &llm).await;

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

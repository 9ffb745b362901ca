//! External LLM client used by the Scoring Job Engine (C7).
//!
//! A chat-completion-style JSON endpoint: `{ model, messages, max_tokens,
//! temperature }` in, `{ text, tokens_used }` out (spec §6). Retry/backoff
//! mirrors the [`crate::workflow_client::WorkflowClient`]'s status
//! classification — network/5xx/429 are transient, everything else
//! (invalid API key, invalid model, content-length exceeded) is terminal.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::json;

use crate::error::AppError;
use crate::retry::{with_retry, RetryPolicy};

/// Raw result of one LLM invocation, before JSON-parsing the reply text
/// (parsing/validation is the scoring engine's job, not the client's).
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub tokens_used: u64,
}

#[derive(Debug, Clone)]
pub struct LlmClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    retry_policy: RetryPolicy,
}

impl LlmClient {
    pub fn new(base_url: String, api_key: Option<String>, request_timeout: Duration, retry_count: u32) -> Self {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("reqwest client builder should not fail with static config");
        Self {
            http,
            base_url,
            api_key,
            retry_policy: RetryPolicy::exponential(retry_count),
        }
    }

    /// Invokes the LLM with the resolved prompt plus the serialized profile,
    /// requesting a JSON-formatted reply (§4.7 step 4). Default timeout is
    /// set by the caller via `request_timeout` at construction (spec default
    /// 60s for scoring, distinct from the 30s workflow default).
    pub async fn invoke(
        &self,
        model: &str,
        prompt: &str,
        profile_text: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<LlmResponse, AppError> {
        with_retry(&self.retry_policy, || {
            self.call(model, prompt, profile_text, max_tokens, temperature)
        })
        .await
    }

    async fn call(
        &self,
        model: &str,
        prompt: &str,
        profile_text: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<LlmResponse, AppError> {
        let mut request = self.http.post(&self.base_url).json(&json!({
            "model": model,
            "messages": [
                { "role": "system", "content": prompt },
                { "role": "user", "content": profile_text },
            ],
            "max_tokens": max_tokens,
            "temperature": temperature,
        }));
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = request.send().await.map_err(AppError::from)?;
        let status = response.status();
        if status.is_success() {
            let body: serde_json::Value = response.json().await.map_err(|e| AppError::UpstreamUnavailable {
                message: format!("invalid LLM response payload: {e}"),
                retryable: false,
            })?;
            let text = body
                .get("text")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| AppError::UpstreamUnavailable {
                    message: "LLM response missing `text` field".to_string(),
                    retryable: false,
                })?
                .to_string();
            let tokens_used = body.get("tokens_used").and_then(serde_json::Value::as_u64).unwrap_or(0);
            return Ok(LlmResponse { text, tokens_used });
        }

        let body_excerpt = response.text().await.unwrap_or_default().chars().take(500).collect::<String>();
        Err(classify_llm_status(status, &body_excerpt))
    }
}

fn classify_llm_status(status: StatusCode, body_excerpt: &str) -> AppError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            AppError::RateLimited(format!("LLM provider rate limited: {body_excerpt}"))
        }
        s if s.is_server_error() => AppError::UpstreamUnavailable {
            message: format!("LLM provider returned {status}: {body_excerpt}"),
            retryable: true,
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::UpstreamUnavailable {
            message: format!("LLM provider rejected credentials: {body_excerpt}"),
            retryable: false,
        },
        StatusCode::PAYLOAD_TOO_LARGE => AppError::UpstreamUnavailable {
            message: format!("LLM provider reported content length exceeded: {body_excerpt}"),
            retryable: false,
        },
        _ => AppError::UpstreamUnavailable {
            message: format!("LLM provider returned non-retryable status {status}: {body_excerpt}"),
            retryable: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn invoke_returns_text_and_tokens_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "text": "{\"tech\": 8}",
                "tokens_used": 123,
            })))
            .mount(&server)
            .await;

        let client = LlmClient::new(server.uri(), Some("key".to_string()), Duration::from_secs(5), 1);
        let response = client.invoke("gpt-4o-mini", "prompt", "profile text", 512, 0.2).await.unwrap();
        assert_eq!(response.tokens_used, 123);
        assert!(response.text.contains("tech"));
    }

    #[tokio::test]
    async fn unauthorized_is_terminal_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let client = LlmClient::new(server.uri(), Some("bad-key".to_string()), Duration::from_secs(5), 3);
        let err = client.invoke("gpt-4o-mini", "prompt", "profile text", 512, 0.2).await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn server_error_is_retried_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = LlmClient::new(server.uri(), None, Duration::from_secs(5), 1);
        let err = client.invoke("gpt-4o-mini", "prompt", "profile text", 512, 0.2).await.unwrap_err();
        assert!(err.is_retryable());
    }
}

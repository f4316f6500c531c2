//! OpenAI Chat Completions provider.
//!
//! Talks to `{base_url}/chat/completions` over `reqwest`. Transport errors and
//! 5xx responses are retried with exponential backoff; 429 responses are
//! never retried, since the dispatch engine turns them into a canned answer
//! straight away.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dispatch::envelope::Choice;
use crate::llms::base_llm::{CompletionBackend, CompletionError, DEFAULT_REQUEST_TIMEOUT};
use crate::types::{ConversationTurn, Role};

/// Default OpenAI API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat model.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// OpenAI completion client.
#[derive(Debug, Clone)]
pub struct OpenAICompletion {
    /// Model name (e.g. "gpt-3.5-turbo").
    pub model: String,
    /// API key; `None` means the backend is unconfigured.
    pub api_key: Option<String>,
    /// Base URL without trailing slash.
    pub base_url: String,
    /// Organization ID for multi-tenant access.
    pub organization: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Maximum tokens in the response.
    pub max_tokens: Option<u32>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries for transport errors and 5xx responses.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further attempt.
    pub retry_delay: Duration,
}

impl OpenAICompletion {
    /// Create a new OpenAI completion client.
    ///
    /// # Arguments
    ///
    /// * `model` - OpenAI model name.
    /// * `api_key` - API key; empty strings are treated as absent.
    /// * `base_url` - Optional custom base URL.
    pub fn new(model: impl Into<String>, api_key: Option<String>, base_url: Option<String>) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            model: model.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.trim_end_matches('/').to_string(),
            organization: None,
            temperature: None,
            max_tokens: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            max_retries: 2,
            retry_delay: Duration::from_secs(1),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Build the request body for the Chat Completions API.
    pub fn build_request_body<'a>(&'a self, messages: &'a [ConversationTurn]) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    fn parse_response(&self, text: &str) -> Result<Vec<Choice>, CompletionError> {
        let response: ChatResponse = serde_json::from_str(text).map_err(|e| {
            CompletionError::Parse(format!(
                "{} - Body: {}",
                e,
                text.chars().take(500).collect::<String>()
            ))
        })?;

        if let Some(usage) = &response.usage {
            log::debug!(
                "OpenAI token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens,
            );
        }

        if response.choices.is_empty() {
            return Err(CompletionError::EmptyResponse);
        }

        Ok(response
            .choices
            .into_iter()
            .map(|c| Choice {
                message: ConversationTurn::new(
                    c.message.role.unwrap_or(Role::Assistant),
                    c.message.content.unwrap_or_default(),
                ),
                index: c.index,
                finish_reason: c.finish_reason,
            })
            .collect())
    }
}

#[async_trait]
impl CompletionBackend for OpenAICompletion {
    fn model(&self) -> &str {
        &self.model
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, messages: &[ConversationTurn]) -> Result<Vec<Choice>, CompletionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(CompletionError::MissingCredential)?;

        log::debug!(
            "OpenAICompletion.complete: model={}, messages={}",
            self.model,
            messages.len(),
        );

        let body = self.build_request_body(messages);
        let endpoint = self.endpoint();
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        let mut last_error: Option<CompletionError> = None;
        let mut retry_delay = self.retry_delay;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                log::warn!("OpenAI API retry attempt {} after {:?}", attempt, retry_delay);
                tokio::time::sleep(retry_delay).await;
                retry_delay *= 2;
            }

            let mut request = client.post(&endpoint).bearer_auth(api_key);
            if let Some(ref org) = self.organization {
                request = request.header("OpenAI-Organization", org);
            }

            let response = match request.json(&body).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(CompletionError::Transport(e));
                    continue;
                }
            };

            let status = response.status();
            let text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    last_error = Some(CompletionError::Transport(e));
                    continue;
                }
            };

            if status.is_server_error() {
                last_error = Some(CompletionError::from_status(status.as_u16(), &text));
                continue;
            }

            if !status.is_success() {
                return Err(CompletionError::from_status(status.as_u16(), &text));
            }

            return self.parse_response(&text);
        }

        Err(last_error.unwrap_or(CompletionError::EmptyResponse))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Chat Completions request body.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ConversationTurn],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    #[serde(default)]
    index: Option<u32>,
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    /// Serve a fixed response on `/chat/completions`; returns the base URL
    /// and a hit counter.
    async fn mock_backend(status: StatusCode, body: Value) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/chat/completions",
            post(move |Json(_req): Json<Value>| {
                let body = body.clone();
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (status, Json(body))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), hits)
    }

    fn client(base_url: String) -> OpenAICompletion {
        let mut c = OpenAICompletion::new(DEFAULT_MODEL, Some("sk-test".into()), Some(base_url));
        c.retry_delay = Duration::from_millis(5);
        c
    }

    fn turns() -> Vec<ConversationTurn> {
        vec![
            ConversationTurn::system("be brief"),
            ConversationTurn::user("hello"),
        ]
    }

    #[test]
    fn test_empty_key_is_unconfigured() {
        let c = OpenAICompletion::new(DEFAULT_MODEL, Some("  ".into()), None);
        assert!(!c.is_configured());
        assert_eq!(c.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_request_timeout_is_enforced() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"choices": []}))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let c = client(format!("http://{}", addr))
            .with_timeout(Duration::from_millis(50))
            .with_max_retries(0);
        assert_eq!(c.timeout, Duration::from_millis(50));
        let err = c.complete(&turns()).await.unwrap_err();
        assert!(matches!(err, CompletionError::Transport(_)));
    }

    #[test]
    fn test_request_body_shape() {
        let mut c = OpenAICompletion::new("gpt-4o", Some("k".into()), None);
        c.temperature = Some(0.2);
        let messages = turns();
        let body = serde_json::to_value(c.build_request_body(&messages)).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0], json!({"role": "system", "content": "be brief"}));
        assert_eq!(body["temperature"], 0.2);
        assert!(body.get("max_tokens").is_none());
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        let c = OpenAICompletion::new(DEFAULT_MODEL, None, Some("http://127.0.0.1:9".into()));
        let err = c.complete(&turns()).await.unwrap_err();
        assert!(matches!(err, CompletionError::MissingCredential));
    }

    #[tokio::test]
    async fn test_success_returns_choices() {
        let (url, _) = mock_backend(
            StatusCode::OK,
            json!({
                "choices": [
                    {"index": 0, "message": {"role": "assistant", "content": "BTC is up"}, "finish_reason": "stop"}
                ],
                "usage": {"prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13}
            }),
        )
        .await;

        let choices = client(url).complete(&turns()).await.unwrap();
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].message.content, "BTC is up");
        assert_eq!(choices[0].finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn test_insufficient_quota_not_retried() {
        let (url, hits) = mock_backend(
            StatusCode::TOO_MANY_REQUESTS,
            json!({"error": {"message": "quota", "type": "insufficient_quota", "code": "insufficient_quota"}}),
        )
        .await;

        let err = client(url).complete(&turns()).await.unwrap_err();
        assert!(matches!(err, CompletionError::QuotaExceeded { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_not_retried() {
        let (url, hits) = mock_backend(
            StatusCode::TOO_MANY_REQUESTS,
            json!({"error": {"message": "slow down", "type": "requests"}}),
        )
        .await;

        let err = client(url).complete(&turns()).await.unwrap_err();
        assert!(matches!(err, CompletionError::RateLimited { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_error_retried_then_reported() {
        let (url, hits) = mock_backend(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"error": {"message": "overloaded"}}),
        )
        .await;

        let err = client(url).with_max_retries(2).complete(&turns()).await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_choices_is_error() {
        let (url, _) = mock_backend(StatusCode::OK, json!({"choices": []})).await;
        let err = client(url).complete(&turns()).await.unwrap_err();
        assert!(matches!(err, CompletionError::EmptyResponse));
    }
}

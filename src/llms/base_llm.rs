//! Completion backend abstraction.
//!
//! The generative-completion tier talks to its backend only through
//! [`CompletionBackend`]. Backends report failures as a typed
//! [`CompletionError`] so the dispatch engine can classify quota exhaustion
//! and rate limiting without inspecting transport-specific error shapes.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::dispatch::envelope::Choice;
use crate::types::ConversationTurn;

/// Default request timeout for completion calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Failures a completion backend can report.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// No credential configured; the backend cannot be used at all.
    #[error("completion backend credential not configured")]
    MissingCredential,

    /// The account's quota is exhausted.
    #[error("completion quota exceeded: {message}")]
    QuotaExceeded { message: String },

    /// The backend is throttling requests (HTTP 429).
    #[error("rate limited by completion backend: {message}")]
    RateLimited { message: String },

    /// Any other non-success HTTP response.
    #[error("completion API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The request could not be sent or the body could not be read.
    #[error("completion transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not the expected JSON.
    #[error("failed to parse completion response: {0}")]
    Parse(String),

    /// The call did not finish within the tier timeout.
    #[error("completion call timed out after {0:?}")]
    Timeout(Duration),

    /// The backend answered without any choices.
    #[error("completion response contained no choices")]
    EmptyResponse,
}

impl CompletionError {
    /// Build the error for a non-success HTTP status and its body.
    ///
    /// OpenAI-compatible backends report quota exhaustion with HTTP 429 and
    /// an error `type`/`code` of `insufficient_quota`; that marker takes
    /// priority over the status code.
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = ApiErrorBody::parse(body);
        let message = detail
            .as_ref()
            .and_then(|d| d.message.clone())
            .unwrap_or_else(|| body.to_string());

        if detail.as_ref().map_or(false, ApiErrorBody::is_insufficient_quota) {
            return CompletionError::QuotaExceeded { message };
        }
        if status == 429 {
            return CompletionError::RateLimited { message };
        }
        CompletionError::Api {
            status,
            body: body.to_string(),
        }
    }

    /// HTTP status carried by the error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            CompletionError::RateLimited { .. } => Some(429),
            CompletionError::Api { status, .. } => Some(*status),
            CompletionError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// `{"error": {"message", "type", "code"}}` as sent by OpenAI-style APIs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<Value>,
}

impl ApiErrorBody {
    pub fn parse(body: &str) -> Option<Self> {
        #[derive(Deserialize)]
        struct Wrapper {
            error: ApiErrorBody,
        }
        serde_json::from_str::<Wrapper>(body).ok().map(|w| w.error)
    }

    pub fn is_insufficient_quota(&self) -> bool {
        self.error_type.as_deref() == Some("insufficient_quota")
            || self.code.as_ref().and_then(Value::as_str) == Some("insufficient_quota")
    }
}

/// A generative text-completion backend.
#[async_trait]
pub trait CompletionBackend: Send + Sync + fmt::Debug {
    /// Model identifier sent with each request.
    fn model(&self) -> &str;

    /// Whether a credential is present. Backends without one are skipped.
    fn is_configured(&self) -> bool {
        true
    }

    /// Complete the conversation. `messages` already includes the system
    /// prompt as its first turn.
    async fn complete(&self, messages: &[ConversationTurn]) -> Result<Vec<Choice>, CompletionError>;
}

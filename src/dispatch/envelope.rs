//! Response Normalizer — the single envelope shape returned to HTTP callers.
//!
//! ```json
//! {"choices": [{"message": {"role": "assistant", "content": "..."}}]}
//! ```
//!
//! Every tier's output, success or classified failure, is wrapped into this
//! shape before it leaves the engine.

use serde::{Deserialize, Serialize};

use crate::types::{ConversationTurn, Role};

/// One answer candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub message: ConversationTurn,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl Choice {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            message: ConversationTurn::assistant(content),
            index: None,
            finish_reason: None,
        }
    }
}

/// `{choices: [...]}` — the contract with the HTTP boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub choices: Vec<Choice>,
}

impl ResponseEnvelope {
    /// Wrap plain text into a single assistant choice.
    pub fn from_content(content: impl Into<String>) -> Self {
        Self {
            choices: vec![Choice::assistant(content)],
        }
    }

    /// Pass a backend's native choice list through unchanged.
    ///
    /// An empty list still has to yield an answer, so it degrades to a
    /// single empty assistant choice.
    pub fn from_choices(choices: Vec<Choice>) -> Self {
        if choices.is_empty() {
            return Self::from_content(String::new());
        }
        Self { choices }
    }

    /// The first choice's message; downstream consumers read only this one.
    pub fn first_message(&self) -> Option<&ConversationTurn> {
        self.choices.first().map(|c| &c.message)
    }

    /// Content of the first choice, or `""`.
    pub fn content(&self) -> &str {
        self.first_message().map(|m| m.content.as_str()).unwrap_or("")
    }

    pub fn role(&self) -> Option<Role> {
        self.first_message().map(|m| m.role)
    }
}

/// Output of any tier before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierOutput {
    Content(String),
    Choices(Vec<Choice>),
}

impl From<String> for TierOutput {
    fn from(content: String) -> Self {
        TierOutput::Content(content)
    }
}

impl From<Vec<Choice>> for TierOutput {
    fn from(choices: Vec<Choice>) -> Self {
        TierOutput::Choices(choices)
    }
}

pub fn normalize(output: impl Into<TierOutput>) -> ResponseEnvelope {
    match output.into() {
        TierOutput::Content(content) => ResponseEnvelope::from_content(content),
        TierOutput::Choices(choices) => ResponseEnvelope::from_choices(choices),
    }
}

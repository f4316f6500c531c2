//! Error Classifier — maps caught failures to user-visible envelopes.
//!
//! Classification is a pure function onto a closed set of kinds; each kind
//! renders to a fixed assistant message. Nothing here ever returns an
//! error: every path ends in a [`ResponseEnvelope`].

use std::fmt;

use super::envelope::ResponseEnvelope;
use crate::llms::CompletionError;

/// Static answer listing the supported topics. Used by the static tier,
/// when no completion credential is configured, and on quota exhaustion.
pub const CAPABILITY_LIST_MESSAGE: &str = "I can help you with:\n- Market trends\n- Wallet information\n- Transaction history\n- AI insights\n\nPlease ask about one of these topics!";

/// Answer when the completion backend is rate limiting.
pub const HIGH_TRAFFIC_MESSAGE: &str = "I'm currently experiencing high traffic. In the meantime, I can help you with:\n- Market trends\n- Wallet information\n- Transaction history\n- AI insights\n\nPlease try one of these topics!";

/// Answer for any failure without a more specific message.
pub const UNKNOWN_FAILURE_MESSAGE: &str = "I'm having trouble accessing some of my capabilities right now. You can still ask me about market trends, wallet information, or view recent transactions.";

/// Prefix of the answer produced when a matched capability's handler fails.
pub const HANDLER_ERROR_PREFIX: &str = "Error processing request:";

/// Closed set of failure kinds the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// A credential is absent; the tier cannot run.
    ConfigGap,
    /// The completion backend's quota is exhausted.
    Quota,
    /// The completion backend is throttling (HTTP 429).
    RateLimit,
    /// A matched capability's handler failed.
    HandlerFailure,
    /// Anything else.
    Unknown,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::ConfigGap => "config_gap",
            FailureKind::Quota => "quota",
            FailureKind::RateLimit => "rate_limit",
            FailureKind::HandlerFailure => "handler_failure",
            FailureKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Classify a completion-tier failure.
pub fn classify_completion(error: &CompletionError) -> FailureKind {
    match error {
        CompletionError::MissingCredential => FailureKind::ConfigGap,
        CompletionError::QuotaExceeded { .. } => FailureKind::Quota,
        CompletionError::RateLimited { .. } => FailureKind::RateLimit,
        other if other.status() == Some(429) => FailureKind::RateLimit,
        _ => FailureKind::Unknown,
    }
}

/// Render a failure kind into the envelope returned to the caller.
///
/// `detail` is only shown for [`FailureKind::HandlerFailure`]; the other
/// kinds map to fixed text.
pub fn fallback_envelope(kind: FailureKind, detail: &str) -> ResponseEnvelope {
    let content = match kind {
        FailureKind::ConfigGap | FailureKind::Quota => CAPABILITY_LIST_MESSAGE.to_string(),
        FailureKind::RateLimit => HIGH_TRAFFIC_MESSAGE.to_string(),
        FailureKind::HandlerFailure => handler_error_message(detail),
        FailureKind::Unknown => UNKNOWN_FAILURE_MESSAGE.to_string(),
    };
    ResponseEnvelope::from_content(content)
}

pub fn handler_error_message(detail: &str) -> String {
    format!("{} {}", HANDLER_ERROR_PREFIX, detail)
}

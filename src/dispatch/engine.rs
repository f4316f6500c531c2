//! Execution Tier Chain — answers one query by walking the fallback tiers.
//!
//! ```text
//! query ─► intent match ─┬─ matched ──► delegated tier ──► local handler ─► envelope
//!                        │               (skip if no      (success or
//!                        │                credential;      "Error processing
//!                        │                failures fall    request: …")
//!                        │                through)
//!                        └─ no match ─► completion tier ─► static tier ─► envelope
//!                                        (classified        (capability
//!                                         failures)          list)
//! ```
//!
//! Tiers run strictly in sequence within a request. The engine holds only
//! immutable state, so one instance is shared by all in-flight requests.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use super::classify::{classify_completion, fallback_envelope, FailureKind, CAPABILITY_LIST_MESSAGE};
use super::envelope::{normalize, ResponseEnvelope};
use super::intent::IntentMatcher;
use crate::capabilities::{Capability, CapabilityArgs, CapabilityRegistry, HandlerError};
use crate::delegation::{DelegatedExecutor, DelegationError};
use crate::llms::{CompletionBackend, CompletionError};
use crate::types::{latest_user_content, ConversationTurn};

/// Default system prompt for the completion tier.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an AI assistant for Smart Money Tracker, a cyberpunk-themed platform for monitoring cryptocurrency market trends, whale transactions, and wallet insights. Provide detailed, accurate information about crypto markets, wallets, and transactions.";

/// Default bound on each external-call tier.
pub const DEFAULT_TIER_TIMEOUT: Duration = Duration::from_secs(30);

/// The tier that produced a request's final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Delegated,
    LocalHandler,
    Completion,
    Static,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::Delegated => "delegated",
            Tier::LocalHandler => "local_handler",
            Tier::Completion => "completion",
            Tier::Static => "static",
        };
        f.write_str(s)
    }
}

/// Result of one dispatch: the envelope plus how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub envelope: ResponseEnvelope,
    pub tier: Tier,
    /// Name of the matched capability, if any.
    pub capability: Option<String>,
    /// Set when the answer is a classified fallback rather than a result.
    pub failure: Option<FailureKind>,
}

/// The capability-dispatch engine.
pub struct DispatchEngine {
    registry: Arc<CapabilityRegistry>,
    matcher: IntentMatcher,
    delegate: Option<Arc<dyn DelegatedExecutor>>,
    completion: Option<Arc<dyn CompletionBackend>>,
    system_prompt: String,
    tier_timeout: Duration,
}

impl DispatchEngine {
    /// Engine with only the local-handler and static tiers enabled.
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        let matcher = IntentMatcher::from_registry(&registry);
        Self {
            registry,
            matcher,
            delegate: None,
            completion: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            tier_timeout: DEFAULT_TIER_TIMEOUT,
        }
    }

    pub fn with_delegate(mut self, delegate: Option<Arc<dyn DelegatedExecutor>>) -> Self {
        self.delegate = delegate;
        self
    }

    pub fn with_completion(mut self, backend: Option<Arc<dyn CompletionBackend>>) -> Self {
        self.completion = backend;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_tier_timeout(mut self, timeout: Duration) -> Self {
        self.tier_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn delegation_enabled(&self) -> bool {
        self.delegate.is_some()
    }

    pub fn completion_enabled(&self) -> bool {
        self.completion.as_ref().map_or(false, |b| b.is_configured())
    }

    /// Answer a conversation. Never fails.
    pub async fn process(&self, turns: &[ConversationTurn]) -> ResponseEnvelope {
        self.dispatch(turns).await.envelope
    }

    /// Answer a single query, as the HTTP boundary does.
    pub async fn answer(&self, query: &str) -> ResponseEnvelope {
        self.process(&[ConversationTurn::user(query)]).await
    }

    /// Answer a conversation and report which tier produced the answer.
    pub async fn dispatch(&self, turns: &[ConversationTurn]) -> DispatchOutcome {
        let text = latest_user_content(turns);
        match self.matcher.match_intent(text, &self.registry) {
            Some(capability) => {
                tracing::debug!(capability = %capability.name, "intent matched");
                self.run_capability(capability, text).await
            }
            None => {
                tracing::debug!("no capability matched");
                self.run_completion(turns).await
            }
        }
    }

    async fn run_capability(&self, capability: &Capability, text: &str) -> DispatchOutcome {
        let args = capability.extractor.extract(text);
        let mismatches = capability.schema_mismatches(&args);
        if !mismatches.is_empty() {
            tracing::debug!(
                capability = %capability.name,
                problems = ?mismatches,
                "extracted arguments do not match schema"
            );
        }

        if let Some(delegate) = &self.delegate {
            match self.run_delegated(delegate.as_ref(), capability, &args).await {
                Ok(content) => {
                    return DispatchOutcome {
                        envelope: normalize(content),
                        tier: Tier::Delegated,
                        capability: Some(capability.name.clone()),
                        failure: None,
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        channel = delegate.channel(),
                        capability = %capability.name,
                        error = %e,
                        "delegated execution failed; falling back to local handler"
                    );
                }
            }
        }

        let result = AssertUnwindSafe(capability.run(&args))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(HandlerError::Panicked(panic_message(payload))));

        match result {
            Ok(content) => DispatchOutcome {
                envelope: normalize(content),
                tier: Tier::LocalHandler,
                capability: Some(capability.name.clone()),
                failure: None,
            },
            Err(e) => {
                tracing::warn!(capability = %capability.name, error = %e, "capability handler failed");
                DispatchOutcome {
                    envelope: fallback_envelope(FailureKind::HandlerFailure, &e.to_string()),
                    tier: Tier::LocalHandler,
                    capability: Some(capability.name.clone()),
                    failure: Some(FailureKind::HandlerFailure),
                }
            }
        }
    }

    async fn run_delegated(
        &self,
        delegate: &dyn DelegatedExecutor,
        capability: &Capability,
        args: &CapabilityArgs,
    ) -> Result<String, DelegationError> {
        let call = AssertUnwindSafe(delegate.execute(capability, args)).catch_unwind();
        match tokio::time::timeout(self.tier_timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(payload)) => Err(DelegationError::Panicked(panic_message(payload))),
            Err(_) => Err(DelegationError::TimedOut(self.tier_timeout)),
        }
    }

    async fn run_completion(&self, turns: &[ConversationTurn]) -> DispatchOutcome {
        let backend = match self.completion.as_ref().filter(|b| b.is_configured()) {
            Some(backend) => backend,
            None => return self.run_static(),
        };

        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(ConversationTurn::system(self.system_prompt.as_str()));
        messages.extend(turns.iter().cloned());

        let result = tokio::time::timeout(self.tier_timeout, backend.complete(&messages))
            .await
            .unwrap_or(Err(CompletionError::Timeout(self.tier_timeout)));

        match result {
            Ok(choices) => DispatchOutcome {
                envelope: normalize(choices),
                tier: Tier::Completion,
                capability: None,
                failure: None,
            },
            Err(e) => {
                let kind = classify_completion(&e);
                match kind {
                    FailureKind::ConfigGap => return self.run_static(),
                    FailureKind::Unknown => {
                        tracing::error!(model = backend.model(), error = %e, "completion tier failed")
                    }
                    _ => tracing::warn!(model = backend.model(), kind = %kind, error = %e, "completion tier degraded"),
                }
                DispatchOutcome {
                    envelope: fallback_envelope(kind, &e.to_string()),
                    tier: Tier::Completion,
                    capability: None,
                    failure: Some(kind),
                }
            }
        }
    }

    fn run_static(&self) -> DispatchOutcome {
        tracing::debug!("completion backend not configured; answering from static tier");
        DispatchOutcome {
            envelope: ResponseEnvelope::from_content(CAPABILITY_LIST_MESSAGE),
            tier: Tier::Static,
            capability: None,
            failure: Some(FailureKind::ConfigGap),
        }
    }
}

/// Text of a caught panic payload.
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("capabilities", &self.registry.names())
            .field("delegate", &self.delegate)
            .field("completion", &self.completion)
            .field("tier_timeout", &self.tier_timeout)
            .finish()
    }
}

//! Capability dispatch.
//!
//! Turns a conversation into a [`ResponseEnvelope`]: the intent matcher
//! picks a capability, the argument extractor fills its arguments, and the
//! [`DispatchEngine`] walks the execution tiers until one produces an
//! answer. Failures are classified and rendered, never returned.

pub mod args;
pub mod classify;
pub mod engine;
pub mod envelope;
pub mod intent;

pub use args::{extract, ArgExtractor};
pub use classify::{classify_completion, fallback_envelope, FailureKind};
pub use engine::{DispatchEngine, DispatchOutcome, Tier, DEFAULT_SYSTEM_PROMPT, DEFAULT_TIER_TIMEOUT};
pub use envelope::{normalize, Choice, ResponseEnvelope, TierOutput};
pub use intent::{match_intent, IntentMatcher, IntentPredicate, IntentRule};

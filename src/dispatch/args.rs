//! Argument Extractor — best-effort structured arguments from raw text.
//!
//! Every extractor is total: it never fails and never blocks. Fields it
//! cannot find come back as `null` rather than being treated as errors;
//! whether a missing field matters is the handler's call.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::capabilities::{CapabilityArgs, CapabilityRegistry};

static HEX_ADDRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"0x[a-fA-F0-9]+").unwrap());

/// Keywords that mark a history query as asking for recent activity.
pub const RECENCY_KEYWORDS: &[&str] = &["recent", "latest"];

/// Default topics flagged by the insights extractor.
pub const INSIGHT_TOPICS: &[&str] = &["price", "whale", "market", "trend"];

/// Per-capability extraction heuristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgExtractor {
    /// `{"address": "0x…" | null}` — first hex-prefixed token, original casing.
    Address,
    /// `{"limit": n}` — `recent_limit` when a recency keyword is present.
    History {
        recent_limit: u64,
        default_limit: u64,
    },
    /// `{"insights": {topic: bool, …}}` — one flag per topic keyword.
    Insights { topics: Vec<String> },
    /// `{}`
    Empty,
}

impl ArgExtractor {
    pub fn history() -> Self {
        ArgExtractor::History {
            recent_limit: 5,
            default_limit: 10,
        }
    }

    pub fn insights() -> Self {
        ArgExtractor::Insights {
            topics: INSIGHT_TOPICS.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn extract(&self, text: &str) -> CapabilityArgs {
        let lowered = text.to_lowercase();
        let mut args = CapabilityArgs::new();
        match self {
            ArgExtractor::Address => {
                let address = first_hex_token(text).map_or(Value::Null, Value::from);
                args.insert("address".into(), address);
            }
            ArgExtractor::History {
                recent_limit,
                default_limit,
            } => {
                let recent = RECENCY_KEYWORDS.iter().any(|k| lowered.contains(k));
                let limit = if recent { *recent_limit } else { *default_limit };
                args.insert("limit".into(), json!(limit));
            }
            ArgExtractor::Insights { topics } => {
                let flags: serde_json::Map<String, Value> = topics
                    .iter()
                    .map(|t| (t.clone(), Value::Bool(lowered.contains(&t.to_lowercase()))))
                    .collect();
                args.insert("insights".into(), Value::Object(flags));
            }
            ArgExtractor::Empty => {}
        }
        args
    }
}

/// First `0x`-prefixed hexadecimal token in `text`.
pub fn first_hex_token(text: &str) -> Option<&str> {
    HEX_ADDRESS.find(text).map(|m| m.as_str())
}

/// Extract arguments for the capability named `capability_name`.
/// Unknown names yield an empty map.
pub fn extract(text: &str, capability_name: &str, registry: &CapabilityRegistry) -> CapabilityArgs {
    registry
        .get(capability_name)
        .map(|cap| cap.extractor.extract(text))
        .unwrap_or_default()
}

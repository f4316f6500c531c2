//! # Smart Money Agent
//!
//! Capability-dispatch engine behind the Smart Money Tracker crypto
//! assistant. A natural-language query is matched against an ordered set of
//! capabilities by keyword, its arguments are extracted heuristically, and
//! the answer is produced by the first execution tier that succeeds:
//! delegated execution, the local handler, a generative completion backend,
//! or a static capability list. Every path ends in the same
//! `{choices: [{message: {role, content}}]}` envelope.
//!
//! ```no_run
//! use std::sync::Arc;
//! use smart_money_agent::capabilities::builtin_registry;
//! use smart_money_agent::dispatch::DispatchEngine;
//! use smart_money_agent::storage::MarketStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MarketStore::seeded(chrono::Utc::now()));
//! let engine = DispatchEngine::new(Arc::new(builtin_registry(store)?));
//! let envelope = engine.answer("show recent transactions").await;
//! println!("{}", envelope.content());
//! # Ok(())
//! # }
//! ```

pub mod capabilities;
pub mod config;
pub mod delegation;
pub mod dispatch;
pub mod llms;
pub mod server;
pub mod storage;
pub mod types;

pub use capabilities::{Capability, CapabilityRegistry};
pub use config::DispatchConfig;
pub use dispatch::{DispatchEngine, ResponseEnvelope};
pub use types::{ConversationTurn, Role};

/// Crate version reported by the health probe.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name reported by the health probe.
pub const SERVICE_NAME: &str = "smart-money-agent";

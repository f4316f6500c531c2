//! HTTP boundary for the Smart Money agent.
//!
//! # Endpoints
//!
//! - `GET  /api/health`          — Liveness probe
//! - `POST /api/ai/query`        — Answer a natural-language query
//! - `GET  /api/ai/capabilities` — List registered capabilities

pub mod routes;

pub use routes::{app_router, AppState, QueryRequest};

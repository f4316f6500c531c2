//! Axum route handlers for the Smart Money agent HTTP server.
//!
//! # Routes
//!
//! - `GET  /api/health`           — Returns `{"status": "ok", "version": ..., "service": ...}`
//! - `POST /api/ai/query`         — Accepts `{"query": "..."}`, returns `{"choices": [...]}`
//! - `GET  /api/ai/capabilities`  — Registered capabilities in precedence order

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::dispatch::{DispatchEngine, ResponseEnvelope};
use crate::types::ConversationTurn;

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// The dispatch engine; immutable, shared by all requests.
    pub engine: Arc<DispatchEngine>,
}

impl AppState {
    pub fn new(engine: DispatchEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

/// Body of `POST /api/ai/query`.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: Option<String>,
}

type ApiError = (StatusCode, Json<Value>);

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route(
            "/api/ai/query",
            post(query_handler).fallback(method_not_allowed),
        )
        .route("/api/ai/capabilities", get(capabilities_handler))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /api/health — liveness probe.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": crate::SERVICE_NAME,
        "capabilities": state.engine.registry().len(),
        "delegation": state.engine.delegation_enabled(),
        "completion": state.engine.completion_enabled(),
    }))
}

/// GET /api/ai/capabilities — registered capabilities in precedence order.
async fn capabilities_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "capabilities": state.engine.registry().descriptors() }))
}

/// POST /api/ai/query — answer one query.
///
/// The query becomes a single user turn. Handler panics are already turned
/// into answers by the engine; the spawned task only backstops a panic in
/// the engine itself, which surfaces as a 500.
async fn query_handler(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<ResponseEnvelope>, ApiError> {
    let query = match payload {
        Ok(Json(body)) => body.query,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "rejected query body");
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Query is required",
                    "details": rejection.body_text(),
                })),
            ));
        }
    };

    let query = match query {
        Some(q) if !q.trim().is_empty() => q,
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Query is required"})),
            ))
        }
    };

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("query", %request_id);
    let engine = state.engine.clone();

    let result = tokio::spawn(
        async move {
            tracing::debug!(chars = query.len(), "dispatching query");
            let turns = [ConversationTurn::user(query)];
            let outcome = engine.dispatch(&turns).await;
            tracing::info!(
                tier = %outcome.tier,
                capability = outcome.capability.as_deref().unwrap_or("-"),
                "query answered"
            );
            outcome.envelope
        }
        .instrument(span),
    )
    .await;

    match result {
        Ok(envelope) => Ok(Json(envelope)),
        Err(join_error) => {
            tracing::error!(%request_id, error = %join_error, "query task failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal Server Error",
                    "details": join_error.to_string(),
                })),
            ))
        }
    }
}

async fn method_not_allowed() -> ApiError {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({"error": "Method Not Allowed"})),
    )
}

async fn not_found(uri: Uri) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": format!("Route not found: {}", uri.path())})),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use tower::ServiceExt;

    use crate::capabilities::{builtin_registry, Capability, CapabilityRegistry};
    use crate::dispatch::classify::CAPABILITY_LIST_MESSAGE;
    use crate::dispatch::IntentPredicate;
    use crate::storage::MarketStore;

    fn app() -> Router {
        let registry = builtin_registry(Arc::new(MarketStore::seeded(Utc::now()))).unwrap();
        app_router(AppState::new(DispatchEngine::new(Arc::new(registry))))
    }

    async fn send(app: Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (status, json) = send(app(), "GET", "/api/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::VERSION);
        assert_eq!(json["service"], crate::SERVICE_NAME);
        assert_eq!(json["capabilities"], 4);
        assert_eq!(json["completion"], false);
    }

    #[tokio::test]
    async fn test_wallet_query_end_to_end() {
        let (status, json) = send(
            app(),
            "POST",
            "/api/ai/query",
            r#"{"query": "what's my wallet balance for 0xABCDEF1234?"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["choices"][0]["message"]["role"], "assistant");
        let content = json["choices"][0]["message"]["content"].as_str().unwrap();
        assert!(content.contains("0xABCDEF1234"));
        assert!(content.contains("Balance:"));
    }

    #[tokio::test]
    async fn test_unmatched_query_without_credentials() {
        let (status, json) = send(app(), "POST", "/api/ai/query", r#"{"query": "hello there"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["choices"][0]["message"]["content"], CAPABILITY_LIST_MESSAGE);
    }

    #[tokio::test]
    async fn test_handler_failure_is_still_200() {
        let (status, json) = send(
            app(),
            "POST",
            "/api/ai/query",
            r#"{"query": "show my wallet"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json["choices"][0]["message"]["content"],
            "Error processing request: missing required argument 'address'"
        );
    }

    #[tokio::test]
    async fn test_missing_query_is_400() {
        for body in [r#"{}"#, r#"{"query": null}"#, r#"{"query": ""}"#, r#"{"query": "   "}"#] {
            let (status, json) = send(app(), "POST", "/api/ai/query", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {}", body);
            assert_eq!(json, json!({"error": "Query is required"}));
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_400_with_details() {
        let (status, json) = send(app(), "POST", "/api/ai/query", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Query is required");
        assert!(json["details"].is_string());

        let (status, _) = send(app(), "POST", "/api/ai/query", r#"{"query": 42}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_other_methods_are_405() {
        for method in ["GET", "PUT", "DELETE"] {
            let (status, json) = send(app(), method, "/api/ai/query", "").await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(json["error"], "Method Not Allowed");
        }
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (status, json) = send(app(), "GET", "/api/nope", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Route not found: /api/nope");
    }

    #[tokio::test]
    async fn test_capabilities_listing_in_order() {
        let (status, json) = send(app(), "GET", "/api/ai/capabilities", "").await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = json["capabilities"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec!["getMarketTrends", "getWalletInfo", "getTransactionInfo", "getAIInsights"]
        );
    }

    #[tokio::test]
    async fn test_panicking_handler_is_still_200() {
        let boom = Capability::from_fn("boom", "panics", |args| async move {
            if args.is_empty() {
                panic!("bad index");
            }
            Ok(String::new())
        })
        .with_intent(IntentPredicate::any_of(["boom"]));
        let registry = CapabilityRegistry::builder().register(boom).unwrap().build();
        let app = app_router(AppState::new(DispatchEngine::new(Arc::new(registry))));

        let (status, json) = send(app, "POST", "/api/ai/query", r#"{"query": "boom"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["choices"][0]["message"]["role"], "assistant");
        let content = json["choices"][0]["message"]["content"].as_str().unwrap();
        assert!(content.starts_with("Error processing request:"));
        assert!(content.contains("bad index"));
    }

    #[tokio::test]
    async fn test_market_trends_listed_without_arguments() {
        let (_, json) = send(app(), "GET", "/api/ai/capabilities", "").await;
        let trends = &json["capabilities"][0];
        assert_eq!(trends["name"], "getMarketTrends");
        assert_eq!(trends["args_schema"], json!({}));
        assert_eq!(json["capabilities"][1]["args_schema"]["address"]["required"], true);
    }
}

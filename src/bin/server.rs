//! Smart Money agent HTTP server binary.
//!
//! # Environment Variables
//!
//! - `PORT` — HTTP port (default: 5000)
//! - `BIND_HOST` — Bind address (default: 0.0.0.0)
//! - `OPENAI_API_KEY` — Enables the completion tier for unmatched queries
//! - `OPENSERV_API_KEY` — Enables delegated execution of matched capabilities
//! - `RUST_LOG` — Tracing filter (default: "info,smart_money_agent=debug")
//!
//! See `smart_money_agent::config` for the rest.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server
//! ```

use std::sync::Arc;

use anyhow::Context;
use smart_money_agent::capabilities::builtin_registry;
use smart_money_agent::config::DispatchConfig;
use smart_money_agent::server::{app_router, AppState};
use smart_money_agent::storage::MarketStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,smart_money_agent=debug".into()),
        )
        .init();

    let config = DispatchConfig::from_env().context("invalid configuration")?;
    tracing::debug!(?config, "configuration loaded");

    let store = Arc::new(MarketStore::seeded(chrono::Utc::now()));
    let registry = builtin_registry(store).context("failed to register capabilities")?;
    let engine = config.build_engine(Arc::new(registry));

    tracing::info!(
        capabilities = ?engine.registry().names(),
        delegation = engine.delegation_enabled(),
        completion = engine.completion_enabled(),
        "dispatch engine ready"
    );

    let app = app_router(AppState::new(engine));
    let bind_addr = config.bind_addr();

    tracing::info!("smart-money-agent server starting on {}", bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /api/health          — liveness probe");
    tracing::info!("  POST /api/ai/query        — answer a query");
    tracing::info!("  GET  /api/ai/capabilities — registered capabilities");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

//! Agent HTTP Server
//!
//! Axum front end over the tool-calling agent loop. Each `POST /api/run`
//! gets its own agent and message log; the adapter and tool registry are
//! shared read-only across requests.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{AgentConfig, ToolRegistry, builtin::register_builtins};

use crate::handlers::{health_check, list_tools, run_handler};
use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/tools", get(list_tools))
        .route("/api/run", post(run_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AgentConfig::from_env()?;
    let adapter = agent_runtime::adapter_for(&config)?;
    tracing::info!(
        backend = %config.backend,
        model = %config.model,
        max_iterations = config.max_iterations,
        "Provider adapter ready"
    );

    let mut tools = ToolRegistry::new();
    register_builtins(&mut tools)?;
    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    let state = AppState {
        adapter,
        tools: Arc::new(tools),
        config: Arc::new(config),
    };

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Agent server listening on http://{}", addr);
    tracing::info!("  GET  /health    - Health check");
    tracing::info!("  GET  /api/tools - Tool catalog");
    tracing::info!("  POST /api/run   - Run the agent on {{\"input\": \"...\"}}");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

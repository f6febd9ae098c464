//! Banking assistant HTTP Server
//!
//! Axum-based REST API over the tool-calling orchestrator, with the banking
//! tool pack on a mock core-banking backend.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{MemorySessionStore, OrchestratorBuilder, SessionStoreConfig, ToolRegistry};
use agent_runtime::{ProviderConfig, create_provider};
use banking_tools::{BANKING_ASSISTANT_PROMPT, BankingBackend, MockBankingBackend, register_banking_tools};

use crate::handlers::{chat_handler, delete_session, health_check, list_sessions, session_messages};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    // Initialize LLM provider
    let provider_config = ProviderConfig::from_env()?;
    let provider = create_provider(&provider_config)?;

    // Initialize tools
    let backend: Arc<dyn BankingBackend> = Arc::new(MockBankingBackend::new());
    let mut tools = ToolRegistry::new();
    register_banking_tools(&mut tools, &backend);
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    // Sessions with background expiry
    let sessions = MemorySessionStore::start(SessionStoreConfig::from_env());

    let mut builder = OrchestratorBuilder::new()
        .provider(provider)
        .tools(Arc::new(tools))
        .sessions(sessions.clone())
        .system_prompt(BANKING_ASSISTANT_PROMPT);
    if let Some(max_rounds) = std::env::var("MAX_TOOL_ROUNDS").ok().and_then(|v| v.parse().ok()) {
        builder = builder.max_rounds(max_rounds);
    }
    let orchestrator = Arc::new(builder.build()?);

    // Build application state
    let state = AppState {
        orchestrator,
        sessions: sessions.clone(),
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/chat", post(chat_handler))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/{id}", delete(delete_session))
        .route("/api/sessions/{id}/messages", get(session_messages))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🏦 banking assistant running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health                      - Health check");
    tracing::info!("  POST   /api/chat                    - Send message");
    tracing::info!("  GET    /api/sessions                - List sessions");
    tracing::info!("  GET    /api/sessions/{{id}}/messages  - Session transcript");
    tracing::info!("  DELETE /api/sessions/{{id}}           - End session");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sessions.shutdown();
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

//! HTTP Handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use agent_core::{
    AgentError, Message, SessionId, SessionStore, SessionSummary, TokenUsage, ToolContext,
    history_adapter,
};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub provider: String,
    pub model: String,
    pub tools: usize,
    pub active_sessions: usize,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Omit to start a new conversation
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub session_id: String,
    pub rounds: usize,
    pub tools_used: Vec<String>,
    pub usage: TokenUsage,
    pub hit_round_limit: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

/// Map orchestration failures to HTTP. Vendor detail stays in the logs.
fn agent_error(e: &AgentError) -> ApiError {
    let (status, code) = match e {
        AgentError::InvalidMessage(_) => (StatusCode::BAD_REQUEST, "INVALID_MESSAGE"),
        AgentError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
        AgentError::Provider { .. }
        | AgentError::ProviderUnavailable(_)
        | AgentError::Auth(_)
        | AgentError::InvalidResponse(_)
        | AgentError::MalformedToolArguments { .. } => (StatusCode::BAD_GATEWAY, "PROCESSING_FAILED"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "PROCESSING_FAILED"),
    };
    api_error(status, e.user_message(), code)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let provider = state.orchestrator.provider();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        provider: provider.provider_kind().to_string(),
        model: provider.config().model.clone(),
        tools: state.orchestrator.tools().len(),
        active_sessions: state.sessions.list().await.len(),
    })
}

/// Main chat endpoint
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let session_id = payload
        .session_id
        .filter(|id| !id.trim().is_empty())
        .map_or_else(SessionId::new, SessionId::from_string);

    let mut ctx = ToolContext::new(session_id.as_str());
    if let Some(user_id) = payload.user_id {
        ctx = ctx.with_user(user_id);
    }

    let outcome = state
        .orchestrator
        .handle_message(&session_id, &payload.message, &ctx)
        .await
        .map_err(|e| {
            tracing::error!(%session_id, error = %e, "Chat request failed");
            agent_error(&e)
        })?;

    Ok(Json(ChatResponse {
        message: outcome.text,
        session_id: session_id.to_string(),
        rounds: outcome.rounds,
        tools_used: outcome
            .tool_invocations
            .into_iter()
            .map(|i| i.call.name)
            .collect(),
        usage: outcome.usage,
        hit_round_limit: outcome.hit_round_limit,
    }))
}

/// Live sessions, most recent first
pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.sessions.list().await)
}

/// Vendor-neutral view of a session's transcript
pub async fn session_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let session = state
        .sessions
        .get(&SessionId::from_string(id))
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Session not found", "SESSION_NOT_FOUND"))?;

    let messages = history_adapter(session.provider)
        .to_agnostic_format(&session.history)
        .map_err(|e| {
            tracing::error!(session_id = %session.id, error = %e, "Stored transcript unreadable");
            agent_error(&e)
        })?;

    Ok(Json(messages))
}

/// End a conversation
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.orchestrator.reset_session(&SessionId::from_string(id)).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(StatusCode::NOT_FOUND, "Session not found", "SESSION_NOT_FOUND"))
    }
}

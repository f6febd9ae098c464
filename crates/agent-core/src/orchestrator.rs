//! Orchestration Loop
//!
//! Alternates between asking the model and running the tools it requests:
//!
//! ```text
//! AWAIT_MODEL ──(no tool calls)──▶ DONE
//!      │
//!      └─(tool calls)─▶ EXECUTE_TOOLS ──(round + 1)──▶ AWAIT_MODEL
//! ```
//!
//! Every tool call of a round is executed in emission order and its result
//! appended before the next model call, so the transcript never holds an
//! unanswered call. Each finished round is persisted right away. A fixed
//! round ceiling ends runaway tool use with a canned reply.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::message::ToolCall;
use crate::provider::{LlmProvider, TokenUsage};
use crate::session::{SessionId, SessionStore};
use crate::tool::{ToolContext, ToolExecutionResult, ToolRegistry};

/// Orchestrator configuration
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// System instruction sent with every model call
    pub system_prompt: Option<String>,

    /// Maximum model calls per user message
    pub max_rounds: usize,

    /// Reply used when the round ceiling is hit
    pub round_limit_message: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_rounds: DEFAULT_MAX_ROUNDS,
            round_limit_message: ROUND_LIMIT_MESSAGE.into(),
        }
    }
}

pub const DEFAULT_MAX_ROUNDS: usize = 5;

const ROUND_LIMIT_MESSAGE: &str = "I'm sorry, I couldn't complete your request right now. \
Please try again or rephrase it more simply.";

/// One executed tool call
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// 1-based round the call was made in
    pub round: usize,
    pub call: ToolCall,
    pub result: ToolExecutionResult,
}

/// Result of handling one user message
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatOutcome {
    /// Final reply shown to the user
    pub text: String,

    /// Model calls made
    pub rounds: usize,

    /// Usage summed over all rounds
    pub usage: TokenUsage,

    /// Tool calls in execution order
    pub tool_invocations: Vec<ToolInvocation>,

    /// Whether the round ceiling forced the reply
    pub hit_round_limit: bool,
}

/// Drives provider, tools and session store for each user message
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    sessions: Arc<dyn SessionStore>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        sessions: Arc<dyn SessionStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            sessions,
            config,
        }
    }

    /// Handle one user message for a session.
    ///
    /// Only vendor transport/auth failures and malformed tool arguments are
    /// returned as errors. Tool failures go back to the model as results.
    pub async fn handle_message(
        &self,
        session_id: &SessionId,
        text: &str,
        ctx: &ToolContext,
    ) -> Result<ChatOutcome> {
        if text.trim().is_empty() {
            return Err(AgentError::InvalidMessage("message is empty".into()));
        }

        // One in-flight loop per session
        let _guard = self.sessions.lock(session_id).await;

        let kind = self.provider.provider_kind();
        let session = self.sessions.get_or_create(session_id, kind).await?;
        if session.provider != kind {
            return Err(AgentError::Config(format!(
                "session {session_id} holds a {} transcript but the active provider is {kind}",
                session.provider
            )));
        }

        let ctx = ctx.clone().with_conversation(session.conversation_id.to_string());

        let adapter = self.provider.history_adapter();
        let tools = self.tools.definitions();
        let system_prompt = self.config.system_prompt.as_deref();

        let mut history = adapter.add_user_message(&session.history, text)?;
        let mut usage = TokenUsage::default();
        let mut invocations = Vec::new();

        for round in 1..=self.config.max_rounds {
            tracing::debug!(%session_id, round, turns = history.len(), "Calling model");

            let response = self
                .provider
                .generate_with_native_history(&history, system_prompt, &tools)
                .await
                .inspect_err(|e| tracing::error!(%session_id, round, error = %e, "Model call failed"))?;
            usage += response.usage;

            if !response.has_tool_calls() {
                let reply = response.text.unwrap_or_default();
                history = adapter.add_assistant_message(&history, &reply)?;
                self.sessions.update_history(session_id, history).await?;

                return Ok(ChatOutcome {
                    text: reply,
                    rounds: round,
                    usage,
                    tool_invocations: invocations,
                    hit_round_limit: false,
                });
            }

            history = adapter.add_assistant_tool_calls(
                &history,
                &response.tool_calls,
                Some(&response.raw_response),
            )?;

            for call in &response.tool_calls {
                tracing::debug!(%session_id, round, tool = %call.name, call_id = %call.id, "Executing tool");
                let result = self.tools.execute(call, &ctx).await;
                history = adapter.add_tool_results(&history, call, &result)?;
                invocations.push(ToolInvocation {
                    round,
                    call: call.clone(),
                    result,
                });
            }

            self.sessions
                .update_history(session_id, history.clone())
                .await?;
        }

        tracing::warn!(
            %session_id,
            max_rounds = self.config.max_rounds,
            "Round limit reached, ending with canned reply"
        );
        let reply = self.config.round_limit_message.clone();
        history = adapter.add_assistant_message(&history, &reply)?;
        self.sessions.update_history(session_id, history).await?;

        Ok(ChatOutcome {
            text: reply,
            rounds: self.config.max_rounds,
            usage,
            tool_invocations: invocations,
            hit_round_limit: true,
        })
    }

    /// Drop a session's conversation
    pub async fn reset_session(&self, session_id: &SessionId) -> bool {
        self.sessions.delete(session_id).await
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }
}

/// Builder for [`Orchestrator`]
#[derive(Default)]
pub struct OrchestratorBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: Option<Arc<ToolRegistry>>,
    sessions: Option<Arc<dyn SessionStore>>,
    config: OrchestratorConfig,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    #[must_use]
    pub fn sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    #[must_use]
    pub const fn max_rounds(mut self, max: usize) -> Self {
        self.config.max_rounds = max;
        self
    }

    #[must_use]
    pub fn round_limit_message(mut self, message: impl Into<String>) -> Self {
        self.config.round_limit_message = message.into();
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;
        let sessions = self
            .sessions
            .ok_or_else(|| AgentError::Config("Session store is required".into()))?;
        if self.config.max_rounds == 0 {
            return Err(AgentError::Config("max_rounds must be at least 1".into()));
        }

        Ok(Orchestrator::new(
            provider,
            self.tools.unwrap_or_default(),
            sessions,
            self.config,
        ))
    }
}

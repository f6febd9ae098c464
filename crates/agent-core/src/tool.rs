//! Tool System
//!
//! Name-keyed registry of tool schemas and async handlers. The executor never
//! fails: unknown tools, handler errors and handler panics all come back as
//! failure results so the orchestration loop can feed them to the model.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::message::ToolCall;

/// Tool schema advertised to the model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// JSON Schema object describing the arguments
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Normalized outcome of a tool execution
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    /// Whether execution succeeded
    pub success: bool,

    /// Human-readable outcome
    pub message: String,

    /// Structured data (if applicable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolExecutionResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Request-scoped context handed to every handler
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ToolContext {
    pub session_id: String,

    #[serde(default)]
    pub user_id: Option<String>,

    /// Set by the orchestrator. Differs between two conversations that
    /// reuse one session id.
    #[serde(default)]
    pub conversation_id: Option<String>,

    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ToolContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }
}

/// Tool trait - implement to add new capabilities
///
/// Business failures should be returned as `Ok(ToolExecutionResult::failure(..))`.
/// An `Err` is treated as a handler fault and converted by the registry.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Schema for LLM function calling
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with the call's arguments
    async fn execute(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
    ) -> anyhow::Result<ToolExecutionResult>;
}

/// Registry for available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. The first registration of a name wins; later ones are ignored.
    ///
    /// Returns `true` if the tool was added.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> bool {
        self.register_arc(Arc::new(tool))
    }

    /// Register a shared tool. Same idempotence as [`ToolRegistry::register`].
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> bool {
        let name = tool.definition().name;
        if self.tools.contains_key(&name) {
            tracing::warn!(tool = %name, "Tool already registered, keeping first registration");
            return false;
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        true
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Schemas in registration order, for advertisement to the model
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.definition())
            .collect()
    }

    /// Tool names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// A call is valid when it names a registered tool. Arguments may be empty.
    pub fn is_valid_call(&self, call: &ToolCall) -> bool {
        !call.name.trim().is_empty() && self.tools.contains_key(&call.name)
    }

    /// Execute a tool call. Never fails; every fault becomes a failure result.
    pub async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> ToolExecutionResult {
        let Some(tool) = self.get(&call.name) else {
            tracing::warn!(tool = %call.name, session_id = %ctx.session_id, "Model requested unknown tool");
            return ToolExecutionResult::failure(format!(
                "Tool '{}' not found. Available tools: {}",
                call.name,
                self.names().join(", ")
            ));
        };

        let outcome = AssertUnwindSafe(tool.execute(call, ctx))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => {
                tracing::debug!(tool = %call.name, success = result.success, "Tool executed");
                result
            }
            Ok(Err(e)) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool handler failed");
                ToolExecutionResult::failure(format!("Tool '{}' failed: {e}", call.name))
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".into());
                tracing::error!(tool = %call.name, %reason, "Tool handler panicked");
                ToolExecutionResult::failure(format!("Tool '{}' failed: {reason}", call.name))
            }
        }
    }
}

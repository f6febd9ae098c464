//! LLM Provider Strategy Pattern
//!
//! Common interface for all LLM vendors. The orchestration loop only talks to
//! [`LlmProvider`]; vendor request/response shapes stay behind it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::LlmProvider;
//!
//! let provider = OpenAiProvider::from_config(config)?;
//! let history = provider.history_adapter().new_history();
//! let response = provider
//!     .generate_with_native_history(&history, Some(SYSTEM_PROMPT), &tools)
//!     .await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::history::{HistoryAdapter, NativeHistory, history_adapter};
use crate::message::{Message, ToolArgs, ToolCall};
use crate::tool::ToolDefinition;

/// Closed set of supported vendor families
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible chat completions (tool results keyed by call id)
    OpenAi,
    /// Google Gemini `generateContent` (tool results keyed by tool name)
    Gemini,
}

impl ProviderKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" | "openai-compatible" => Ok(Self::OpenAi),
            "gemini" | "google" | "google-gemini" => Ok(Self::Gemini),
            other => Err(AgentError::Config(format!(
                "unknown LLM provider '{other}' (expected 'openai' or 'gemini')"
            ))),
        }
    }
}

/// Sampling configuration held by a provider
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Model identifier (e.g., "gpt-4o-mini", "gemini-2.0-flash")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Top-p nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Stop sequences
    #[serde(default)]
    pub stop_sequences: Vec<String>,
}

const fn default_temperature() -> f32 { 0.2 }
const fn default_max_tokens() -> u32 { 1024 }
const fn default_top_p() -> f32 { 0.95 }

impl GenerationConfig {
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            stop_sequences: Vec::new(),
        }
    }

    /// Merge a partial override, keeping every field the override leaves unset
    pub fn merge(&mut self, overrides: GenerationOverrides) {
        if let Some(model) = overrides.model {
            self.model = model;
        }
        if let Some(temperature) = overrides.temperature {
            self.temperature = temperature;
        }
        if let Some(max_tokens) = overrides.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(top_p) = overrides.top_p {
            self.top_p = top_p;
        }
        if let Some(stop_sequences) = overrides.stop_sequences {
            self.stop_sequences = stop_sequences;
        }
    }
}

/// Partial update for [`GenerationConfig`]
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GenerationOverrides {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub stop_sequences: Option<Vec<String>>,
}

/// Token usage statistics; zero when the vendor omits counts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
        self.total_tokens += rhs.total_tokens;
    }
}

/// Unmodified vendor payload, tagged with the vendor that produced it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    pub vendor: ProviderKind,
    pub payload: serde_json::Value,
}

/// Normalized response from one model call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    /// `None` when the reply has no textual part
    pub text: Option<String>,

    /// Empty when the model requested no tools
    pub tool_calls: Vec<ToolCall>,

    pub usage: TokenUsage,

    /// Kept only so the history adapter can replay vendor structure
    pub raw_response: RawResponse,
}

impl LlmResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Parse tool arguments a vendor transmitted as a serialized string.
///
/// Blank strings mean "no arguments". Anything else must be a JSON object.
pub fn parse_tool_arguments(tool: &str, raw: &str) -> Result<ToolArgs> {
    if raw.trim().is_empty() {
        return Ok(ToolArgs::new());
    }
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(args)) => Ok(args),
        Ok(other) => Err(AgentError::MalformedToolArguments {
            tool: tool.to_string(),
            reason: format!("expected a JSON object, got {other}"),
        }),
        Err(e) => Err(AgentError::MalformedToolArguments {
            tool: tool.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Vendor identity; stable for the lifetime of the instance
    fn provider_kind(&self) -> ProviderKind;

    /// Current generation configuration
    fn config(&self) -> &GenerationConfig;

    /// Merge a partial override into the held configuration
    fn update_config(&mut self, overrides: GenerationOverrides);

    /// Stateless single call built from agnostic messages
    async fn generate_response(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse>;

    /// Call with a transcript produced by the matching history adapter
    async fn generate_with_native_history(
        &self,
        history: &NativeHistory,
        system_prompt: Option<&str>,
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse>;

    /// The history adapter that builds transcripts this provider accepts
    fn history_adapter(&self) -> &'static dyn HistoryAdapter {
        history_adapter(self.provider_kind())
    }
}

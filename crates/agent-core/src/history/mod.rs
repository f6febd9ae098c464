//! History Adapters
//!
//! Each vendor family has its own transcript shape. A [`NativeHistory`] holds
//! exactly one of them, and only the matching [`HistoryAdapter`] looks inside.
//! Every other component treats the transcript as opaque.
//!
//! | Agnostic turn         | OpenAI family                        | Gemini family                              |
//! |-----------------------|--------------------------------------|--------------------------------------------|
//! | user                  | `user`                               | `user`                                     |
//! | assistant (text)      | `assistant`                          | `model`                                    |
//! | assistant (tool call) | `assistant`, no content, `tool_calls`| `model`, `functionCall` parts              |
//! | tool (result)         | `tool`, keyed by `tool_call_id`      | `user`, `functionResponse` keyed by name   |
//!
//! All operations are pure: they return a new transcript and leave the input untouched.

pub mod gemini;
pub mod openai;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::message::{Message, ToolCall};
use crate::provider::{ProviderKind, RawResponse};
use crate::tool::ToolExecutionResult;

pub use gemini::GeminiHistory;
pub use openai::OpenAiHistory;

/// Vendor-native transcript, tagged by vendor family
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "vendor", content = "turns", rename_all = "lowercase")]
pub enum NativeHistory {
    OpenAi(Vec<openai::ChatMessage>),
    Gemini(Vec<gemini::Content>),
}

impl NativeHistory {
    /// Empty transcript for a vendor family
    pub const fn empty(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::OpenAi => Self::OpenAi(Vec::new()),
            ProviderKind::Gemini => Self::Gemini(Vec::new()),
        }
    }

    pub const fn kind(&self) -> ProviderKind {
        match self {
            Self::OpenAi(_) => ProviderKind::OpenAi,
            Self::Gemini(_) => ProviderKind::Gemini,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::OpenAi(turns) => turns.len(),
            Self::Gemini(turns) => turns.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep at most the `max` most recent turns.
    ///
    /// Tool results left at the head of the suffix lost their call to the cut
    /// and are dropped as well; neither vendor accepts an unanswered result.
    #[must_use]
    pub fn keep_recent(self, max: usize) -> Self {
        fn tail<T>(mut turns: Vec<T>, max: usize, orphan: impl Fn(&T) -> bool) -> Vec<T> {
            let mut start = turns.len().saturating_sub(max);
            while turns.get(start).is_some_and(&orphan) {
                start += 1;
            }
            turns.drain(..start);
            turns
        }
        match self {
            Self::OpenAi(turns) => Self::OpenAi(tail(turns, max, |t| {
                matches!(t, openai::ChatMessage::Tool { .. })
            })),
            Self::Gemini(turns) => {
                Self::Gemini(tail(turns, max, gemini::Content::is_function_responses))
            }
        }
    }
}

/// Translator between agnostic messages and one vendor's transcript
pub trait HistoryAdapter: Send + Sync {
    /// Vendor family this adapter understands
    fn provider_kind(&self) -> ProviderKind;

    fn new_history(&self) -> NativeHistory {
        NativeHistory::empty(self.provider_kind())
    }

    fn add_user_message(&self, history: &NativeHistory, content: &str) -> Result<NativeHistory>;

    fn add_assistant_message(&self, history: &NativeHistory, content: &str)
    -> Result<NativeHistory>;

    /// Append the model's tool-call turn. When `raw` holds this vendor's reply,
    /// the vendor's own turn is replayed verbatim; otherwise it is rebuilt from `tool_calls`.
    fn add_assistant_tool_calls(
        &self,
        history: &NativeHistory,
        tool_calls: &[ToolCall],
        raw: Option<&RawResponse>,
    ) -> Result<NativeHistory>;

    /// Append the result of one tool call
    fn add_tool_results(
        &self,
        history: &NativeHistory,
        call: &ToolCall,
        result: &ToolExecutionResult,
    ) -> Result<NativeHistory>;

    /// Bulk agnostic -> native
    fn to_provider_format(&self, messages: &[Message]) -> Result<NativeHistory>;

    /// Bulk native -> agnostic. Vendor-only structure is dropped.
    fn to_agnostic_format(&self, history: &NativeHistory) -> Result<Vec<Message>>;
}

/// Adapter for a vendor family
pub fn history_adapter(kind: ProviderKind) -> &'static dyn HistoryAdapter {
    match kind {
        ProviderKind::OpenAi => &OpenAiHistory,
        ProviderKind::Gemini => &GeminiHistory,
    }
}

/// Adapter for a vendor identity string. Unknown identities are a configuration error.
pub fn history_adapter_for(identity: &str) -> Result<&'static dyn HistoryAdapter> {
    Ok(history_adapter(identity.parse()?))
}

const fn mismatch(expected: ProviderKind, actual: &NativeHistory) -> AgentError {
    AgentError::HistoryMismatch {
        expected: expected.as_str(),
        actual: actual.kind().as_str(),
    }
}

/// Decode a stored tool result, tolerating payloads that are not our own shape
fn decode_tool_result(value: serde_json::Value) -> ToolExecutionResult {
    match serde_json::from_value::<ToolExecutionResult>(value.clone()) {
        Ok(result) => result,
        Err(_) => {
            let message = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            ToolExecutionResult::success(message)
        }
    }
}

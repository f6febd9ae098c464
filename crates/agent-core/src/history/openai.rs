//! OpenAI-family transcript
//!
//! Chat-completions message list. Tool results use the `tool` role keyed by
//! the call id; tool-call turns are assistant messages with empty content.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{HistoryAdapter, NativeHistory, decode_tool_result, mismatch};
use crate::error::Result;
use crate::message::{Message, Role, ToolCall, ToolResponse};
use crate::provider::{ProviderKind, RawResponse, parse_tool_arguments};
use crate::tool::ToolExecutionResult;

/// One chat-completions message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default)]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ChatToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

/// Tool call block attached to an assistant message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: FunctionCall,
}

/// Function name plus arguments serialized as a JSON string
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

fn function_type() -> String {
    "function".into()
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Rebuild an assistant tool-call turn from normalized calls
    pub fn assistant_tool_calls(calls: &[ToolCall]) -> Self {
        Self::Assistant {
            content: None,
            tool_calls: calls
                .iter()
                .map(|c| ChatToolCall {
                    id: c.id.clone(),
                    kind: function_type(),
                    function: FunctionCall {
                        name: c.name.clone(),
                        arguments: serde_json::Value::Object(c.args.clone()).to_string(),
                    },
                })
                .collect(),
        }
    }

    pub fn tool_result(call_id: impl Into<String>, result: &ToolExecutionResult) -> Result<Self> {
        Ok(Self::Tool {
            tool_call_id: call_id.into(),
            content: serde_json::to_string(result)?,
        })
    }

    pub const fn is_system(&self) -> bool {
        matches!(self, Self::System { .. })
    }

    /// Convert one agnostic message
    pub fn from_agnostic(message: &Message) -> Result<Self> {
        message.validate()?;
        Ok(match message.role {
            Role::User => Self::user(message.text()),
            Role::Assistant if message.has_tool_calls() => {
                Self::assistant_tool_calls(&message.tool_calls)
            }
            Role::Assistant => Self::assistant(message.text()),
            Role::Tool => {
                // validate() guarantees the result is present
                let response = message.tool_result.as_ref().ok_or_else(|| {
                    crate::AgentError::InvalidMessage("tool message without a tool result".into())
                })?;
                Self::tool_result(&response.call_id, &response.result)?
            }
        })
    }
}

/// Extract the assistant turn from a raw chat-completions body
fn replay_turn(raw: &RawResponse) -> Option<ChatMessage> {
    if raw.vendor != ProviderKind::OpenAi {
        return None;
    }
    let message = raw.payload.pointer("/choices/0/message")?.clone();
    let turn = serde_json::from_value::<ChatMessage>(message)
        .map_err(|e| tracing::debug!(error = %e, "Raw OpenAI turn not replayable, rebuilding"))
        .ok()?;
    match &turn {
        ChatMessage::Assistant { tool_calls, .. } if !tool_calls.is_empty() => Some(turn),
        _ => None,
    }
}

/// History adapter for OpenAI-compatible vendors
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenAiHistory;

impl OpenAiHistory {
    fn turns(history: &NativeHistory) -> Result<&[ChatMessage]> {
        match history {
            NativeHistory::OpenAi(turns) => Ok(turns),
            other => Err(mismatch(ProviderKind::OpenAi, other)),
        }
    }

    fn append(history: &NativeHistory, turn: ChatMessage) -> Result<NativeHistory> {
        let mut turns = Self::turns(history)?.to_vec();
        turns.push(turn);
        Ok(NativeHistory::OpenAi(turns))
    }
}

impl HistoryAdapter for OpenAiHistory {
    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn add_user_message(&self, history: &NativeHistory, content: &str) -> Result<NativeHistory> {
        Self::append(history, ChatMessage::user(content))
    }

    fn add_assistant_message(
        &self,
        history: &NativeHistory,
        content: &str,
    ) -> Result<NativeHistory> {
        Self::append(history, ChatMessage::assistant(content))
    }

    fn add_assistant_tool_calls(
        &self,
        history: &NativeHistory,
        tool_calls: &[ToolCall],
        raw: Option<&RawResponse>,
    ) -> Result<NativeHistory> {
        let turn = raw
            .and_then(replay_turn)
            .unwrap_or_else(|| ChatMessage::assistant_tool_calls(tool_calls));
        Self::append(history, turn)
    }

    fn add_tool_results(
        &self,
        history: &NativeHistory,
        call: &ToolCall,
        result: &ToolExecutionResult,
    ) -> Result<NativeHistory> {
        Self::append(history, ChatMessage::tool_result(&call.id, result)?)
    }

    fn to_provider_format(&self, messages: &[Message]) -> Result<NativeHistory> {
        let turns = messages
            .iter()
            .map(ChatMessage::from_agnostic)
            .collect::<Result<Vec<_>>>()?;
        Ok(NativeHistory::OpenAi(turns))
    }

    fn to_agnostic_format(&self, history: &NativeHistory) -> Result<Vec<Message>> {
        let mut names: HashMap<String, String> = HashMap::new();
        let mut messages = Vec::new();

        for turn in Self::turns(history)? {
            match turn {
                ChatMessage::System { .. } => {}
                ChatMessage::User { content } => messages.push(Message::user(content.as_str())),
                ChatMessage::Assistant {
                    content,
                    tool_calls,
                } => {
                    if tool_calls.is_empty() {
                        messages.push(Message::assistant(content.clone().unwrap_or_default()));
                        continue;
                    }
                    let calls = tool_calls
                        .iter()
                        .map(|tc| {
                            names.insert(tc.id.clone(), tc.function.name.clone());
                            let args =
                                parse_tool_arguments(&tc.function.name, &tc.function.arguments)?;
                            Ok(ToolCall::new(&tc.id, &tc.function.name, args))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    messages.push(Message::assistant_tool_calls(calls));
                }
                ChatMessage::Tool {
                    tool_call_id,
                    content,
                } => {
                    let result = serde_json::from_str(content)
                        .map_or_else(|_| ToolExecutionResult::success(content.as_str()), decode_tool_result);
                    messages.push(Message::tool_response(ToolResponse {
                        call_id: tool_call_id.clone(),
                        name: names.get(tool_call_id).cloned().unwrap_or_default(),
                        result,
                    }));
                }
            }
        }

        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolArgs;
    use serde_json::json;

    fn transfer_call() -> ToolCall {
        let mut args = ToolArgs::new();
        args.insert("amount".into(), json!(100));
        ToolCall::new("call_abc", "transfer_money", args)
    }

    #[test]
    fn test_wire_shape_of_tool_turns() {
        let adapter = OpenAiHistory;
        let call = transfer_call();
        let history = adapter.new_history();
        let history = adapter.add_user_message(&history, "send 100").unwrap();
        let history = adapter.add_assistant_tool_calls(&history, &[call.clone()], None).unwrap();
        let history = adapter
            .add_tool_results(&history, &call, &ToolExecutionResult::success("preview"))
            .unwrap();

        let value = serde_json::to_value(&history).unwrap();
        let turns = &value["turns"];
        assert_eq!(turns[1]["role"], "assistant");
        assert!(turns[1]["content"].is_null());
        assert_eq!(turns[1]["tool_calls"][0]["type"], "function");
        assert_eq!(turns[1]["tool_calls"][0]["function"]["arguments"], r#"{"amount":100}"#);
        assert_eq!(turns[2]["role"], "tool");
        assert_eq!(turns[2]["tool_call_id"], "call_abc");
    }

    #[test]
    fn test_operations_do_not_mutate_input() {
        let adapter = OpenAiHistory;
        let original = adapter.new_history();
        let next = adapter.add_user_message(&original, "hi").unwrap();
        assert!(original.is_empty());
        assert_eq!(next.len(), 1);
    }

    #[test]
    fn test_raw_turn_is_replayed() {
        let raw = RawResponse {
            vendor: ProviderKind::OpenAi,
            payload: json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [
                            {"id": "call_1", "type": "function", "function": {"name": "find_recipient", "arguments": "{\"name\":\"Ali\"}"}},
                            {"id": "call_2", "type": "function", "function": {"name": "get_accounts", "arguments": "{}"}}
                        ]
                    }
                }]
            }),
        };
        // Normalized list deliberately differs from the raw payload
        let history = OpenAiHistory
            .add_assistant_tool_calls(&OpenAiHistory.new_history(), &[transfer_call()], Some(&raw))
            .unwrap();
        let NativeHistory::OpenAi(turns) = history else { panic!("wrong vendor") };
        let ChatMessage::Assistant { tool_calls, .. } = &turns[0] else { panic!("not assistant") };
        assert_eq!(tool_calls.len(), 2);
        assert_eq!(tool_calls[0].function.arguments, "{\"name\":\"Ali\"}");
    }

    #[test]
    fn test_foreign_raw_falls_back_to_rebuild() {
        let raw = RawResponse {
            vendor: ProviderKind::Gemini,
            payload: json!({"candidates": []}),
        };
        let history = OpenAiHistory
            .add_assistant_tool_calls(&OpenAiHistory.new_history(), &[transfer_call()], Some(&raw))
            .unwrap();
        let NativeHistory::OpenAi(turns) = history else { panic!("wrong vendor") };
        assert_eq!(turns[0], ChatMessage::assistant_tool_calls(&[transfer_call()]));
    }

    #[test]
    fn test_text_round_trip_is_identity() {
        let messages = vec![
            Message::user("What is my balance?"),
            Message::assistant("Your balance is 1,200 TRY."),
            Message::user(""),
        ];
        let native = OpenAiHistory.to_provider_format(&messages).unwrap();
        assert_eq!(OpenAiHistory.to_agnostic_format(&native).unwrap(), messages);
    }

    #[test]
    fn test_tool_round_trip() {
        let call = transfer_call();
        let result = ToolExecutionResult::failure("insufficient funds").with_data(json!({"balance": 5}));
        let messages = vec![
            Message::user("send 100"),
            Message::assistant_tool_calls(vec![call.clone()]),
            Message::tool(&call, result),
        ];
        let native = OpenAiHistory.to_provider_format(&messages).unwrap();
        assert_eq!(OpenAiHistory.to_agnostic_format(&native).unwrap(), messages);
    }

    #[test]
    fn test_system_turns_are_dropped_from_agnostic_view() {
        let history = NativeHistory::OpenAi(vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hi"),
        ]);
        let messages = OpenAiHistory.to_agnostic_format(&history).unwrap();
        assert_eq!(messages, vec![Message::user("hi")]);
    }
}

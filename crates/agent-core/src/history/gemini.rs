//! Gemini-family transcript
//!
//! `contents` list of `user`/`model` turns made of parts. Tool results go back
//! as a `user` turn carrying `functionResponse` parts keyed by tool name; the
//! responses for one round share a single turn.

use serde::{Deserialize, Serialize};

use super::{HistoryAdapter, NativeHistory, decode_tool_result, mismatch};
use crate::error::{AgentError, Result};
use crate::message::{Message, Role, ToolArgs, ToolCall, ToolResponse};
use crate::provider::{ProviderKind, RawResponse};
use crate::tool::ToolExecutionResult;

/// Author of a content turn
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentRole {
    #[default]
    User,
    Model,
}

/// One turn of a Gemini conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub role: ContentRole,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// A single part. Fields Gemini adds that we don't model (e.g. thought
/// signatures) are kept in `extra` so replayed turns stay byte-faithful.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: ToolArgs,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: serde_json::Value,
}

impl FunctionCall {
    /// Gemini only sometimes assigns ids; the tool name stands in otherwise
    pub fn call_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn function_call(call: &ToolCall) -> Self {
        Self {
            function_call: Some(FunctionCall {
                id: explicit_id(call),
                name: call.name.clone(),
                args: call.args.clone(),
            }),
            ..Default::default()
        }
    }

    pub fn function_response(call_id: &str, name: &str, result: &ToolExecutionResult) -> Result<Self> {
        Ok(Self {
            function_response: Some(FunctionResponse {
                id: (call_id != name).then(|| call_id.to_string()),
                name: name.to_string(),
                response: serde_json::to_value(result)?,
            }),
            ..Default::default()
        })
    }
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ContentRole::User,
            parts: vec![Part::text(text)],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ContentRole::Model,
            parts: vec![Part::text(text)],
        }
    }

    pub fn model_tool_calls(calls: &[ToolCall]) -> Self {
        Self {
            role: ContentRole::Model,
            parts: calls.iter().map(Part::function_call).collect(),
        }
    }

    /// A user turn made only of function responses
    pub fn is_function_responses(&self) -> bool {
        self.role == ContentRole::User
            && !self.parts.is_empty()
            && self.parts.iter().all(|p| p.function_response.is_some())
    }

    pub fn has_function_calls(&self) -> bool {
        self.parts.iter().any(|p| p.function_call.is_some())
    }

    /// Concatenated text parts
    pub fn joined_text(&self) -> Option<String> {
        let texts: Vec<&str> = self.parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!texts.is_empty()).then(|| texts.concat())
    }
}

/// Only ids Gemini actually issued are sent back
fn explicit_id(call: &ToolCall) -> Option<String> {
    (call.id != call.name).then(|| call.id.clone())
}

/// Add a function response, joining the current round's response turn if there is one
fn push_function_response(turns: &mut Vec<Content>, part: Part) {
    match turns.last_mut() {
        Some(last) if last.is_function_responses() => last.parts.push(part),
        _ => turns.push(Content {
            role: ContentRole::User,
            parts: vec![part],
        }),
    }
}

/// Extract the model turn from a raw `generateContent` body
fn replay_turn(raw: &RawResponse) -> Option<Content> {
    if raw.vendor != ProviderKind::Gemini {
        return None;
    }
    let content = raw.payload.pointer("/candidates/0/content")?.clone();
    let mut turn = serde_json::from_value::<Content>(content)
        .map_err(|e| tracing::debug!(error = %e, "Raw Gemini turn not replayable, rebuilding"))
        .ok()?;
    turn.role = ContentRole::Model;
    turn.has_function_calls().then_some(turn)
}

/// History adapter for Gemini
#[derive(Clone, Copy, Debug, Default)]
pub struct GeminiHistory;

impl GeminiHistory {
    fn turns(history: &NativeHistory) -> Result<&[Content]> {
        match history {
            NativeHistory::Gemini(turns) => Ok(turns),
            other => Err(mismatch(ProviderKind::Gemini, other)),
        }
    }

    fn append(history: &NativeHistory, turn: Content) -> Result<NativeHistory> {
        let mut turns = Self::turns(history)?.to_vec();
        turns.push(turn);
        Ok(NativeHistory::Gemini(turns))
    }
}

impl HistoryAdapter for GeminiHistory {
    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn add_user_message(&self, history: &NativeHistory, content: &str) -> Result<NativeHistory> {
        Self::append(history, Content::user(content))
    }

    fn add_assistant_message(
        &self,
        history: &NativeHistory,
        content: &str,
    ) -> Result<NativeHistory> {
        Self::append(history, Content::model(content))
    }

    fn add_assistant_tool_calls(
        &self,
        history: &NativeHistory,
        tool_calls: &[ToolCall],
        raw: Option<&RawResponse>,
    ) -> Result<NativeHistory> {
        let turn = raw
            .and_then(replay_turn)
            .unwrap_or_else(|| Content::model_tool_calls(tool_calls));
        Self::append(history, turn)
    }

    fn add_tool_results(
        &self,
        history: &NativeHistory,
        call: &ToolCall,
        result: &ToolExecutionResult,
    ) -> Result<NativeHistory> {
        let mut turns = Self::turns(history)?.to_vec();
        push_function_response(&mut turns, Part::function_response(&call.id, &call.name, result)?);
        Ok(NativeHistory::Gemini(turns))
    }

    fn to_provider_format(&self, messages: &[Message]) -> Result<NativeHistory> {
        let mut turns = Vec::with_capacity(messages.len());
        for message in messages {
            message.validate()?;
            match message.role {
                Role::User => turns.push(Content::user(message.text())),
                Role::Assistant if message.has_tool_calls() => {
                    turns.push(Content::model_tool_calls(&message.tool_calls));
                }
                Role::Assistant => turns.push(Content::model(message.text())),
                Role::Tool => {
                    let response = message.tool_result.as_ref().ok_or_else(|| {
                        AgentError::InvalidMessage("tool message without a tool result".into())
                    })?;
                    let part =
                        Part::function_response(&response.call_id, &response.name, &response.result)?;
                    push_function_response(&mut turns, part);
                }
            }
        }
        Ok(NativeHistory::Gemini(turns))
    }

    fn to_agnostic_format(&self, history: &NativeHistory) -> Result<Vec<Message>> {
        let mut messages = Vec::new();

        for turn in Self::turns(history)? {
            match turn.role {
                ContentRole::Model if turn.has_function_calls() => {
                    let calls = turn
                        .parts
                        .iter()
                        .filter_map(|p| p.function_call.as_ref())
                        .map(|fc| ToolCall::new(fc.call_id(), &fc.name, fc.args.clone()))
                        .collect();
                    messages.push(Message::assistant_tool_calls(calls));
                }
                ContentRole::Model => {
                    messages.push(Message::assistant(turn.joined_text().unwrap_or_default()));
                }
                ContentRole::User if turn.parts.iter().any(|p| p.function_response.is_some()) => {
                    for fr in turn.parts.iter().filter_map(|p| p.function_response.as_ref()) {
                        messages.push(Message::tool_response(ToolResponse {
                            call_id: fr.id.clone().unwrap_or_else(|| fr.name.clone()),
                            name: fr.name.clone(),
                            result: decode_tool_result(fr.response.clone()),
                        }));
                    }
                }
                ContentRole::User => {
                    messages.push(Message::user(turn.joined_text().unwrap_or_default()));
                }
            }
        }

        Ok(messages)
    }
}

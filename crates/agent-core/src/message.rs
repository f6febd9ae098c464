//! Conversation Messages
//!
//! Vendor-independent message model spoken by every other component.
//! Vendor transcripts are built from these by the history adapters.

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::tool::ToolExecutionResult;

/// Structured tool arguments (JSON object)
pub type ToolArgs = serde_json::Map<String, serde_json::Value>;

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User input
    User,
    /// Assistant (LLM) response: text or tool calls
    Assistant,
    /// Tool result fed back to the model
    Tool,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "tool" => Ok(Self::Tool),
            other => Err(AgentError::InvalidMessage(format!(
                "unknown role '{other}' (expected user, assistant or tool)"
            ))),
        }
    }
}

/// Tool call request from the LLM
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Vendor-assigned id, unique within one model turn. Join key for the result.
    pub id: String,

    /// Tool identifier
    pub name: String,

    /// Parsed arguments
    #[serde(default)]
    pub args: ToolArgs,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: ToolArgs) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }
}

/// Outcome of one tool call, attached to a tool-role message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// Id of the call this answers
    pub call_id: String,

    /// Name of the tool that produced it
    pub name: String,

    pub result: ToolExecutionResult,
}

/// A single message in a conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,

    /// Text content; `None` on tool-call and tool-result turns
    #[serde(default)]
    pub content: Option<String>,

    /// Tool calls requested by the assistant
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Result carried by a tool-role message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResponse>,
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_result: None,
        }
    }

    /// Create an assistant text message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_result: None,
        }
    }

    /// Create an assistant turn requesting tools (content is always `None`)
    pub const fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls,
            tool_result: None,
        }
    }

    /// Create a tool result message
    pub fn tool(call: &ToolCall, result: ToolExecutionResult) -> Self {
        Self {
            role: Role::Tool,
            content: None,
            tool_calls: Vec::new(),
            tool_result: Some(ToolResponse {
                call_id: call.id.clone(),
                name: call.name.clone(),
                result,
            }),
        }
    }

    /// Create a tool result message from an existing response
    pub const fn tool_response(response: ToolResponse) -> Self {
        Self {
            role: Role::Tool,
            content: None,
            tool_calls: Vec::new(),
            tool_result: Some(response),
        }
    }

    /// Text content or empty string
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Structural validation
    pub fn validate(&self) -> Result<()> {
        match self.role {
            Role::Tool => {
                if self.tool_result.is_none() {
                    return Err(AgentError::InvalidMessage(
                        "tool message without a tool result".into(),
                    ));
                }
                if self.has_tool_calls() {
                    return Err(AgentError::InvalidMessage(
                        "tool message cannot carry tool calls".into(),
                    ));
                }
            }
            Role::Assistant => {
                if self.has_tool_calls() && self.content.is_some() {
                    return Err(AgentError::InvalidMessage(
                        "assistant tool-call turn must not carry content".into(),
                    ));
                }
                if self.tool_result.is_some() {
                    return Err(AgentError::InvalidMessage(
                        "only tool messages carry tool results".into(),
                    ));
                }
            }
            Role::User => {
                if self.has_tool_calls() || self.tool_result.is_some() {
                    return Err(AgentError::InvalidMessage(
                        "user message can only carry text".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Parse a message from loosely typed JSON, validating role and shape
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        if let Some(role) = value.get("role").and_then(|r| r.as_str()) {
            role.parse::<Role>()?;
        }
        let message: Self = serde_json::from_value(value)
            .map_err(|e| AgentError::InvalidMessage(e.to_string()))?;
        message.validate()?;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "Hello");
        assert!(msg.validate().is_ok());
    }

    #[test]
    fn test_unknown_role_rejected() {
        let err = Message::from_value(json!({"role": "system", "content": "hi"})).unwrap_err();
        assert!(matches!(err, AgentError::InvalidMessage(_)));
    }

    #[test]
    fn test_tool_message_requires_result() {
        let err = Message::from_value(json!({"role": "tool", "content": "42"})).unwrap_err();
        assert!(err.to_string().contains("without a tool result"));
    }

    #[test]
    fn test_tool_call_turn_has_no_content() {
        let call = ToolCall::new("call_1", "get_accounts", ToolArgs::new());
        let msg = Message::assistant_tool_calls(vec![call.clone()]);
        assert!(msg.content.is_none());
        assert!(msg.validate().is_ok());

        let mut bad = msg;
        bad.content = Some("thinking".into());
        assert!(bad.validate().is_err());

        let tool = Message::tool(&call, ToolExecutionResult::success("ok"));
        assert_eq!(tool.tool_result.as_ref().unwrap().call_id, "call_1");
        assert!(tool.validate().is_ok());
    }
}

//! OpenAI-compatible LLM Provider
//!
//! Chat completions over HTTP. Works with any gateway that speaks the same
//! wire format (set `base_url`).

use agent_core::{
    AgentError, GenerationConfig, GenerationOverrides, LlmProvider, LlmResponse, Message,
    NativeHistory, ProviderKind, RawResponse, Result, TokenUsage, ToolCall, ToolDefinition,
    history::openai::{ChatMessage, ChatToolCall},
    parse_tool_arguments,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::ProviderConfig;
use crate::http::{build_client, send_json};

const VENDOR: &str = "openai";

/// OpenAI-compatible provider
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    config: GenerationConfig,
}

impl OpenAiProvider {
    /// Create from configuration
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            api_key: config.api_key.clone(),
            base_url: config.resolved_base_url(),
            config: config.generation.clone(),
        })
    }

    /// Build the request body for the chat completions endpoint
    fn build_request_body(
        &self,
        turns: &[ChatMessage],
        system_prompt: Option<&str>,
        tools: &[ToolDefinition],
    ) -> Result<Value> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        match system_prompt {
            Some(prompt) if !turns.first().is_some_and(ChatMessage::is_system) => {
                messages.push(ChatMessage::system(prompt));
            }
            _ => {}
        }
        messages.extend_from_slice(turns);

        let mut body = json!({
            "model": self.config.model,
            "messages": serde_json::to_value(&messages)?,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "top_p": self.config.top_p,
        });

        if !self.config.stop_sequences.is_empty() {
            body["stop"] = json!(self.config.stop_sequences);
        }

        if !tools.is_empty() {
            body["tools"] = json!(
                tools
                    .iter()
                    .map(|t| json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": object_schema(&t.parameters),
                        }
                    }))
                    .collect::<Vec<_>>()
            );
        }

        Ok(body)
    }

    /// Parse a chat completions body into a normalized response
    fn parse_response(payload: Value) -> Result<LlmResponse> {
        let completion: ChatCompletion = serde_json::from_value(payload.clone())
            .map_err(|e| AgentError::InvalidResponse(format!("unexpected OpenAI body: {e}")))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::InvalidResponse("no choices in response".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let args = parse_tool_arguments(&tc.function.name, &tc.function.arguments)?;
                Ok(ToolCall::new(tc.id, tc.function.name, args))
            })
            .collect::<Result<Vec<_>>>()?;

        let usage = completion.usage.map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(LlmResponse {
            text: choice.message.content.filter(|c| !c.is_empty()),
            tool_calls,
            usage: usage.unwrap_or_default(),
            raw_response: RawResponse {
                vendor: ProviderKind::OpenAi,
                payload,
            },
        })
    }

    async fn send(&self, body: &Value) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(model = %self.config.model, %url, "Sending chat completion request");

        let request = self.client.post(&url).bearer_auth(&self.api_key).json(body);
        let payload = send_json(VENDOR, request).await?;
        let response = Self::parse_response(payload)?;

        tracing::debug!(
            tool_calls = response.tool_calls.len(),
            total_tokens = response.usage.total_tokens,
            "Chat completion received"
        );
        Ok(response)
    }
}

/// Function parameters must be an object schema
fn object_schema(parameters: &Value) -> Value {
    match parameters {
        Value::Object(schema) if schema.contains_key("type") => parameters.clone(),
        Value::Object(schema) if !schema.is_empty() => {
            let mut schema = schema.clone();
            schema.insert("type".into(), json!("object"));
            Value::Object(schema)
        }
        _ => json!({"type": "object", "properties": {}}),
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn config(&self) -> &GenerationConfig {
        &self.config
    }

    fn update_config(&mut self, overrides: GenerationOverrides) {
        self.config.merge(overrides);
    }

    async fn generate_response(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        let history = self.history_adapter().to_provider_format(messages)?;
        self.generate_with_native_history(&history, system_prompt, tools)
            .await
    }

    async fn generate_with_native_history(
        &self,
        history: &NativeHistory,
        system_prompt: Option<&str>,
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        let NativeHistory::OpenAi(turns) = history else {
            return Err(AgentError::HistoryMismatch {
                expected: ProviderKind::OpenAi.as_str(),
                actual: history.kind().as_str(),
            });
        };
        let body = self.build_request_body(turns, system_prompt, tools)?;
        self.send(&body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::ToolExecutionResult;

    fn provider() -> OpenAiProvider {
        let config = ProviderConfig::new(ProviderKind::OpenAi, "sk-test");
        OpenAiProvider::from_config(&config).unwrap()
    }

    fn accounts_tool() -> ToolDefinition {
        ToolDefinition::new("get_accounts", "List the user's accounts", json!({}))
    }

    #[test]
    fn test_request_body_injects_system_prompt() {
        let turns = vec![ChatMessage::user("What is my balance?")];
        let body = provider()
            .build_request_body(&turns, Some("You are a banking assistant."), &[accounts_tool()])
            .unwrap();

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "get_accounts");
        assert_eq!(body["tools"][0]["function"]["parameters"]["type"], "object");
        assert!(body.get("stop").is_none());
    }

    #[test]
    fn test_existing_system_turn_not_duplicated() {
        let turns = vec![ChatMessage::system("be brief"), ChatMessage::user("hi")];
        let body = provider().build_request_body(&turns, Some("other"), &[]).unwrap();
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(body["messages"][0]["content"], "be brief");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_parse_tool_call_response() {
        let payload = json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "find_recipient", "arguments": "{\"name\":\"Ali\"}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 120, "completion_tokens": 18, "total_tokens": 138}
        });

        let response = OpenAiProvider::parse_response(payload.clone()).unwrap();
        assert!(response.text.is_none());
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].id, "call_1");
        assert_eq!(response.tool_calls[0].args["name"], "Ali");
        assert_eq!(response.usage.total_tokens, 138);
        assert_eq!(response.raw_response.payload, payload);
    }

    #[test]
    fn test_parse_text_without_usage() {
        let payload = json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello!", "tool_calls": null}}]
        });
        let response = OpenAiProvider::parse_response(payload).unwrap();
        assert_eq!(response.text.as_deref(), Some("Hello!"));
        assert!(!response.has_tool_calls());
        assert_eq!(response.usage, TokenUsage::default());
    }

    #[test]
    fn test_malformed_arguments_are_rejected() {
        let payload = json!({
            "choices": [{"message": {
                "role": "assistant",
                "tool_calls": [{"id": "call_1", "type": "function",
                    "function": {"name": "transfer_money", "arguments": "{\"amount\": 10"}}]
            }}]
        });
        let err = OpenAiProvider::parse_response(payload).unwrap_err();
        assert!(matches!(err, AgentError::MalformedToolArguments { tool, .. } if tool == "transfer_money"));
    }

    #[test]
    fn test_empty_choices_is_invalid() {
        let err = OpenAiProvider::parse_response(json!({"choices": []})).unwrap_err();
        assert!(matches!(err, AgentError::InvalidResponse(_)));
    }

    #[test]
    fn test_adapter_transcript_serializes_to_wire_format() {
        let provider = provider();
        let adapter = provider.history_adapter();
        let call = ToolCall::new("call_1", "get_accounts", Default::default());
        let history = adapter.add_user_message(&adapter.new_history(), "accounts").unwrap();
        let history = adapter.add_assistant_tool_calls(&history, &[call.clone()], None).unwrap();
        let history = adapter
            .add_tool_results(&history, &call, &ToolExecutionResult::success("2 accounts"))
            .unwrap();

        let NativeHistory::OpenAi(turns) = &history else { panic!("wrong vendor") };
        let body = provider.build_request_body(turns, None, &[]).unwrap();
        assert_eq!(body["messages"][2]["role"], "tool");
        assert_eq!(body["messages"][2]["tool_call_id"], "call_1");
    }

    #[tokio::test]
    async fn test_foreign_history_rejected() {
        let err = provider()
            .generate_with_native_history(&NativeHistory::empty(ProviderKind::Gemini), None, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::HistoryMismatch { expected: "openai", .. }));
    }

    #[test]
    fn test_update_config_merges() {
        let mut provider = provider();
        provider.update_config(GenerationOverrides {
            temperature: Some(0.7),
            ..Default::default()
        });
        assert!((provider.config().temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(provider.config().model, "gpt-4o-mini");
    }
}

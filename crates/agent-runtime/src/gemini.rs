//! Gemini LLM Provider
//!
//! `models/{model}:generateContent` over HTTP with the API key as query parameter.

use agent_core::{
    AgentError, GenerationConfig, GenerationOverrides, LlmProvider, LlmResponse, Message,
    NativeHistory, ProviderKind, RawResponse, Result, TokenUsage, ToolCall, ToolDefinition,
    history::gemini::{Content, Part},
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::ProviderConfig;
use crate::http::{build_client, send_json};

const VENDOR: &str = "gemini";

/// Gemini provider
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    config: GenerationConfig,
}

impl GeminiProvider {
    /// Create from configuration
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            api_key: config.api_key.clone(),
            base_url: config.resolved_base_url(),
            config: config.generation.clone(),
        })
    }

    fn build_request_body(
        &self,
        contents: &[Content],
        system_prompt: Option<&str>,
        tools: &[ToolDefinition],
    ) -> Result<Value> {
        let mut generation_config = json!({
            "temperature": self.config.temperature,
            "maxOutputTokens": self.config.max_tokens,
            "topP": self.config.top_p,
        });
        if !self.config.stop_sequences.is_empty() {
            generation_config["stopSequences"] = json!(self.config.stop_sequences);
        }

        let mut body = json!({
            "contents": serde_json::to_value(contents)?,
            "generationConfig": generation_config,
        });

        if let Some(prompt) = system_prompt {
            body["systemInstruction"] = json!({ "parts": [{ "text": prompt }] });
        }

        if !tools.is_empty() {
            let declarations: Vec<Value> = tools.iter().map(function_declaration).collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }

        Ok(body)
    }

    fn parse_response(payload: Value) -> Result<LlmResponse> {
        let parsed: GenerateContentResponse = serde_json::from_value(payload.clone())
            .map_err(|e| AgentError::InvalidResponse(format!("unexpected Gemini body: {e}")))?;

        let Some(candidate) = parsed.candidates.into_iter().next() else {
            let reason = parsed
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".into());
            return Err(AgentError::InvalidResponse(format!(
                "Gemini returned no candidates: {reason}"
            )));
        };

        if let Some(reason) = &candidate.finish_reason {
            tracing::debug!(finish_reason = %reason, "Gemini candidate finished");
        }

        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        let mut texts = Vec::new();
        let mut tool_calls = Vec::new();

        for part in parts {
            if let Some(fc) = part.function_call {
                let id = fc.call_id().to_string();
                tool_calls.push(ToolCall::new(id, fc.name, fc.args));
            } else if !is_thought(&part.extra) {
                texts.extend(part.text);
            }
        }

        let usage = parsed.usage_metadata.map(|u| TokenUsage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(LlmResponse {
            text: Some(texts.concat()).filter(|t| !t.is_empty()),
            tool_calls,
            usage: usage.unwrap_or_default(),
            raw_response: RawResponse {
                vendor: ProviderKind::Gemini,
                payload,
            },
        })
    }

    async fn send(&self, body: &Value) -> Result<LlmResponse> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.config.model
        );
        tracing::debug!(model = %self.config.model, %url, "Sending generateContent request");

        let request = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(body);
        let payload = send_json(VENDOR, request).await?;
        let response = Self::parse_response(payload)?;

        tracing::debug!(
            tool_calls = response.tool_calls.len(),
            total_tokens = response.usage.total_tokens,
            "generateContent received"
        );
        Ok(response)
    }
}

/// Gemini rejects object schemas without properties, so those are omitted
fn function_declaration(tool: &ToolDefinition) -> Value {
    let mut declaration = json!({
        "name": tool.name,
        "description": tool.description,
    });
    let has_properties = tool
        .parameters
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|p| !p.is_empty());
    if has_properties {
        declaration["parameters"] = tool.parameters.clone();
    }
    declaration
}

fn is_thought(extra: &serde_json::Map<String, Value>) -> bool {
    extra.get("thought").and_then(Value::as_bool).unwrap_or(false)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::Gemini
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
        let NativeHistory::Gemini(contents) = history else {
            return Err(AgentError::HistoryMismatch {
                expected: ProviderKind::Gemini.as_str(),
                actual: history.kind().as_str(),
            });
        };
        let body = self.build_request_body(contents, system_prompt, tools)?;
        self.send(&body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::ToolExecutionResult;

    fn provider() -> GeminiProvider {
        let config = ProviderConfig::new(ProviderKind::Gemini, "test-key");
        GeminiProvider::from_config(&config).unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let tools = vec![
            ToolDefinition::new("get_accounts", "List accounts", json!({"type": "object", "properties": {}})),
            ToolDefinition::new(
                "find_recipient",
                "Find a saved recipient",
                json!({"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]}),
            ),
        ];
        let body = provider()
            .build_request_body(&[Content::user("hi")], Some("Be helpful."), &tools)
            .unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be helpful.");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);

        let declarations = &body["tools"][0]["functionDeclarations"];
        assert!(declarations[0].get("parameters").is_none());
        assert_eq!(declarations[1]["parameters"]["required"][0], "name");
    }

    #[test]
    fn test_parse_function_calls_without_ids() {
        let payload = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"functionCall": {"name": "get_accounts", "args": {}}},
                        {"functionCall": {"name": "find_recipient", "args": {"name": "Ali"}}}
                    ]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 50, "candidatesTokenCount": 10, "totalTokenCount": 60}
        });

        let response = GeminiProvider::parse_response(payload).unwrap();
        assert!(response.text.is_none());
        assert_eq!(response.tool_calls[0].id, "get_accounts");
        assert_eq!(response.tool_calls[1].name, "find_recipient");
        assert_eq!(response.tool_calls[1].args["name"], "Ali");
        assert_eq!(response.usage.input_tokens, 50);
        assert_eq!(response.usage.total_tokens, 60);
    }

    #[test]
    fn test_parse_text_skips_thoughts() {
        let payload = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Considering the balance...", "thought": true},
                        {"text": "Your balance is "},
                        {"text": "1,200 TRY."}
                    ]
                }
            }]
        });
        let response = GeminiProvider::parse_response(payload).unwrap();
        assert_eq!(response.text.as_deref(), Some("Your balance is 1,200 TRY."));
        assert_eq!(response.usage, TokenUsage::default());
    }

    #[test]
    fn test_blocked_prompt_is_invalid_response() {
        let payload = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = GeminiProvider::parse_response(payload).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_empty_candidate_content_is_empty_reply() {
        let payload = json!({"candidates": [{"finishReason": "MAX_TOKENS"}]});
        let response = GeminiProvider::parse_response(payload).unwrap();
        assert!(response.text.is_none());
        assert!(!response.has_tool_calls());
    }

    #[test]
    fn test_tool_results_grouped_in_request() {
        let provider = provider();
        let adapter = provider.history_adapter();
        let a = ToolCall::new("get_accounts", "get_accounts", Default::default());
        let b = ToolCall::new("find_recipient", "find_recipient", Default::default());

        let history = adapter.add_user_message(&adapter.new_history(), "hi").unwrap();
        let history = adapter
            .add_assistant_tool_calls(&history, &[a.clone(), b.clone()], None)
            .unwrap();
        let history = adapter
            .add_tool_results(&history, &a, &ToolExecutionResult::success("2 accounts"))
            .unwrap();
        let history = adapter
            .add_tool_results(&history, &b, &ToolExecutionResult::failure("not found"))
            .unwrap();

        let NativeHistory::Gemini(contents) = &history else { panic!("wrong vendor") };
        let body = provider.build_request_body(contents, None, &[]).unwrap();
        let turns = body["contents"].as_array().unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[2]["role"], "user");
        assert_eq!(turns[2]["parts"][0]["functionResponse"]["name"], "get_accounts");
        assert_eq!(turns[2]["parts"][1]["functionResponse"]["response"]["success"], false);
        assert!(body.get("systemInstruction").is_none());
    }

    #[tokio::test]
    async fn test_foreign_history_rejected() {
        let err = provider()
            .generate_with_native_history(&NativeHistory::empty(ProviderKind::OpenAi), None, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::HistoryMismatch { expected: "gemini", .. }));
    }
}

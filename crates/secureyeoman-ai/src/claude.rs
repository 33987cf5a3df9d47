//! Claude (Anthropic) provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use crate::error::{AiError, AiResult};
use crate::provider::{AiProvider, ProviderConfig};
use crate::types::{ChatRequest, ChatResponse, ChatRole, FinishReason, TokenUsage};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages-API provider.
pub struct ClaudeProvider {
    client: Client,
    config: ProviderConfig,
}

impl ClaudeProvider {
    /// Create a new Claude provider.
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn build_request(&self, request: &ChatRequest) -> Value {
        let system: String = request
            .messages
            .iter()
            .filter(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let api_messages: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| {
                json!({
                    "role": match m.role {
                        ChatRole::Assistant => "assistant",
                        ChatRole::User | ChatRole::System => "user",
                    },
                    "content": m.content,
                })
            })
            .collect();

        let mut body = json!({
            "model": request.model.as_deref().unwrap_or(&self.config.model),
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": api_messages,
        });

        if !system.is_empty() {
            body["system"] = Value::String(system);
        }

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.input_schema,
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }

        body
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ApiContent>,
    model: String,
    stop_reason: Option<String>,
    usage: ApiUsage,
}

#[derive(Deserialize)]
struct ApiContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ApiUsage {
    input_tokens: u64,
    output_tokens: u64,
    #[serde(default)]
    cache_read_input_tokens: u64,
}

#[async_trait]
impl AiProvider for ClaudeProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn default_model(&self) -> &str {
        &self.config.model
    }

    async fn chat(&self, request: &ChatRequest) -> AiResult<ChatResponse> {
        let url = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(ANTHROPIC_API_URL);
        debug!(model = request.model.as_deref().unwrap_or(&self.config.model), "Claude chat request");

        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .timeout(Duration::from_millis(self.config.timeout_ms))
            .json(&self.build_request(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::from_status(status.as_u16(), body));
        }

        let api: ApiResponse = response
            .json()
            .await
            .map_err(|e| AiError::InvalidResponse(e.to_string()))?;

        let content: String = api
            .content
            .iter()
            .filter(|c| c.kind == "text")
            .map(|c| c.text.as_str())
            .collect();

        let finish_reason = match api.stop_reason.as_deref() {
            Some("end_turn") | None => FinishReason::Stop,
            Some("max_tokens") => FinishReason::Length,
            Some("tool_use") => FinishReason::ToolUse,
            Some(_) => FinishReason::Other,
        };

        Ok(ChatResponse {
            content,
            model: api.model,
            usage: TokenUsage {
                input_tokens: api.usage.input_tokens,
                output_tokens: api.usage.output_tokens,
                cached_tokens: api.usage.cache_read_input_tokens,
            },
            finish_reason,
        })
    }
}

impl std::fmt::Debug for ClaudeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeProvider")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;

    #[test]
    fn test_system_messages_lift_to_system_field() {
        let provider = ClaudeProvider::new(ProviderConfig::new("k", "claude-sonnet-4-20250514"));
        let request = ChatRequest::new(vec![
            ChatMessage::system("You are terse."),
            ChatMessage::user("hi"),
        ]);
        let body = provider.build_request(&request);
        assert_eq!(body["system"], "You are terse.");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_model_override() {
        let provider = ClaudeProvider::new(ProviderConfig::new("k", "claude-sonnet-4-20250514"));
        let request = ChatRequest::user("hi").with_model("claude-haiku-3-5-20241022");
        let body = provider.build_request(&request);
        assert_eq!(body["model"], "claude-haiku-3-5-20241022");
    }
}

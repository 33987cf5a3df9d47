//! OpenAI-compatible provider.
//!
//! One implementation covers every provider speaking the
//! `/v1/chat/completions` dialect: OpenAI itself, DeepSeek, Mistral, Grok,
//! and local Ollama (empty API key).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use crate::error::{AiError, AiResult};
use crate::provider::{AiProvider, ProviderConfig};
use crate::types::{ChatRequest, ChatResponse, ChatRole, FinishReason, TokenUsage};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Provider for any OpenAI-compatible chat endpoint.
pub struct OpenAiCompatProvider {
    name: String,
    client: Client,
    config: ProviderConfig,
}

impl OpenAiCompatProvider {
    /// Create a provider with an explicit name (`openai`, `deepseek`, …).
    #[must_use]
    pub fn new(name: impl Into<String>, config: ProviderConfig) -> Self {
        Self {
            name: name.into(),
            client: Client::new(),
            config,
        }
    }

    fn build_request(&self, request: &ChatRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| {
                json!({
                    "role": match m.role {
                        ChatRole::System => "system",
                        ChatRole::User => "user",
                        ChatRole::Assistant => "assistant",
                    },
                    "content": m.content,
                })
            })
            .collect();

        let mut body = json!({
            "model": request.model.as_deref().unwrap_or(&self.config.model),
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": messages,
        });

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.input_schema,
                        }
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
    choices: Vec<ApiChoice>,
    model: String,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[async_trait]
impl AiProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        &self.config.model
    }

    async fn chat(&self, request: &ChatRequest) -> AiResult<ChatResponse> {
        let url = self.config.base_url.as_deref().unwrap_or(OPENAI_API_URL);
        debug!(provider = %self.name, "OpenAI-compatible chat request");

        let mut builder = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .timeout(Duration::from_millis(self.config.timeout_ms));
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(&self.config.api_key);
        }

        let response = builder.json(&self.build_request(request)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::from_status(status.as_u16(), body));
        }

        let api: ApiResponse = response
            .json()
            .await
            .map_err(|e| AiError::InvalidResponse(e.to_string()))?;

        let choice = api
            .choices
            .first()
            .ok_or_else(|| AiError::InvalidResponse("no choices in response".into()))?;

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("stop") | None => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("tool_calls") => FinishReason::ToolUse,
            Some("content_filter") => FinishReason::ContentFilter,
            Some(_) => FinishReason::Other,
        };

        let usage = api.usage.unwrap_or_default();

        Ok(ChatResponse {
            content: choice.message.content.clone().unwrap_or_default(),
            model: api.model,
            usage: TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
                cached_tokens: 0,
            },
            finish_reason,
        })
    }
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;

    #[test]
    fn test_system_stays_inline() {
        let provider =
            OpenAiCompatProvider::new("openai", ProviderConfig::new("k", "gpt-4o-mini"));
        let request = ChatRequest::new(vec![
            ChatMessage::system("You are terse."),
            ChatMessage::user("hi"),
        ]);
        let body = provider.build_request(&request);
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(body["messages"][0]["role"], "system");
    }
}

//! The provider trait.

use async_trait::async_trait;

use crate::error::AiResult;
use crate::types::{ChatRequest, ChatResponse};

/// A chat-capable model provider.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Provider name (`anthropic`, `openai`, `ollama`, …).
    fn name(&self) -> &str;

    /// Model used when a request does not specify one.
    fn default_model(&self) -> &str;

    /// Run a chat completion.
    async fn chat(&self, request: &ChatRequest) -> AiResult<ChatResponse>;

    /// Approximate token count for a text (~4 characters per token).
    fn count_tokens(&self, text: &str) -> u64 {
        (text.len() / 4) as u64
    }
}

/// Blanket implementation so `Box<dyn AiProvider>` satisfies `AiProvider`.
#[async_trait]
impl AiProvider for Box<dyn AiProvider> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn default_model(&self) -> &str {
        (**self).default_model()
    }

    async fn chat(&self, request: &ChatRequest) -> AiResult<ChatResponse> {
        (**self).chat(request).await
    }

    fn count_tokens(&self, text: &str) -> u64 {
        (**self).count_tokens(text)
    }
}

/// Configuration for an HTTP provider.
#[derive(Clone)]
pub struct ProviderConfig {
    /// API key. Empty for local providers.
    pub api_key: String,
    /// Default model name.
    pub model: String,
    /// Base URL override (OpenAI-compatible providers, local endpoints).
    pub base_url: Option<String>,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl ProviderConfig {
    /// Create a config with the given key and model.
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            timeout_ms: 60_000,
        }
    }

    /// Set the base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("has_api_key", &!self.api_key.is_empty())
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

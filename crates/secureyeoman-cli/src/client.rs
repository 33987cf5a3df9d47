//! Thin HTTP client for the gateway API.

use anyhow::{Context, anyhow};
use serde_json::Value;

/// API client carrying the base URL, credential, and output mode.
pub(crate) struct ApiClient {
    base_url: String,
    token: Option<String>,
    json_output: bool,
    http: reqwest::Client,
}

impl ApiClient {
    pub(crate) fn new(base_url: String, token: Option<String>, json_output: bool) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            json_output,
            http: reqwest::Client::new(),
        }
    }

    /// Whether output should be raw JSON.
    pub(crate) fn json_output(&self) -> bool {
        self.json_output
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(method, format!("{}{path}", self.base_url));
        if let Some(token) = &self.token {
            // API keys start with the sy_ prefix; anything else is treated
            // as a bearer token.
            if token.starts_with("sy_") {
                builder = builder.header("x-api-key", token);
            } else {
                builder = builder.bearer_auth(token);
            }
        }
        builder
    }

    async fn handle(&self, response: reqwest::Response) -> anyhow::Result<Value> {
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .unwrap_or_else(|_| Value::String("<non-JSON response>".into()));
        if status.is_success() {
            Ok(body)
        } else {
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("request failed");
            Err(anyhow!("{status}: {message}"))
        }
    }

    pub(crate) async fn get(&self, path: &str) -> anyhow::Result<Value> {
        let response = self
            .request(reqwest::Method::GET, path)
            .send()
            .await
            .with_context(|| format!("GET {path}"))?;
        self.handle(response).await
    }

    pub(crate) async fn post(&self, path: &str, body: &Value) -> anyhow::Result<Value> {
        let response = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {path}"))?;
        self.handle(response).await
    }

    pub(crate) async fn delete(&self, path: &str) -> anyhow::Result<Value> {
        let response = self
            .request(reqwest::Method::DELETE, path)
            .send()
            .await
            .with_context(|| format!("DELETE {path}"))?;
        self.handle(response).await
    }
}

//! The AI gateway: provider selection, budget enforcement, retry, and
//! usage accounting.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use rand::Rng;
use tracing::{debug, warn};

use crate::cost::CostCalculator;
use crate::error::{AiError, AiResult};
use crate::provider::AiProvider;
use crate::retry::RetryConfig;
use crate::types::{ChatRequest, ChatResponse};
use crate::usage::{LimitCheck, UsageRecord, UsageTracker};
use secureyeoman_core::Timestamp;

/// Provider-agnostic chat dispatch.
pub struct AiGateway {
    providers: HashMap<String, Arc<dyn AiProvider>>,
    default_provider: RwLock<String>,
    default_model: RwLock<Option<String>>,
    usage: Arc<UsageTracker>,
    costs: CostCalculator,
    retry: RetryConfig,
}

impl AiGateway {
    /// Create a gateway over a set of providers.
    ///
    /// `default_provider` must be a key of `providers`.
    #[must_use]
    pub fn new(
        providers: HashMap<String, Arc<dyn AiProvider>>,
        default_provider: impl Into<String>,
        usage: Arc<UsageTracker>,
        costs: CostCalculator,
        retry: RetryConfig,
    ) -> Self {
        Self {
            providers,
            default_provider: RwLock::new(default_provider.into()),
            default_model: RwLock::new(None),
            usage,
            costs,
            retry,
        }
    }

    /// Registered provider names.
    #[must_use]
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether any provider is registered.
    #[must_use]
    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }

    /// The current default provider and model.
    #[must_use]
    pub fn current_default(&self) -> (String, Option<String>) {
        let provider = self
            .default_provider
            .read()
            .map(|g| g.clone())
            .unwrap_or_default();
        let model = self.default_model.read().ok().and_then(|g| g.clone());
        (provider, model)
    }

    /// Switch the default provider (and optionally pin a model).
    ///
    /// # Errors
    ///
    /// Returns [`AiError::NotConfigured`] for unknown providers.
    pub fn switch(&self, provider: &str, model: Option<String>) -> AiResult<()> {
        if !self.providers.contains_key(provider) {
            return Err(AiError::NotConfigured(provider.to_string()));
        }
        if let Ok(mut guard) = self.default_provider.write() {
            *guard = provider.to_string();
        }
        if let Ok(mut guard) = self.default_model.write() {
            *guard = model;
        }
        Ok(())
    }

    /// Clear the pinned default model.
    pub fn clear_default_model(&self) {
        if let Ok(mut guard) = self.default_model.write() {
            *guard = None;
        }
    }

    /// The usage tracker.
    #[must_use]
    pub fn usage(&self) -> &Arc<UsageTracker> {
        &self.usage
    }

    /// Check the daily budget without dispatching.
    #[must_use]
    pub fn check_limit(&self) -> LimitCheck {
        self.usage.check_limit()
    }

    /// Dispatch a chat request through the default provider.
    ///
    /// Enforces the daily token budget up front, retries transient provider
    /// errors with exponential backoff and jitter, records usage and cost on
    /// success, and surfaces the last error on exhaustion.
    ///
    /// # Errors
    ///
    /// Returns [`AiError::TokenLimit`] when the daily ceiling is exhausted,
    /// or the last provider error after the retry budget is spent.
    pub async fn chat(&self, request: &ChatRequest) -> AiResult<ChatResponse> {
        let limit = self.usage.check_limit();
        if !limit.allowed {
            return Err(AiError::TokenLimit {
                used: limit.tokens_used_today,
                limit: limit.limit_per_day.unwrap_or(0),
            });
        }

        let (provider_name, pinned_model) = self.current_default();
        let provider = self
            .providers
            .get(&provider_name)
            .ok_or_else(|| AiError::NotConfigured(provider_name.clone()))?;

        let mut request = request.clone();
        if request.model.is_none() {
            request.model = pinned_model;
        }

        let mut attempt: u32 = 0;
        loop {
            let started = Instant::now();
            match provider.chat(&request).await {
                Ok(response) => {
                    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(0);
                    let cost_usd = self.costs.cost_usd(
                        &provider_name,
                        &response.model,
                        response.usage.input_tokens,
                        response.usage.output_tokens,
                    );
                    self.usage.record(UsageRecord {
                        provider: provider_name.clone(),
                        model: response.model.clone(),
                        usage: response.usage,
                        cost_usd,
                        latency_ms: Some(latency_ms),
                        timestamp: Timestamp::now(),
                    });
                    debug!(
                        provider = %provider_name,
                        model = %response.model,
                        latency_ms,
                        "Chat completed"
                    );
                    return Ok(response);
                },
                Err(err) if err.is_retriable() && self.retry.should_retry(attempt) => {
                    attempt = attempt.saturating_add(1);
                    let delay = self
                        .retry
                        .delay_with_jitter(attempt, rand::thread_rng().r#gen::<f64>());
                    warn!(
                        provider = %provider_name,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(0),
                        error = %err,
                        "Retriable provider error; backing off"
                    );
                    tokio::time::sleep(delay).await;
                },
                Err(err) => {
                    self.usage.record_error();
                    return Err(err);
                },
            }
        }
    }
}

impl std::fmt::Debug for AiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiGateway")
            .field("providers", &self.provider_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FinishReason, TokenUsage};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Provider that fails N times with a retriable error, then succeeds.
    struct FlakyProvider {
        failures: AtomicU32,
    }

    #[async_trait]
    impl AiProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        fn default_model(&self) -> &str {
            "flaky-model"
        }

        async fn chat(&self, _request: &ChatRequest) -> AiResult<ChatResponse> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(AiError::ProviderUnavailable("503".into()));
            }
            Ok(ChatResponse {
                content: "ok".into(),
                model: "flaky-model".into(),
                usage: TokenUsage {
                    input_tokens: 10,
                    output_tokens: 5,
                    cached_tokens: 0,
                },
                finish_reason: FinishReason::Stop,
            })
        }
    }

    struct AuthFailProvider;

    #[async_trait]
    impl AiProvider for AuthFailProvider {
        fn name(&self) -> &str {
            "authfail"
        }

        fn default_model(&self) -> &str {
            "m"
        }

        async fn chat(&self, _request: &ChatRequest) -> AiResult<ChatResponse> {
            Err(AiError::Authentication("bad key".into()))
        }
    }

    fn gateway_with(provider: Arc<dyn AiProvider>, limit: Option<u64>) -> AiGateway {
        let name = provider.name().to_string();
        let mut providers: HashMap<String, Arc<dyn AiProvider>> = HashMap::new();
        providers.insert(name.clone(), provider);
        AiGateway::new(
            providers,
            name,
            Arc::new(UsageTracker::new(limit)),
            CostCalculator::new(),
            RetryConfig {
                max_attempts: 3,
                initial_delay: std::time::Duration::from_millis(1),
                max_delay: std::time::Duration::from_millis(5),
                exponential_base: 2.0,
                jitter_factor: 0.0,
            },
        )
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let gateway = gateway_with(
            Arc::new(FlakyProvider {
                failures: AtomicU32::new(2),
            }),
            None,
        );
        let response = gateway.chat(&ChatRequest::user("hi")).await.unwrap();
        assert_eq!(response.content, "ok");
        assert_eq!(gateway.usage().summary().call_count, 1);
    }

    #[tokio::test]
    async fn test_terminal_error_not_retried() {
        let gateway = gateway_with(Arc::new(AuthFailProvider), None);
        let err = gateway.chat(&ChatRequest::user("hi")).await.unwrap_err();
        assert!(matches!(err, AiError::Authentication(_)));
        assert_eq!(gateway.usage().summary().error_count, 1);
    }

    #[tokio::test]
    async fn test_budget_rejects_before_dispatch() {
        let gateway = gateway_with(
            Arc::new(FlakyProvider {
                failures: AtomicU32::new(0),
            }),
            Some(10),
        );
        // First call passes (nothing used yet) and records 15 tokens.
        gateway.chat(&ChatRequest::user("hi")).await.unwrap();
        // Ceiling is now exceeded; next call must be rejected.
        let err = gateway.chat(&ChatRequest::user("hi")).await.unwrap_err();
        assert!(matches!(err, AiError::TokenLimit { .. }));
    }

    #[tokio::test]
    async fn test_switch_provider() {
        let gateway = gateway_with(
            Arc::new(FlakyProvider {
                failures: AtomicU32::new(0),
            }),
            None,
        );
        assert!(gateway.switch("flaky", Some("pinned".into())).is_ok());
        assert_eq!(
            gateway.current_default(),
            ("flaky".to_string(), Some("pinned".to_string()))
        );
        assert!(matches!(
            gateway.switch("missing", None),
            Err(AiError::NotConfigured(_))
        ));
    }
}

//! Process wiring: subsystem construction and shared state.

use std::collections::HashMap;
use std::sync::Arc;

use secureyeoman_ai::{
    AiGateway, AiProvider, ClaudeProvider, CostCalculator, ModelRouter, OpenAiCompatProvider,
    ProviderConfig, RetryConfig, UsageTracker, default_catalog,
};
use secureyeoman_audit::{AuditChain, KvAuditStorage};
use secureyeoman_auth::{
    AdminCredential, ApiKeyStore, AuthService, RateLimiter, RbacEngine, TokenService,
};
use secureyeoman_core::{YeomanError, YeomanResult};
use secureyeoman_crypto::SigningKey;
use secureyeoman_hooks::{ExtensionStore, HookEngine, WebhookDispatcher, WebhookStore};
use secureyeoman_integrations::{AdapterRegistry, IntegrationRouter, IntegrationStore};
use secureyeoman_memory::{
    ConsolidationConfig, ConsolidationManager, Embedder, FlatVectorIndex, HashingEmbedder,
    MemoryStore, QuickCheckThresholds, VectorIndex,
};
use secureyeoman_soul::SoulStore;
use secureyeoman_storage::KvStore;
use secureyeoman_tasks::TaskExecutor;
use tracing::info;

use crate::config::Config;
use crate::handler::AiQueryHandler;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Gateway configuration (secrets redacted on serialize).
    pub config: Arc<Config>,
    /// The audit chain.
    pub audit: Arc<AuditChain>,
    /// Authentication and authorization.
    pub auth: Arc<AuthService>,
    /// Personas, skills, knowledge.
    pub soul: Arc<SoulStore>,
    /// Long-term memory.
    pub memory: Arc<MemoryStore>,
    /// Deep-consolidation manager.
    pub consolidation: Arc<ConsolidationManager>,
    /// AI gateway (None when no provider is configured).
    pub gateway: Option<Arc<AiGateway>>,
    /// Model router over the configured catalog.
    pub model_router: Arc<ModelRouter>,
    /// Task executor.
    pub executor: Arc<TaskExecutor>,
    /// Inbound message router.
    pub integrations: Arc<IntegrationRouter>,
    /// Extension hook engine.
    pub hooks: Arc<HookEngine>,
    /// Persisted extension registry.
    pub extensions: Arc<ExtensionStore>,
    /// Outbound webhook configuration.
    webhook_store: Arc<WebhookStore>,
}

impl AppState {
    /// The outbound webhook configuration store.
    #[must_use]
    pub fn webhook_store(&self) -> &Arc<WebhookStore> {
        &self.webhook_store
    }
}

fn build_providers(config: &Config) -> HashMap<String, Arc<dyn AiProvider>> {
    let mut providers: HashMap<String, Arc<dyn AiProvider>> = HashMap::new();

    if let Some(key) = &config.providers.anthropic {
        providers.insert(
            "anthropic".into(),
            Arc::new(ClaudeProvider::new(ProviderConfig::new(
                key.clone(),
                "claude-sonnet-4-20250514",
            ))),
        );
    }
    if let Some(key) = &config.providers.openai {
        providers.insert(
            "openai".into(),
            Arc::new(OpenAiCompatProvider::new(
                "openai",
                ProviderConfig::new(key.clone(), "gpt-4o"),
            )),
        );
    }
    if let Some(key) = &config.providers.deepseek {
        providers.insert(
            "deepseek".into(),
            Arc::new(OpenAiCompatProvider::new(
                "deepseek",
                ProviderConfig::new(key.clone(), "deepseek-chat")
                    .base_url("https://api.deepseek.com/chat/completions"),
            )),
        );
    }
    if let Some(key) = &config.providers.mistral {
        providers.insert(
            "mistral".into(),
            Arc::new(OpenAiCompatProvider::new(
                "mistral",
                ProviderConfig::new(key.clone(), "mistral-large-latest")
                    .base_url("https://api.mistral.ai/v1/chat/completions"),
            )),
        );
    }
    if let Some(key) = &config.providers.grok {
        providers.insert(
            "grok".into(),
            Arc::new(OpenAiCompatProvider::new(
                "grok",
                ProviderConfig::new(key.clone(), "grok-2-latest")
                    .base_url("https://api.x.ai/v1/chat/completions"),
            )),
        );
    }
    if let Some(url) = &config.providers.ollama_url {
        providers.insert(
            "ollama".into(),
            Arc::new(OpenAiCompatProvider::new(
                "ollama",
                ProviderConfig::new("", "llama3.1")
                    .base_url(format!("{}/v1/chat/completions", url.trim_end_matches('/'))),
            )),
        );
    }

    providers
}

/// Construct every subsystem over the given KV backend.
///
/// `ephemeral` selects an in-memory vector index (tests); otherwise the
/// index persists under `config.data_dir`.
///
/// # Errors
///
/// Returns an error if any subsystem fails to initialize.
pub async fn build_state(
    config: Config,
    kv: Arc<dyn KvStore>,
    ephemeral: bool,
) -> YeomanResult<AppState> {
    let signing_key = SigningKey::new(config.signing_key.as_bytes().to_vec())
        .map_err(|e| YeomanError::invalid_input(e.to_string()))?;

    // Audit underpins everything; build it first.
    let audit_storage = Arc::new(KvAuditStorage::new(Arc::clone(&kv))?);
    let audit = Arc::new(AuditChain::open(audit_storage, signing_key).await?);

    // Auth core.
    let auth = Arc::new(AuthService::new(
        AdminCredential::from_phc_hash(&config.admin_password_hash)?,
        TokenService::with_ttls(
            config.token_secret.as_bytes(),
            config.access_ttl_secs,
            config.refresh_ttl_secs,
        ),
        Arc::new(RbacEngine::new()),
        Arc::new(RateLimiter::new()),
        ApiKeyStore::new(Arc::clone(&kv))?,
        Arc::clone(&audit),
    ));

    let soul = Arc::new(SoulStore::new(Arc::clone(&kv))?);

    // AI gateway, if any provider is configured.
    let providers = build_providers(&config);
    let provider_names: Vec<String> = providers.keys().cloned().collect();
    let gateway = if providers.is_empty() {
        None
    } else {
        let default_provider = config
            .default_provider
            .clone()
            .filter(|p| providers.contains_key(p))
            .or_else(|| {
                let mut names = provider_names.clone();
                names.sort();
                names.first().cloned()
            })
            .unwrap_or_default();
        Some(Arc::new(AiGateway::new(
            providers,
            default_provider,
            Arc::new(UsageTracker::new(config.daily_token_limit)),
            CostCalculator::new(),
            RetryConfig::api(),
        )))
    };

    // Model catalog restricted to configured providers.
    let catalog = default_catalog()
        .into_iter()
        .filter(|c| provider_names.contains(&c.provider))
        .collect();
    let model_router = Arc::new(ModelRouter::new(catalog, CostCalculator::new()));

    // Memory engine.
    let embedder = Arc::new(HashingEmbedder::new());
    let index: Arc<dyn VectorIndex> = if ephemeral {
        Arc::new(FlatVectorIndex::in_memory(embedder.dimension()))
    } else {
        std::fs::create_dir_all(&config.data_dir)
            .map_err(|e| YeomanError::storage(e.to_string()))?;
        Arc::new(FlatVectorIndex::open(
            config.data_dir.join("vector_index"),
            embedder.dimension(),
        )?)
    };
    let memory = Arc::new(
        MemoryStore::new(
            Arc::clone(&kv),
            index,
            embedder,
            QuickCheckThresholds::default(),
        )
        .await?,
    );
    let consolidation = Arc::new(ConsolidationManager::new(
        Arc::clone(&memory),
        gateway.clone(),
        ConsolidationConfig {
            schedule: config.consolidation_schedule.clone(),
            timeout_secs: config.consolidation_timeout_secs,
            ..ConsolidationConfig::default()
        },
    ));

    // Hooks and extensions.
    let webhook_store = Arc::new(WebhookStore::new(Arc::clone(&kv))?);
    let hooks = Arc::new(HookEngine::new(Arc::new(WebhookDispatcher::new(
        Arc::clone(&webhook_store),
        config.allow_webhooks,
        config.webhook_timeout_ms,
    ))));
    let extensions = Arc::new(ExtensionStore::new(Arc::clone(&kv))?);
    extensions.materialize(&hooks).await?;

    // Task executor with the AI query handler.
    let executor = Arc::new(TaskExecutor::new(
        Arc::clone(&kv),
        Arc::clone(&audit),
        Arc::new(AiQueryHandler::new(gateway.clone(), Arc::clone(&soul))),
    )?);

    // Integration pipeline. Adapters register at startup from outside the
    // core (platform crates are external collaborators).
    let integration_store = Arc::new(IntegrationStore::new(Arc::clone(&kv))?);
    let integrations = Arc::new(IntegrationRouter::new(
        integration_store,
        Arc::new(AdapterRegistry::new()),
        Arc::clone(&soul),
        Arc::clone(&executor),
        Arc::clone(&hooks),
        Arc::clone(&audit),
        None,
    ));

    info!(
        providers = ?provider_names,
        version = %config.version,
        "Gateway state assembled"
    );

    Ok(AppState {
        config: Arc::new(config),
        audit,
        auth,
        soul,
        memory,
        consolidation,
        gateway,
        model_router,
        executor,
        integrations,
        hooks,
        extensions,
        webhook_store,
    })
}


//! Gateway configuration.
//!
//! A closed struct with enumerated fields. Loaded from TOML with
//! environment-variable overrides; secrets never appear in `Debug` or
//! serialized output. Every section defaults to values that produce a
//! working development configuration once the required secrets are set.

use std::path::PathBuf;

use secureyeoman_core::{ErrorKind, YeomanError, YeomanResult};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};

/// Per-provider API keys, from environment or config.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderKeys {
    /// Anthropic API key.
    pub anthropic: Option<String>,
    /// OpenAI API key.
    pub openai: Option<String>,
    /// DeepSeek API key.
    pub deepseek: Option<String>,
    /// Mistral API key.
    pub mistral: Option<String>,
    /// Grok (x.ai) API key.
    pub grok: Option<String>,
    /// Ollama base URL (local; no key).
    pub ollama_url: Option<String>,
}

impl std::fmt::Debug for ProviderKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderKeys")
            .field("has_anthropic", &self.anthropic.is_some())
            .field("has_openai", &self.openai.is_some())
            .field("has_deepseek", &self.deepseek.is_some())
            .field("has_mistral", &self.mistral.is_some())
            .field("has_grok", &self.grok.is_some())
            .field("ollama_url", &self.ollama_url)
            .finish()
    }
}

/// Root gateway configuration.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Data directory for the embedded KV store and vector index.
    pub data_dir: PathBuf,
    /// Version string surfaced in banners and `/model/info`.
    pub version: String,
    /// Audit signing key material (≥32 characters). Required.
    pub signing_key: String,
    /// Session token secret. Required.
    pub token_secret: String,
    /// Admin password as an Argon2id PHC hash. Required.
    pub admin_password_hash: String,
    /// Optional daily token ceiling for the AI gateway.
    pub daily_token_limit: Option<u64>,
    /// Default provider name; first configured provider when unset.
    pub default_provider: Option<String>,
    /// Provider credentials.
    pub providers: ProviderKeys,
    /// Deep-consolidation schedule (5-field cron).
    pub consolidation_schedule: String,
    /// Deep-consolidation timeout in seconds.
    pub consolidation_timeout_secs: u64,
    /// Whether outbound extension webhooks may fire.
    pub allow_webhooks: bool,
    /// Outbound webhook timeout in milliseconds.
    pub webhook_timeout_ms: u64,
    /// Access-token lifetime in seconds.
    pub access_ttl_secs: i64,
    /// Refresh-token lifetime in seconds.
    pub refresh_ttl_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3030".into(),
            data_dir: PathBuf::from("./data"),
            version: env!("CARGO_PKG_VERSION").into(),
            signing_key: String::new(),
            token_secret: String::new(),
            admin_password_hash: String::new(),
            daily_token_limit: None,
            default_provider: None,
            providers: ProviderKeys::default(),
            consolidation_schedule: "0 3 * * *".into(),
            consolidation_timeout_secs: 300,
            allow_webhooks: true,
            webhook_timeout_ms: 5_000,
            access_ttl_secs: 3_600,
            refresh_ttl_secs: 86_400,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("data_dir", &self.data_dir)
            .field("version", &self.version)
            .field("has_signing_key", &!self.signing_key.is_empty())
            .field("has_token_secret", &!self.token_secret.is_empty())
            .field("has_admin_password_hash", &!self.admin_password_hash.is_empty())
            .field("daily_token_limit", &self.daily_token_limit)
            .field("default_provider", &self.default_provider)
            .field("providers", &self.providers)
            .field("consolidation_schedule", &self.consolidation_schedule)
            .field("allow_webhooks", &self.allow_webhooks)
            .finish_non_exhaustive()
    }
}

impl Serialize for Config {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Secrets (signing key, token secret, password hash, provider keys)
        // are intentionally omitted.
        let mut state = serializer.serialize_struct("Config", 9)?;
        state.serialize_field("bind_addr", &self.bind_addr)?;
        state.serialize_field("data_dir", &self.data_dir)?;
        state.serialize_field("version", &self.version)?;
        state.serialize_field("daily_token_limit", &self.daily_token_limit)?;
        state.serialize_field("default_provider", &self.default_provider)?;
        state.serialize_field("consolidation_schedule", &self.consolidation_schedule)?;
        state.serialize_field("consolidation_timeout_secs", &self.consolidation_timeout_secs)?;
        state.serialize_field("allow_webhooks", &self.allow_webhooks)?;
        state.serialize_field("webhook_timeout_ms", &self.webhook_timeout_ms)?;
        state.end()
    }
}

impl Config {
    /// Load configuration: TOML file (when present) with environment
    /// overrides, then validate.
    ///
    /// # Errors
    ///
    /// Returns `invalid_input` for unreadable/unparseable files or failed
    /// validation.
    pub fn load(path: Option<&std::path::Path>) -> YeomanResult<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    YeomanError::invalid_input(format!("cannot read config: {e}"))
                })?;
                toml::from_str(&text)
                    .map_err(|e| YeomanError::invalid_input(format!("bad config: {e}")))?
            },
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `SECUREYEOMAN_*` and provider environment variables.
    pub fn apply_env(&mut self) {
        let mut set = |var: &str, target: &mut String| {
            if let Ok(value) = std::env::var(var)
                && !value.is_empty()
            {
                *target = value;
            }
        };
        set("SECUREYEOMAN_BIND_ADDR", &mut self.bind_addr);
        set("SECUREYEOMAN_SIGNING_KEY", &mut self.signing_key);
        set("SECUREYEOMAN_TOKEN_SECRET", &mut self.token_secret);
        set(
            "SECUREYEOMAN_ADMIN_PASSWORD_HASH",
            &mut self.admin_password_hash,
        );

        if let Ok(dir) = std::env::var("SECUREYEOMAN_DATA_DIR")
            && !dir.is_empty()
        {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(limit) = std::env::var("SECUREYEOMAN_DAILY_TOKEN_LIMIT")
            && let Ok(limit) = limit.parse()
        {
            self.daily_token_limit = Some(limit);
        }

        let mut set_opt = |var: &str, target: &mut Option<String>| {
            if let Ok(value) = std::env::var(var)
                && !value.is_empty()
            {
                *target = Some(value);
            }
        };
        set_opt("ANTHROPIC_API_KEY", &mut self.providers.anthropic);
        set_opt("OPENAI_API_KEY", &mut self.providers.openai);
        set_opt("DEEPSEEK_API_KEY", &mut self.providers.deepseek);
        set_opt("MISTRAL_API_KEY", &mut self.providers.mistral);
        set_opt("GROK_API_KEY", &mut self.providers.grok);
        set_opt("OLLAMA_URL", &mut self.providers.ollama_url);
        set_opt("SECUREYEOMAN_DEFAULT_PROVIDER", &mut self.default_provider);
    }

    /// Validate required secrets.
    ///
    /// # Errors
    ///
    /// Returns `invalid_input` naming the first missing or too-short value.
    pub fn validate(&self) -> YeomanResult<()> {
        if self.signing_key.len() < 32 {
            return Err(YeomanError::new(
                ErrorKind::InvalidInput,
                "signing_key must be at least 32 characters",
            ));
        }
        if self.token_secret.len() < 32 {
            return Err(YeomanError::new(
                ErrorKind::InvalidInput,
                "token_secret must be at least 32 characters",
            ));
        }
        if self.admin_password_hash.is_empty() {
            return Err(YeomanError::new(
                ErrorKind::InvalidInput,
                "admin_password_hash is required",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secureyeoman_auth::AdminCredential;

    fn valid_config() -> Config {
        Config {
            signing_key: "k".repeat(32),
            token_secret: "s".repeat(32),
            admin_password_hash: AdminCredential::hash_password("pw-pw-pw-pw-pw-pw")
                .unwrap()
                .phc_hash()
                .to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_validation_requires_secrets() {
        assert!(Config::default().validate().is_err());
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_short_signing_key_rejected() {
        let mut config = valid_config();
        config.signing_key = "short".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serialization_omits_secrets() {
        let json = serde_json::to_string(&valid_config()).unwrap();
        assert!(!json.contains("signing_key"));
        assert!(!json.contains("token_secret"));
        assert!(!json.contains("admin_password_hash"));
        assert!(json.contains("bind_addr"));
    }

    #[test]
    fn test_debug_redacts() {
        let debug = format!("{:?}", valid_config());
        assert!(!debug.contains(&"k".repeat(32)));
        assert!(debug.contains("has_signing_key: true"));
    }
}

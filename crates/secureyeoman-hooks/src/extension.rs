//! Persisted extensions and their placeholder re-materialization.

use std::sync::Arc;

use secureyeoman_storage::{KvStore, ScopedKvStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::engine::{FnHookHandler, HandlerVerdict, HookContext, HookEngine, HookSemantics};
use crate::error::{HookError, HookResult};
use crate::point::HookPoint;

const NS_EXTENSIONS: &str = "hooks:extensions";

/// One hook an extension declares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionHookSpec {
    /// Point the hook fires at.
    pub point: HookPoint,
    /// Authority.
    pub semantics: HookSemantics,
    /// Lower runs first.
    pub priority: i32,
}

/// A persisted extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionRecord {
    /// Stable extension id.
    pub extension_id: String,
    /// Display name.
    pub name: String,
    /// Version string.
    pub version: String,
    /// Declared hooks.
    pub hooks: Vec<ExtensionHookSpec>,
}

/// KV-backed extension registry.
///
/// On startup, persisted extensions are re-materialized into no-op
/// placeholder handlers; code-based registrations replace them when the
/// extension's code registers itself.
pub struct ExtensionStore {
    store: ScopedKvStore,
}

impl ExtensionStore {
    /// Create a store over the given KV backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace binding fails.
    pub fn new(store: Arc<dyn KvStore>) -> HookResult<Self> {
        let store = ScopedKvStore::new(store, NS_EXTENSIONS)
            .map_err(|e| HookError::Storage(e.to_string()))?;
        Ok(Self { store })
    }

    /// Persist an extension record.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence fails.
    pub async fn upsert(&self, record: ExtensionRecord) -> HookResult<ExtensionRecord> {
        if record.extension_id.is_empty() {
            return Err(HookError::Invalid("extension_id must not be empty".into()));
        }
        self.store
            .set_json(&record.extension_id, &record)
            .await
            .map_err(|e| HookError::Storage(e.to_string()))?;
        Ok(record)
    }

    /// Fetch an extension.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::NotFound`] if the id is unknown.
    pub async fn get(&self, extension_id: &str) -> HookResult<ExtensionRecord> {
        self.store
            .get_json(extension_id)
            .await
            .map_err(|e| HookError::Storage(e.to_string()))?
            .ok_or_else(|| HookError::NotFound(format!("extension {extension_id}")))
    }

    /// List all extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn list(&self) -> HookResult<Vec<ExtensionRecord>> {
        let keys = self
            .store
            .list_keys()
            .await
            .map_err(|e| HookError::Storage(e.to_string()))?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = self
                .store
                .get_json::<ExtensionRecord>(&key)
                .await
                .map_err(|e| HookError::Storage(e.to_string()))?
            {
                out.push(record);
            }
        }
        out.sort_by(|a, b| a.extension_id.cmp(&b.extension_id));
        Ok(out)
    }

    /// Delete an extension record and all its registrations.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::NotFound`] if the id is unknown.
    pub async fn delete(&self, extension_id: &str, engine: &HookEngine) -> HookResult<()> {
        let existed = self
            .store
            .delete(extension_id)
            .await
            .map_err(|e| HookError::Storage(e.to_string()))?;
        if !existed {
            return Err(HookError::NotFound(format!("extension {extension_id}")));
        }
        engine.remove_extension_hooks(extension_id).await;
        Ok(())
    }

    /// Re-materialize every persisted extension's hooks into placeholder
    /// handlers on the engine. Returns how many hooks were registered.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn materialize(&self, engine: &HookEngine) -> HookResult<usize> {
        let mut registered = 0usize;
        for extension in self.list().await? {
            for hook in &extension.hooks {
                engine
                    .register_hook(
                        hook.point,
                        Arc::new(FnHookHandler(|_ctx: &HookContext, _cur: &Value| {
                            // Placeholder: the extension's code replaces
                            // this registration when it loads.
                            Ok(HandlerVerdict::pass())
                        })),
                        hook.semantics,
                        hook.priority,
                        Some(extension.extension_id.clone()),
                    )
                    .await;
                registered = registered.saturating_add(1);
            }
        }
        info!(registered, "Persisted extension hooks materialized");
        Ok(registered)
    }
}

impl std::fmt::Debug for ExtensionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionStore").finish_non_exhaustive()
    }
}

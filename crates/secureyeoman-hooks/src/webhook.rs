//! Outbound webhooks: signed HTTP fan-out of hook events.

use std::sync::Arc;
use std::time::Duration;

use secureyeoman_core::{Timestamp, WebhookId};
use secureyeoman_crypto::SigningKey;
use secureyeoman_storage::{KvStore, ScopedKvStore};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{HookError, HookResult};
use crate::point::HookPoint;

const NS_WEBHOOKS: &str = "hooks:webhooks";

/// A configured outbound webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookRecord {
    /// Unique identifier.
    pub id: WebhookId,
    /// Target URL.
    pub url: String,
    /// Points this webhook subscribes to.
    pub hook_points: Vec<HookPoint>,
    /// HMAC secret; when present, deliveries carry `X-Friday-Signature`.
    #[serde(default)]
    pub secret: Option<String>,
    /// Whether deliveries fire.
    pub enabled: bool,
}

impl WebhookRecord {
    /// Create an enabled webhook.
    #[must_use]
    pub fn new(url: impl Into<String>, hook_points: Vec<HookPoint>) -> Self {
        Self {
            id: WebhookId::new(),
            url: url.into(),
            hook_points,
            secret: None,
            enabled: true,
        }
    }

    /// Attach a signing secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }
}

/// KV-backed webhook configuration store.
pub struct WebhookStore {
    store: ScopedKvStore,
}

impl WebhookStore {
    /// Create a store over the given KV backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace binding fails.
    pub fn new(store: Arc<dyn KvStore>) -> HookResult<Self> {
        let store = ScopedKvStore::new(store, NS_WEBHOOKS)
            .map_err(|e| HookError::Storage(e.to_string()))?;
        Ok(Self { store })
    }

    /// Persist a webhook.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence fails.
    pub async fn upsert(&self, record: WebhookRecord) -> HookResult<WebhookRecord> {
        self.store
            .set_json(&record.id.to_string(), &record)
            .await
            .map_err(|e| HookError::Storage(e.to_string()))?;
        Ok(record)
    }

    /// Fetch a webhook.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::NotFound`] if the id is unknown.
    pub async fn get(&self, id: WebhookId) -> HookResult<WebhookRecord> {
        self.store
            .get_json(&id.to_string())
            .await
            .map_err(|e| HookError::Storage(e.to_string()))?
            .ok_or_else(|| HookError::NotFound(format!("webhook {id}")))
    }

    /// List all webhooks.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn list(&self) -> HookResult<Vec<WebhookRecord>> {
        let keys = self
            .store
            .list_keys()
            .await
            .map_err(|e| HookError::Storage(e.to_string()))?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = self
                .store
                .get_json::<WebhookRecord>(&key)
                .await
                .map_err(|e| HookError::Storage(e.to_string()))?
            {
                out.push(record);
            }
        }
        out.sort_by_key(|r| r.id);
        Ok(out)
    }

    /// Delete a webhook.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::NotFound`] if the id is unknown.
    pub async fn delete(&self, id: WebhookId) -> HookResult<()> {
        let existed = self
            .store
            .delete(&id.to_string())
            .await
            .map_err(|e| HookError::Storage(e.to_string()))?;
        if !existed {
            return Err(HookError::NotFound(format!("webhook {id}")));
        }
        Ok(())
    }
}

impl std::fmt::Debug for WebhookStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookStore").finish_non_exhaustive()
    }
}

/// Delivers hook events to subscribed webhooks.
///
/// Deliveries are fire-and-forget: failures are logged at `warn` and never
/// affect in-process hook outcomes.
pub struct WebhookDispatcher {
    store: Arc<WebhookStore>,
    client: reqwest::Client,
    allow_webhooks: bool,
    timeout_ms: u64,
}

impl WebhookDispatcher {
    /// Create a dispatcher. `allow_webhooks = false` disables all delivery.
    #[must_use]
    pub fn new(store: Arc<WebhookStore>, allow_webhooks: bool, timeout_ms: u64) -> Self {
        Self {
            store,
            client: reqwest::Client::new(),
            allow_webhooks,
            timeout_ms,
        }
    }

    /// The configuration store.
    #[must_use]
    pub fn store(&self) -> &Arc<WebhookStore> {
        &self.store
    }

    /// Build the signature header value for a body under a secret.
    ///
    /// # Errors
    ///
    /// Returns an error for secrets under the minimum HMAC key length.
    pub fn sign_body(secret: &str, body: &[u8]) -> HookResult<String> {
        // Webhook secrets may be shorter than the audit signing key floor;
        // pad deterministically to reuse the same HMAC construction.
        let mut material = secret.as_bytes().to_vec();
        if material.len() < SigningKey::MIN_LEN {
            material.resize(SigningKey::MIN_LEN, 0);
        }
        let key = SigningKey::new(material).map_err(|e| HookError::Invalid(e.to_string()))?;
        Ok(format!("sha256={}", key.sign(body).to_hex()))
    }

    /// Fan an event out to every enabled webhook subscribed to `point`.
    pub async fn dispatch(&self, point: HookPoint, event: &str, data: Value) {
        if !self.allow_webhooks {
            return;
        }
        let Ok(webhooks) = self.store.list().await else {
            warn!("Webhook store unavailable; skipping dispatch");
            return;
        };

        let payload = json!({
            "hookPoint": point.as_str(),
            "event": event,
            "data": data,
            "timestamp": Timestamp::now(),
        });

        for webhook in webhooks
            .into_iter()
            .filter(|w| w.enabled && w.hook_points.contains(&point))
        {
            let client = self.client.clone();
            let payload = payload.clone();
            let timeout = Duration::from_millis(self.timeout_ms);
            tokio::spawn(async move {
                deliver(client, webhook, payload, timeout).await;
            });
        }
    }
}

async fn deliver(
    client: reqwest::Client,
    webhook: WebhookRecord,
    payload: Value,
    timeout: Duration,
) {
    let body = match serde_json::to_vec(&payload) {
        Ok(body) => body,
        Err(e) => {
            warn!(webhook = %webhook.id, error = %e, "Webhook payload serialization failed");
            return;
        },
    };

    let mut request = client
        .post(&webhook.url)
        .header("Content-Type", "application/json")
        .header("X-Friday-Event", "extension-hook")
        .timeout(timeout)
        .body(body.clone());

    if let Some(secret) = &webhook.secret {
        match WebhookDispatcher::sign_body(secret, &body) {
            Ok(signature) => {
                request = request.header("X-Friday-Signature", signature);
            },
            Err(e) => {
                warn!(webhook = %webhook.id, error = %e, "Webhook signing failed");
                return;
            },
        }
    }

    match request.send().await {
        Ok(response) if response.status().is_success() => {
            debug!(webhook = %webhook.id, "Webhook delivered");
        },
        Ok(response) => {
            warn!(webhook = %webhook.id, status = %response.status(), "Webhook delivery rejected");
        },
        Err(e) => {
            warn!(webhook = %webhook.id, error = %e, "Webhook delivery failed");
        },
    }
}

impl std::fmt::Debug for WebhookDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookDispatcher")
            .field("allow_webhooks", &self.allow_webhooks)
            .field("timeout_ms", &self.timeout_ms)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secureyeoman_storage::MemoryKvStore;

    #[tokio::test]
    async fn test_store_crud() {
        let store = WebhookStore::new(Arc::new(MemoryKvStore::new())).unwrap();
        let record = WebhookRecord::new(
            "https://example.com/hook",
            vec![HookPoint::MessageInbound],
        )
        .with_secret("wh-secret");
        let id = record.id;

        store.upsert(record).await.unwrap();
        let loaded = store.get(id).await.unwrap();
        assert_eq!(loaded.url, "https://example.com/hook");
        assert!(loaded.enabled);

        store.delete(id).await.unwrap();
        assert!(store.get(id).await.is_err());
    }

    #[test]
    fn test_signature_shape_and_determinism() {
        let sig_a = WebhookDispatcher::sign_body("secret", b"{\"a\":1}").unwrap();
        let sig_b = WebhookDispatcher::sign_body("secret", b"{\"a\":1}").unwrap();
        assert!(sig_a.starts_with("sha256="));
        assert_eq!(sig_a.len(), 7 + 64);
        assert_eq!(sig_a, sig_b);

        let other = WebhookDispatcher::sign_body("other-secret", b"{\"a\":1}").unwrap();
        assert_ne!(sig_a, other);
    }
}

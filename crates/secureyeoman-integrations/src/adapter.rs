//! The platform adapter contract and the adapter registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secureyeoman_core::IntegrationId;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::IntegrationResult;
use crate::types::{OutboundReply, UnifiedMessage};

/// Declared outbound rate for a platform.
#[derive(Debug, Clone, Copy)]
pub struct PlatformRateLimit {
    /// Maximum sends per second.
    pub max_per_second: u32,
}

impl PlatformRateLimit {
    /// N sends per second.
    #[must_use]
    pub const fn per_second(max_per_second: u32) -> Self {
        Self { max_per_second }
    }

    /// Minimum interval between sends.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        if self.max_per_second == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(1_000_000 / u64::from(self.max_per_second))
        }
    }
}

/// The capability set every platform adapter implements.
#[async_trait]
pub trait IntegrationAdapter: Send + Sync {
    /// Platform tag (`telegram`, `line`, `github`, …).
    fn platform(&self) -> &str;

    /// Declared outbound rate.
    fn rate_limit(&self) -> PlatformRateLimit;

    /// Validate configuration and prepare the adapter.
    async fn init(&self) -> IntegrationResult<()>;

    /// Start receiving (long-poll loops, connection setup).
    async fn start(&self) -> IntegrationResult<()>;

    /// Stop receiving.
    async fn stop(&self) -> IntegrationResult<()>;

    /// Deliver a reply to the platform.
    async fn send_message(&self, reply: &OutboundReply) -> IntegrationResult<()>;

    /// Whether the adapter currently works.
    async fn is_healthy(&self) -> bool;

    /// Path suffix the HTTP layer mounts this adapter's webhook at.
    fn webhook_path(&self) -> String;

    /// Verify a webhook signature against the raw body. Must compare in
    /// constant time.
    fn verify_webhook(&self, raw_body: &[u8], signature_header: Option<&str>) -> bool;

    /// Parse a verified webhook event into unified messages.
    async fn handle_webhook(
        &self,
        integration_id: IntegrationId,
        raw_body: &[u8],
    ) -> IntegrationResult<Vec<UnifiedMessage>>;

    /// Voices the platform accepts for TTS replies. Empty = no audio.
    fn allowed_voices(&self) -> &[&str] {
        &[]
    }

    /// Optional connectivity probe.
    async fn test_connection(&self) -> IntegrationResult<()> {
        Ok(())
    }
}

/// Synthesizes speech for platforms that accept audio replies.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with `voice`; returns `(base64 audio, format)`.
    async fn synthesize(&self, text: &str, voice: &str) -> IntegrationResult<(String, String)>;
}

/// Registry of adapters plus per-platform outbound rate shaping.
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn IntegrationAdapter>>,
    /// Last send instant per platform, for rate shaping.
    last_send: Mutex<HashMap<String, Instant>>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
            last_send: Mutex::new(HashMap::new()),
        }
    }

    /// Register an adapter under its platform tag.
    pub fn register(&mut self, adapter: Arc<dyn IntegrationAdapter>) {
        self.adapters.insert(adapter.platform().to_string(), adapter);
    }

    /// Look up an adapter.
    #[must_use]
    pub fn get(&self, platform: &str) -> Option<Arc<dyn IntegrationAdapter>> {
        self.adapters.get(platform).cloned()
    }

    /// Registered platform tags, sorted.
    #[must_use]
    pub fn platforms(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.keys().cloned().collect();
        names.sort();
        names
    }

    /// Send a reply through an adapter, shaped to its declared rate.
    ///
    /// # Errors
    ///
    /// Returns the adapter's send error, or
    /// [`crate::IntegrationError::NoAdapter`] for unknown platforms.
    pub async fn send_shaped(
        &self,
        platform: &str,
        reply: &OutboundReply,
    ) -> IntegrationResult<()> {
        let adapter = self
            .get(platform)
            .ok_or_else(|| crate::IntegrationError::NoAdapter(platform.to_string()))?;

        let min_interval = adapter.rate_limit().min_interval();
        if !min_interval.is_zero() {
            let wait = {
                let mut last_send = self.last_send.lock().await;
                let now = Instant::now();
                let wait = last_send
                    .get(platform)
                    .and_then(|last| min_interval.checked_sub(now.duration_since(*last)))
                    .unwrap_or(Duration::ZERO);
                last_send.insert(platform.to_string(), now + wait);
                wait
            };
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }

        adapter.send_message(reply).await
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("platforms", &self.platforms())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_interval() {
        assert_eq!(
            PlatformRateLimit::per_second(30).min_interval(),
            Duration::from_micros(33_333)
        );
        assert_eq!(PlatformRateLimit::per_second(0).min_interval(), Duration::ZERO);
    }
}

//! The inbound message router.
//!
//! Normalized platform events flow through here: hook fan-out, persistence,
//! personality-scoped access control, task submission, and response relay
//! back to the originating platform. Failures never leak internals to the
//! platform user; they get a canned apology while the detail lands in the
//! audit chain.

use std::sync::Arc;

use secureyeoman_audit::{AuditChain, AuditEvent, AuditLevel};
use secureyeoman_hooks::{HookContext, HookEngine, HookPoint};
use secureyeoman_soul::SoulStore;
use secureyeoman_tasks::{ExecutionContext, TaskDefinition, TaskExecutor, TaskStatus};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::adapter::{AdapterRegistry, SpeechSynthesizer};
use crate::error::{IntegrationError, IntegrationResult};
use crate::store::IntegrationStore;
use crate::types::{OutboundReply, UnifiedMessage};

const FAILURE_REPLY: &str = "I encountered an error processing your message. Please try again.";

/// Routes unified inbound messages to the task pipeline and back.
pub struct IntegrationRouter {
    store: Arc<IntegrationStore>,
    adapters: Arc<AdapterRegistry>,
    soul: Arc<SoulStore>,
    executor: Arc<TaskExecutor>,
    hooks: Arc<HookEngine>,
    audit: Arc<AuditChain>,
    tts: Option<Arc<dyn SpeechSynthesizer>>,
}

impl IntegrationRouter {
    /// Wire the router.
    #[must_use]
    pub fn new(
        store: Arc<IntegrationStore>,
        adapters: Arc<AdapterRegistry>,
        soul: Arc<SoulStore>,
        executor: Arc<TaskExecutor>,
        hooks: Arc<HookEngine>,
        audit: Arc<AuditChain>,
        tts: Option<Arc<dyn SpeechSynthesizer>>,
    ) -> Self {
        Self {
            store,
            adapters,
            soul,
            executor,
            hooks,
            audit,
            tts,
        }
    }

    /// The adapter registry (HTTP webhook sinks resolve adapters here).
    #[must_use]
    pub fn adapters(&self) -> &Arc<AdapterRegistry> {
        &self.adapters
    }

    /// The integration store.
    #[must_use]
    pub fn store(&self) -> &Arc<IntegrationStore> {
        &self.store
    }

    /// Handle a normalized inbound message end to end.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures (persistence,
    /// audit). Task and send failures are handled inside: the user gets a
    /// canned reply and the detail is audited.
    pub async fn handle_inbound(&self, msg: UnifiedMessage) -> IntegrationResult<()> {
        // Hook fan-out first; observers see every inbound event, even ones
        // dropped later in the pipeline.
        self.hooks
            .emit(HookContext::new(
                HookPoint::MessageInbound,
                "message.inbound",
                json!({
                    "messageId": msg.id.to_string(),
                    "platform": msg.platform,
                    "senderId": msg.sender_id,
                }),
            ))
            .await;

        self.store.record_message(&msg).await?;

        if msg.text.trim().is_empty() {
            info!(message = %msg.id, "Skipping empty inbound message");
            return Ok(());
        }

        // Personality-scoped access control.
        let personality = self
            .soul
            .active_personality()
            .await
            .map_err(|e| IntegrationError::Storage(e.to_string()))?;
        if let Some(personality) = &personality
            && !personality.allows_integration(msg.integration_id)
        {
            info!(
                message = %msg.id,
                integration = %msg.integration_id,
                personality = %personality.name,
                "Integration not selected by active personality; dropping"
            );
            return Ok(());
        }

        let ctx = ExecutionContext::operator(format!("{}:{}", msg.platform, msg.sender_id))
            .with_correlation(msg.id.to_string());

        let definition = TaskDefinition::new(
            "QUERY",
            format!("{} message", msg.platform),
            json!({
                "text": msg.text,
                "platform": msg.platform,
                "chatId": msg.chat_id,
                "senderName": msg.sender_name,
            }),
        )
        .with_description(format!("inbound message from {}", msg.sender_id));

        match self.executor.submit_and_wait(definition, ctx).await {
            Ok(task) if task.status == TaskStatus::Completed => {
                let text = task
                    .result
                    .as_ref()
                    .and_then(extract_response_text)
                    .unwrap_or_default();
                let mut reply = OutboundReply {
                    task_id: task.id.to_string(),
                    chat_id: msg.chat_id.clone(),
                    reply_to_message_id: msg.platform_message_id.clone(),
                    text,
                    audio_base64: None,
                    audio_format: None,
                };
                self.attach_audio(&msg, &mut reply, personality.as_ref().and_then(|p| p.voice.clone()))
                    .await;
                self.send_or_apologize(&msg, reply).await;
            },
            Ok(task) => {
                self.record_failure(&msg, task.error.as_deref().unwrap_or("task failed"))
                    .await?;
                self.apologize(&msg, &task.id.to_string()).await;
            },
            Err(err) => {
                self.record_failure(&msg, &err.to_string()).await?;
                self.apologize(&msg, "").await;
            },
        }

        Ok(())
    }

    /// Synthesize speech when the persona voice is accepted by the
    /// platform and a synthesizer is wired.
    async fn attach_audio(
        &self,
        msg: &UnifiedMessage,
        reply: &mut OutboundReply,
        voice: Option<String>,
    ) {
        let (Some(tts), Some(voice)) = (&self.tts, voice) else {
            return;
        };
        let Some(adapter) = self.adapters.get(&msg.platform) else {
            return;
        };
        if !adapter.allowed_voices().contains(&voice.as_str()) {
            return;
        }
        match tts.synthesize(&reply.text, &voice).await {
            Ok((audio_base64, audio_format)) => {
                reply.audio_base64 = Some(audio_base64);
                reply.audio_format = Some(audio_format);
            },
            Err(e) => {
                warn!(error = %e, "Speech synthesis failed; sending text only");
            },
        }
    }

    async fn send_or_apologize(&self, msg: &UnifiedMessage, reply: OutboundReply) {
        let task_id = reply.task_id.clone();
        if let Err(e) = self.adapters.send_shaped(&msg.platform, &reply).await {
            warn!(platform = %msg.platform, error = %e, "Response send failed");
            if let Err(audit_err) = self.record_failure(msg, &e.to_string()).await {
                warn!(error = %audit_err, "Failed to audit send failure");
            }
            self.apologize(msg, &task_id).await;
        }
    }

    async fn apologize(&self, msg: &UnifiedMessage, task_id: &str) {
        let reply = OutboundReply {
            task_id: task_id.to_string(),
            chat_id: msg.chat_id.clone(),
            reply_to_message_id: msg.platform_message_id.clone(),
            text: FAILURE_REPLY.to_string(),
            audio_base64: None,
            audio_format: None,
        };
        if let Err(e) = self.adapters.send_shaped(&msg.platform, &reply).await {
            warn!(platform = %msg.platform, error = %e, "Failure reply could not be delivered");
        }
    }

    async fn record_failure(&self, msg: &UnifiedMessage, detail: &str) -> IntegrationResult<()> {
        self.audit
            .record(
                AuditEvent::new(
                    "integration_error",
                    AuditLevel::Error,
                    "inbound message processing failed",
                )
                .with_user(format!("{}:{}", msg.platform, msg.sender_id))
                .with_correlation(msg.id.to_string())
                .with_metadata(json!({"detail": detail, "platform": msg.platform})),
            )
            .await?;
        Ok(())
    }
}

/// Pull a response string out of a task result value.
fn extract_response_text(result: &Value) -> Option<String> {
    match result {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("response")
            .or_else(|| map.get("text"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

impl std::fmt::Debug for IntegrationRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationRouter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{IntegrationAdapter, PlatformRateLimit};
    use crate::types::IntegrationRecord;
    use async_trait::async_trait;
    use secureyeoman_core::{IntegrationId, YeomanError};
    use secureyeoman_crypto::SigningKey;
    use secureyeoman_hooks::{WebhookDispatcher, WebhookStore};
    use secureyeoman_soul::Personality;
    use secureyeoman_storage::MemoryKvStore;
    use secureyeoman_tasks::{LoopGuard, TaskHandler, TaskRecord};
    use std::sync::Mutex as StdMutex;

    /// Adapter that records outbound replies.
    struct CaptureAdapter {
        sent: StdMutex<Vec<OutboundReply>>,
    }

    impl CaptureAdapter {
        fn new() -> Self {
            Self {
                sent: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl IntegrationAdapter for CaptureAdapter {
        fn platform(&self) -> &str {
            "testchat"
        }

        fn rate_limit(&self) -> PlatformRateLimit {
            PlatformRateLimit::per_second(0)
        }

        async fn init(&self) -> IntegrationResult<()> {
            Ok(())
        }

        async fn start(&self) -> IntegrationResult<()> {
            Ok(())
        }

        async fn stop(&self) -> IntegrationResult<()> {
            Ok(())
        }

        async fn send_message(&self, reply: &OutboundReply) -> IntegrationResult<()> {
            self.sent.lock().expect("test lock").push(reply.clone());
            Ok(())
        }

        async fn is_healthy(&self) -> bool {
            true
        }

        fn webhook_path(&self) -> String {
            "/webhooks/testchat".into()
        }

        fn verify_webhook(&self, _raw_body: &[u8], _signature_header: Option<&str>) -> bool {
            true
        }

        async fn handle_webhook(
            &self,
            _integration_id: IntegrationId,
            _raw_body: &[u8],
        ) -> IntegrationResult<Vec<UnifiedMessage>> {
            Ok(Vec::new())
        }
    }

    struct EchoHandler;

    #[async_trait]
    impl TaskHandler for EchoHandler {
        async fn handle(
            &self,
            task: &TaskRecord,
            _ctx: &ExecutionContext,
            _guard: &mut LoopGuard,
        ) -> Result<Value, YeomanError> {
            let text = task.input["text"].as_str().unwrap_or("");
            Ok(json!({"response": format!("echo: {text}")}))
        }
    }

    struct Fixture {
        router: IntegrationRouter,
        adapter: Arc<CaptureAdapter>,
        soul: Arc<SoulStore>,
        integration_id: IntegrationId,
    }

    async fn make_fixture() -> Fixture {
        let kv: Arc<MemoryKvStore> = Arc::new(MemoryKvStore::new());
        let audit = Arc::new(
            AuditChain::in_memory(SigningKey::new(vec![8u8; 32]).unwrap())
                .await
                .unwrap(),
        );

        let store = Arc::new(IntegrationStore::new(kv.clone() as Arc<dyn secureyeoman_storage::KvStore>).unwrap());
        let integration = IntegrationRecord::new("testchat", "Test chat", json!({}));
        let integration_id = integration.id;
        store.upsert(integration).await.unwrap();

        let adapter = Arc::new(CaptureAdapter::new());
        let mut registry = AdapterRegistry::new();
        registry.register(adapter.clone() as Arc<dyn IntegrationAdapter>);

        let soul = Arc::new(
            SoulStore::new(kv.clone() as Arc<dyn secureyeoman_storage::KvStore>).unwrap(),
        );

        let executor = Arc::new(
            TaskExecutor::new(
                kv.clone() as Arc<dyn secureyeoman_storage::KvStore>,
                Arc::clone(&audit),
                Arc::new(EchoHandler),
            )
            .unwrap(),
        );

        let webhook_store =
            WebhookStore::new(kv as Arc<dyn secureyeoman_storage::KvStore>).unwrap();
        let hooks = Arc::new(HookEngine::new(Arc::new(WebhookDispatcher::new(
            Arc::new(webhook_store),
            false,
            1_000,
        ))));

        let router = IntegrationRouter::new(
            Arc::clone(&store),
            Arc::new(registry),
            Arc::clone(&soul),
            executor,
            hooks,
            audit,
            None,
        );

        Fixture {
            router,
            adapter,
            soul,
            integration_id,
        }
    }

    #[tokio::test]
    async fn test_inbound_message_gets_reply() {
        let fixture = make_fixture().await;
        let msg = UnifiedMessage::inbound(
            fixture.integration_id,
            "testchat",
            "user-1",
            "chat-1",
            "hello there",
        );
        fixture.router.handle_inbound(msg).await.unwrap();

        let sent = fixture.adapter.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "echo: hello there");
        assert_eq!(sent[0].chat_id, "chat-1");
    }

    #[tokio::test]
    async fn test_empty_text_is_skipped() {
        let fixture = make_fixture().await;
        let msg = UnifiedMessage::inbound(
            fixture.integration_id,
            "testchat",
            "user-1",
            "chat-1",
            "   ",
        );
        fixture.router.handle_inbound(msg).await.unwrap();
        assert!(fixture.adapter.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unselected_integration_is_dropped() {
        let fixture = make_fixture().await;

        // Active personality selects a different integration.
        let mut personality = Personality::new("Gatekeeper", "You are selective.");
        personality.selected_integrations.push(IntegrationId::new());
        let personality = fixture.soul.create_personality(personality).await.unwrap();
        fixture
            .soul
            .activate_personality(personality.id)
            .await
            .unwrap();

        let msg = UnifiedMessage::inbound(
            fixture.integration_id,
            "testchat",
            "user-1",
            "chat-1",
            "hello",
        );
        fixture.router.handle_inbound(msg).await.unwrap();
        assert!(fixture.adapter.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_selected_integration_passes() {
        let fixture = make_fixture().await;

        let mut personality = Personality::new("Gatekeeper", "You are selective.");
        personality
            .selected_integrations
            .push(fixture.integration_id);
        let personality = fixture.soul.create_personality(personality).await.unwrap();
        fixture
            .soul
            .activate_personality(personality.id)
            .await
            .unwrap();

        let msg = UnifiedMessage::inbound(
            fixture.integration_id,
            "testchat",
            "user-1",
            "chat-1",
            "hello",
        );
        fixture.router.handle_inbound(msg).await.unwrap();
        assert_eq!(fixture.adapter.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_message_count_incremented() {
        let fixture = make_fixture().await;
        let msg = UnifiedMessage::inbound(
            fixture.integration_id,
            "testchat",
            "user-1",
            "chat-1",
            "hello",
        );
        fixture.router.handle_inbound(msg).await.unwrap();
        let integration = fixture
            .router
            .store()
            .get(fixture.integration_id)
            .await
            .unwrap();
        assert_eq!(integration.message_count, 1);
    }
}

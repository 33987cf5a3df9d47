//! The default task handler: drives QUERY tasks through the AI gateway
//! with loop-guard recovery.

use std::sync::Arc;

use async_trait::async_trait;
use secureyeoman_ai::{AiGateway, ChatMessage, ChatRequest};
use secureyeoman_core::{ErrorKind, YeomanError};
use secureyeoman_soul::SoulStore;
use secureyeoman_tasks::{
    ExecutionContext, LoopGuard, TaskHandler, TaskRecord, build_recovery_prompt,
};
use serde_json::{Value, json};

/// Handles QUERY tasks: composes the persona prompt, injects a recovery
/// turn when the loop guard reports the task stuck, and dispatches through
/// the gateway.
pub struct AiQueryHandler {
    gateway: Option<Arc<AiGateway>>,
    soul: Arc<SoulStore>,
}

impl AiQueryHandler {
    /// Wire the handler. `gateway = None` fails queries with
    /// `precondition_failed`.
    #[must_use]
    pub fn new(gateway: Option<Arc<AiGateway>>, soul: Arc<SoulStore>) -> Self {
        Self { gateway, soul }
    }
}

#[async_trait]
impl TaskHandler for AiQueryHandler {
    async fn handle(
        &self,
        task: &TaskRecord,
        _ctx: &ExecutionContext,
        guard: &mut LoopGuard,
    ) -> Result<Value, YeomanError> {
        let Some(gateway) = &self.gateway else {
            return Err(YeomanError::new(
                ErrorKind::PreconditionFailed,
                "no AI provider configured",
            ));
        };

        let text = task
            .input
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or(&task.description)
            .to_string();

        let mut messages = Vec::new();
        let system = self
            .soul
            .prompt_preview()
            .await
            .map_err(YeomanError::from)?;
        if !system.is_empty() {
            messages.push(ChatMessage::system(system));
        }

        // Self-repair: a stuck verdict from a prior turn becomes an extra
        // steering turn, then the guard restarts.
        if let Some(reason) = guard.check_stuck() {
            messages.push(ChatMessage::system(build_recovery_prompt(
                &reason,
                guard.last_call(),
            )));
            guard.reset();
        }

        messages.push(ChatMessage::user(text));

        let response = gateway
            .chat(&ChatRequest::new(messages))
            .await
            .map_err(YeomanError::from)?;

        Ok(json!({
            "response": response.content,
            "model": response.model,
            "inputTokens": response.usage.input_tokens,
            "outputTokens": response.usage.output_tokens,
        }))
    }
}

impl std::fmt::Debug for AiQueryHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiQueryHandler")
            .field("has_gateway", &self.gateway.is_some())
            .finish_non_exhaustive()
    }
}

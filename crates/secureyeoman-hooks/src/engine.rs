//! In-process hook registration and dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use secureyeoman_core::{Timestamp, YeomanError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{HookError, HookResult};
use crate::point::HookPoint;
use crate::webhook::WebhookDispatcher;
use uuid::Uuid;

/// Opaque registration id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HookId(pub Uuid);

impl HookId {
    /// Create a new id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for HookId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for HookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A hook's authority over the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookSemantics {
    /// Read-only.
    Observe,
    /// May replace the payload for later handlers.
    Transform,
    /// May abort the pipeline.
    Veto,
}

/// What a handler returns.
#[derive(Debug, Clone, Default)]
pub struct HandlerVerdict {
    /// Replacement payload (honored only for `transform` semantics).
    pub transformed: Option<Value>,
    /// Abort the pipeline (honored only for `veto` semantics).
    pub vetoed: bool,
}

impl HandlerVerdict {
    /// No-op verdict.
    #[must_use]
    pub fn pass() -> Self {
        Self::default()
    }

    /// Replace the payload.
    #[must_use]
    pub fn transform(value: Value) -> Self {
        Self {
            transformed: Some(value),
            vetoed: false,
        }
    }

    /// Abort the pipeline.
    #[must_use]
    pub fn veto() -> Self {
        Self {
            transformed: None,
            vetoed: true,
        }
    }
}

/// Context passed to every handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookContext {
    /// The firing point.
    pub point: HookPoint,
    /// Short event tag.
    pub event: String,
    /// Payload (handlers see the possibly-transformed version).
    pub data: Value,
    /// When the event fired.
    pub timestamp: Timestamp,
}

impl HookContext {
    /// Create a context.
    #[must_use]
    pub fn new(point: HookPoint, event: impl Into<String>, data: Value) -> Self {
        Self {
            point,
            event: event.into(),
            data,
            timestamp: Timestamp::now(),
        }
    }
}

/// An in-process hook handler.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Handle the event. `current` is the payload after earlier transforms.
    async fn call(&self, ctx: &HookContext, current: &Value)
    -> Result<HandlerVerdict, YeomanError>;
}

/// Wrap a closure as a handler.
pub struct FnHookHandler<F>(pub F);

#[async_trait]
impl<F> HookHandler for FnHookHandler<F>
where
    F: Fn(&HookContext, &Value) -> Result<HandlerVerdict, YeomanError> + Send + Sync,
{
    async fn call(
        &self,
        ctx: &HookContext,
        current: &Value,
    ) -> Result<HandlerVerdict, YeomanError> {
        (self.0)(ctx, current)
    }
}

/// A registered hook.
#[derive(Clone)]
pub struct HookRegistration {
    /// Registration id.
    pub id: HookId,
    /// Point the handler fires at.
    pub point: HookPoint,
    /// Authority.
    pub semantics: HookSemantics,
    /// Lower runs first.
    pub priority: i32,
    /// Owning extension, if any.
    pub extension_id: Option<String>,
    handler: Arc<dyn HookHandler>,
}

impl std::fmt::Debug for HookRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistration")
            .field("id", &self.id)
            .field("point", &self.point)
            .field("semantics", &self.semantics)
            .field("priority", &self.priority)
            .field("extension_id", &self.extension_id)
            .finish_non_exhaustive()
    }
}

/// Result of an emit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmitResult {
    /// A veto handler aborted the pipeline.
    pub vetoed: bool,
    /// Final payload, when some transform changed it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformed: Option<Value>,
    /// Handler errors (hook id plus message). Errors never abort dispatch.
    pub errors: Vec<String>,
}

/// The hook engine.
pub struct HookEngine {
    hooks: RwLock<HashMap<HookPoint, Vec<HookRegistration>>>,
    webhooks: Arc<WebhookDispatcher>,
}

impl HookEngine {
    /// Create an engine with the given outbound dispatcher.
    #[must_use]
    pub fn new(webhooks: Arc<WebhookDispatcher>) -> Self {
        Self {
            hooks: RwLock::new(HashMap::new()),
            webhooks,
        }
    }

    /// Register a handler. Returns the registration id.
    pub async fn register_hook(
        &self,
        point: HookPoint,
        handler: Arc<dyn HookHandler>,
        semantics: HookSemantics,
        priority: i32,
        extension_id: Option<String>,
    ) -> HookId {
        let registration = HookRegistration {
            id: HookId::new(),
            point,
            semantics,
            priority,
            extension_id,
            handler,
        };
        let id = registration.id;
        let mut hooks = self.hooks.write().await;
        hooks.entry(point).or_default().push(registration);
        debug!(point = %point, %id, "Hook registered");
        id
    }

    /// Remove a registration.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::NotFound`] if the id is unknown.
    pub async fn remove_hook(&self, id: HookId) -> HookResult<()> {
        let mut hooks = self.hooks.write().await;
        for registrations in hooks.values_mut() {
            if let Some(pos) = registrations.iter().position(|r| r.id == id) {
                registrations.remove(pos);
                return Ok(());
            }
        }
        Err(HookError::NotFound(id.to_string()))
    }

    /// Remove every registration owned by an extension. Returns the count.
    pub async fn remove_extension_hooks(&self, extension_id: &str) -> usize {
        let mut hooks = self.hooks.write().await;
        let mut removed = 0usize;
        for registrations in hooks.values_mut() {
            let before = registrations.len();
            registrations.retain(|r| r.extension_id.as_deref() != Some(extension_id));
            removed = removed.saturating_add(before.saturating_sub(registrations.len()));
        }
        removed
    }

    /// Registrations for a point (diagnostics and tests).
    pub async fn registrations(&self, point: HookPoint) -> Vec<HookRegistration> {
        self.hooks
            .read()
            .await
            .get(&point)
            .cloned()
            .unwrap_or_default()
    }

    /// Fire a hook point.
    ///
    /// Handlers run ascending by priority. Transform handlers thread the
    /// payload; a veto stops the loop. Handler errors are collected, never
    /// propagated. Outbound webhooks fire after the loop either way.
    pub async fn emit(&self, ctx: HookContext) -> EmitResult {
        let mut handlers = self.registrations(ctx.point).await;
        handlers.sort_by_key(|r| r.priority);

        let mut current = ctx.data.clone();
        let mut result = EmitResult::default();

        for registration in &handlers {
            match registration.handler.call(&ctx, &current).await {
                Ok(verdict) => match registration.semantics {
                    HookSemantics::Observe => {},
                    HookSemantics::Transform => {
                        if let Some(transformed) = verdict.transformed {
                            current = transformed;
                            result.transformed = Some(current.clone());
                        }
                    },
                    HookSemantics::Veto => {
                        if verdict.vetoed {
                            result.vetoed = true;
                            debug!(point = %ctx.point, hook = %registration.id, "Hook vetoed");
                            break;
                        }
                    },
                },
                Err(err) => {
                    warn!(point = %ctx.point, hook = %registration.id, error = %err, "Hook handler failed");
                    result.errors.push(format!("{}: {err}", registration.id));
                },
            }
        }

        // Outbound webhooks see the final payload, veto or not.
        let payload = result.transformed.clone().unwrap_or(current);
        self.webhooks.dispatch(ctx.point, &ctx.event, payload).await;

        result
    }
}

impl std::fmt::Debug for HookEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookEngine").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::WebhookStore;
    use secureyeoman_storage::MemoryKvStore;
    use serde_json::json;

    async fn make_engine() -> HookEngine {
        let store = WebhookStore::new(Arc::new(MemoryKvStore::new())).unwrap();
        // Webhooks globally disabled in unit tests.
        let dispatcher = Arc::new(WebhookDispatcher::new(Arc::new(store), false, 3_000));
        HookEngine::new(dispatcher)
    }

    fn observe_handler() -> Arc<dyn HookHandler> {
        Arc::new(FnHookHandler(|_ctx: &HookContext, _cur: &Value| {
            Ok(HandlerVerdict::pass())
        }))
    }

    #[tokio::test]
    async fn test_priority_orders_transforms() {
        let engine = make_engine().await;

        // Registered out of order; priority must decide.
        engine
            .register_hook(
                HookPoint::MessageInbound,
                Arc::new(FnHookHandler(|_ctx: &HookContext, cur: &Value| {
                    let mut v = cur.clone();
                    v["steps"] = json!(format!("{}b", v["steps"].as_str().unwrap_or("")));
                    Ok(HandlerVerdict::transform(v))
                })),
                HookSemantics::Transform,
                20,
                None,
            )
            .await;
        engine
            .register_hook(
                HookPoint::MessageInbound,
                Arc::new(FnHookHandler(|_ctx: &HookContext, cur: &Value| {
                    let mut v = cur.clone();
                    v["steps"] = json!(format!("{}a", v["steps"].as_str().unwrap_or("")));
                    Ok(HandlerVerdict::transform(v))
                })),
                HookSemantics::Transform,
                10,
                None,
            )
            .await;

        let result = engine
            .emit(HookContext::new(
                HookPoint::MessageInbound,
                "message.inbound",
                json!({"steps": ""}),
            ))
            .await;

        assert_eq!(result.transformed.unwrap()["steps"], "ab");
        assert!(!result.vetoed);
    }

    #[tokio::test]
    async fn test_veto_stops_later_handlers() {
        let engine = make_engine().await;
        engine
            .register_hook(
                HookPoint::AiRequest,
                Arc::new(FnHookHandler(|_ctx: &HookContext, _cur: &Value| {
                    Ok(HandlerVerdict::veto())
                })),
                HookSemantics::Veto,
                1,
                None,
            )
            .await;
        engine
            .register_hook(
                HookPoint::AiRequest,
                Arc::new(FnHookHandler(|_ctx: &HookContext, _cur: &Value| {
                    panic!("must not run after veto")
                })),
                HookSemantics::Observe,
                2,
                None,
            )
            .await;

        let result = engine
            .emit(HookContext::new(HookPoint::AiRequest, "ai.request", json!({})))
            .await;
        assert!(result.vetoed);
    }

    #[tokio::test]
    async fn test_observe_cannot_transform() {
        let engine = make_engine().await;
        engine
            .register_hook(
                HookPoint::TaskCompleted,
                Arc::new(FnHookHandler(|_ctx: &HookContext, _cur: &Value| {
                    Ok(HandlerVerdict::transform(json!({"hijacked": true})))
                })),
                HookSemantics::Observe,
                1,
                None,
            )
            .await;

        let result = engine
            .emit(HookContext::new(
                HookPoint::TaskCompleted,
                "task.completed",
                json!({"ok": true}),
            ))
            .await;
        assert!(result.transformed.is_none());
    }

    #[tokio::test]
    async fn test_handler_error_does_not_abort() {
        let engine = make_engine().await;
        engine
            .register_hook(
                HookPoint::MemoryCreated,
                Arc::new(FnHookHandler(|_ctx: &HookContext, _cur: &Value| {
                    Err(YeomanError::internal("handler blew up"))
                })),
                HookSemantics::Observe,
                1,
                None,
            )
            .await;
        engine
            .register_hook(
                HookPoint::MemoryCreated,
                Arc::new(FnHookHandler(|_ctx: &HookContext, cur: &Value| {
                    let mut v = cur.clone();
                    v["second_ran"] = json!(true);
                    Ok(HandlerVerdict::transform(v))
                })),
                HookSemantics::Transform,
                2,
                None,
            )
            .await;

        let result = engine
            .emit(HookContext::new(
                HookPoint::MemoryCreated,
                "memory.created",
                json!({}),
            ))
            .await;
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.transformed.unwrap()["second_ran"], true);
    }

    #[tokio::test]
    async fn test_register_then_remove_leaves_table_empty() {
        let engine = make_engine().await;
        let id = engine
            .register_hook(
                HookPoint::AgentAction,
                observe_handler(),
                HookSemantics::Observe,
                100,
                Some("ext-1".into()),
            )
            .await;
        assert_eq!(engine.registrations(HookPoint::AgentAction).await.len(), 1);

        engine.remove_hook(id).await.unwrap();
        assert!(engine.registrations(HookPoint::AgentAction).await.is_empty());
        assert!(engine.remove_hook(id).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_extension_hooks() {
        let engine = make_engine().await;
        for point in [HookPoint::TaskSubmitted, HookPoint::TaskCompleted] {
            engine
                .register_hook(
                    point,
                    observe_handler(),
                    HookSemantics::Observe,
                    100,
                    Some("ext-sweep".into()),
                )
                .await;
        }
        engine
            .register_hook(
                HookPoint::TaskSubmitted,
                observe_handler(),
                HookSemantics::Observe,
                100,
                Some("other-ext".into()),
            )
            .await;

        assert_eq!(engine.remove_extension_hooks("ext-sweep").await, 2);
        assert_eq!(engine.registrations(HookPoint::TaskSubmitted).await.len(), 1);
        assert!(engine.registrations(HookPoint::TaskCompleted).await.is_empty());
    }
}

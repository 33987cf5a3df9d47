//! The task executor.

use std::sync::Arc;

use async_trait::async_trait;
use secureyeoman_audit::{AuditChain, AuditEvent, AuditLevel};
use secureyeoman_core::{TaskId, Timestamp, YeomanError};
use secureyeoman_storage::{KvStore, ScopedKvStore};
use serde_json::{Value, json};
use tracing::{debug, error, info};

use crate::error::{TaskError, TaskResult};
use crate::guard::LoopGuard;
use crate::types::{TaskDefinition, TaskRecord, TaskStatus};

const NS_TASKS: &str = "tasks:records";

/// Who a task runs on behalf of.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Principal identifier (`admin`, `telegram:12345`, …).
    pub user_id: String,
    /// Role name the task runs as.
    pub role: String,
    /// Correlates the task with its trigger (inbound message id, …).
    pub correlation_id: Option<String>,
}

impl ExecutionContext {
    /// A context acting as the given principal with the operator role.
    #[must_use]
    pub fn operator(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: "operator".into(),
            correlation_id: None,
        }
    }

    /// Attach a correlation id.
    #[must_use]
    pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// Executes a task to completion. The handler drives model turns and tool
/// calls, recording each call on the guard and honoring its stuck checks.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Run the task, returning its result value.
    async fn handle(
        &self,
        task: &TaskRecord,
        ctx: &ExecutionContext,
        guard: &mut LoopGuard,
    ) -> Result<Value, YeomanError>;
}

/// The task executor: persistence, auditing, and dispatch.
pub struct TaskExecutor {
    store: ScopedKvStore,
    audit: Arc<AuditChain>,
    handler: Arc<dyn TaskHandler>,
}

impl TaskExecutor {
    /// Wire an executor.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace binding fails.
    pub fn new(
        store: Arc<dyn KvStore>,
        audit: Arc<AuditChain>,
        handler: Arc<dyn TaskHandler>,
    ) -> TaskResult<Self> {
        let store = ScopedKvStore::new(store, NS_TASKS)
            .map_err(|e| TaskError::Storage(e.to_string()))?;
        Ok(Self {
            store,
            audit,
            handler,
        })
    }

    async fn persist(&self, record: &TaskRecord) -> TaskResult<()> {
        self.store
            .set_json(&record.id.to_string(), record)
            .await
            .map_err(|e| TaskError::Storage(e.to_string()))
    }

    /// Submit a task: persist it queued, record `task_submitted`, and
    /// schedule background execution.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence or the audit record fails.
    pub async fn submit(
        self: &Arc<Self>,
        def: TaskDefinition,
        ctx: ExecutionContext,
    ) -> TaskResult<TaskRecord> {
        let record = self.accept(def, &ctx).await?;
        let executor = Arc::clone(self);
        let id = record.id;
        tokio::spawn(async move {
            if let Err(e) = executor.execute(id, &ctx).await {
                error!(task = %id, error = %e, "Task execution failed");
            }
        });
        Ok(record)
    }

    /// Submit a task and run it to completion inline (fast paths that want
    /// the response synchronously).
    ///
    /// # Errors
    ///
    /// Returns an error if persistence, auditing, or execution plumbing
    /// fails; handler failures land in the record's `error` field instead.
    pub async fn submit_and_wait(
        self: &Arc<Self>,
        def: TaskDefinition,
        ctx: ExecutionContext,
    ) -> TaskResult<TaskRecord> {
        let record = self.accept(def, &ctx).await?;
        self.execute(record.id, &ctx).await?;
        self.get(record.id).await
    }

    async fn accept(&self, def: TaskDefinition, ctx: &ExecutionContext) -> TaskResult<TaskRecord> {
        let record = TaskRecord::from_definition(def);
        self.persist(&record).await?;

        let mut event = AuditEvent::new("task_submitted", AuditLevel::Info, "task submitted")
            .with_user(&ctx.user_id)
            .with_metadata(json!({
                "taskId": record.id.to_string(),
                "taskType": record.task_type,
                "name": record.name,
            }));
        if let Some(correlation_id) = &ctx.correlation_id {
            event = event.with_correlation(correlation_id.clone());
        }
        self.audit.record(event).await?;

        debug!(task = %record.id, task_type = %record.task_type, "Task accepted");
        Ok(record)
    }

    async fn execute(&self, id: TaskId, ctx: &ExecutionContext) -> TaskResult<()> {
        let mut record = self.get(id).await?;
        if record.status != TaskStatus::Queued {
            return Err(TaskError::InvalidState(format!(
                "task {id} is {:?}, not queued",
                record.status
            )));
        }

        record.status = TaskStatus::Running;
        record.updated_at = Timestamp::now();
        self.persist(&record).await?;

        let mut guard = LoopGuard::default();
        match self.handler.handle(&record, ctx, &mut guard).await {
            Ok(result) => {
                record.status = TaskStatus::Completed;
                record.result = Some(result);
                info!(task = %id, "Task completed");
            },
            Err(err) => {
                record.status = TaskStatus::Failed;
                record.error = Some(err.to_string());
                error!(task = %id, kind = %err.kind, "Task failed");
            },
        }
        record.updated_at = Timestamp::now();
        self.persist(&record).await
    }

    /// Fetch a task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] if the id is unknown.
    pub async fn get(&self, id: TaskId) -> TaskResult<TaskRecord> {
        self.store
            .get_json(&id.to_string())
            .await
            .map_err(|e| TaskError::Storage(e.to_string()))?
            .ok_or_else(|| TaskError::NotFound(id.to_string()))
    }

    /// List all tasks, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn list(&self) -> TaskResult<Vec<TaskRecord>> {
        let keys = self
            .store
            .list_keys()
            .await
            .map_err(|e| TaskError::Storage(e.to_string()))?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = self
                .store
                .get_json::<TaskRecord>(&key)
                .await
                .map_err(|e| TaskError::Storage(e.to_string()))?
            {
                out.push(record);
            }
        }
        out.sort_by_key(|r| r.id);
        Ok(out)
    }

    /// Cancel a queued task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidState`] unless the task is queued.
    pub async fn cancel(&self, id: TaskId) -> TaskResult<TaskRecord> {
        let mut record = self.get(id).await?;
        if record.status != TaskStatus::Queued {
            return Err(TaskError::InvalidState(format!(
                "only queued tasks can be cancelled; task is {:?}",
                record.status
            )));
        }
        record.status = TaskStatus::Cancelled;
        record.updated_at = Timestamp::now();
        self.persist(&record).await?;
        Ok(record)
    }
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secureyeoman_audit::AuditQuery;
    use secureyeoman_crypto::SigningKey;
    use secureyeoman_storage::MemoryKvStore;

    struct EchoHandler;

    #[async_trait]
    impl TaskHandler for EchoHandler {
        async fn handle(
            &self,
            task: &TaskRecord,
            _ctx: &ExecutionContext,
            _guard: &mut LoopGuard,
        ) -> Result<Value, YeomanError> {
            Ok(json!({"echo": task.input}))
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl TaskHandler for FailingHandler {
        async fn handle(
            &self,
            _task: &TaskRecord,
            _ctx: &ExecutionContext,
            _guard: &mut LoopGuard,
        ) -> Result<Value, YeomanError> {
            Err(YeomanError::internal("boom"))
        }
    }

    async fn make_executor(handler: Arc<dyn TaskHandler>) -> Arc<TaskExecutor> {
        let audit = Arc::new(
            AuditChain::in_memory(SigningKey::new(vec![4u8; 32]).unwrap())
                .await
                .unwrap(),
        );
        Arc::new(
            TaskExecutor::new(Arc::new(MemoryKvStore::new()), audit, handler).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_submit_and_wait_completes() {
        let executor = make_executor(Arc::new(EchoHandler)).await;
        let record = executor
            .submit_and_wait(
                TaskDefinition::new("QUERY", "echo", json!({"text": "hello"})),
                ExecutionContext::operator("tester"),
            )
            .await
            .unwrap();

        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.result.unwrap()["echo"]["text"], "hello");
    }

    #[tokio::test]
    async fn test_submission_is_audited() {
        let executor = make_executor(Arc::new(EchoHandler)).await;
        executor
            .submit_and_wait(
                TaskDefinition::new("QUERY", "echo", json!({})),
                ExecutionContext::operator("tester").with_correlation("msg-1"),
            )
            .await
            .unwrap();

        let entries = executor
            .audit
            .query(&AuditQuery {
                event: Some("task_submitted".into()),
                ..AuditQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].correlation_id.as_deref(), Some("msg-1"));
    }

    #[tokio::test]
    async fn test_handler_failure_lands_in_record() {
        let executor = make_executor(Arc::new(FailingHandler)).await;
        let record = executor
            .submit_and_wait(
                TaskDefinition::new("QUERY", "fail", json!({})),
                ExecutionContext::operator("tester"),
            )
            .await
            .unwrap();

        assert_eq!(record.status, TaskStatus::Failed);
        assert!(record.error.unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_background_submit_reaches_terminal_state() {
        let executor = make_executor(Arc::new(EchoHandler)).await;
        let record = executor
            .submit(
                TaskDefinition::new("QUERY", "bg", json!({})),
                ExecutionContext::operator("tester"),
            )
            .await
            .unwrap();

        // Poll until the spawned execution finishes.
        let mut fetched = executor.get(record.id).await.unwrap();
        for _ in 0..50 {
            if fetched.is_terminal() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            fetched = executor.get(record.id).await.unwrap();
        }
        assert_eq!(fetched.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_cancel_only_queued() {
        let executor = make_executor(Arc::new(EchoHandler)).await;
        let record = executor
            .submit_and_wait(
                TaskDefinition::new("QUERY", "done", json!({})),
                ExecutionContext::operator("tester"),
            )
            .await
            .unwrap();
        assert!(matches!(
            executor.cancel(record.id).await,
            Err(TaskError::InvalidState(_))
        ));
    }
}

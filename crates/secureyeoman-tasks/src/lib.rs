//! SecureYeoman Tasks - the task execution pipeline.
//!
//! Tasks are persisted, audited on submission, and executed by an injected
//! handler. Each running task carries a [`LoopGuard`] that detects stuck
//! executions (wall-clock timeout, or the same tool called with identical
//! canonical arguments repeatedly) and builds a recovery prompt the handler
//! injects before the next model turn.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod executor;
mod guard;
mod types;

pub use error::{TaskError, TaskResult};
pub use executor::{ExecutionContext, TaskExecutor, TaskHandler};
pub use guard::{LoopGuard, StuckReason, ToolCallEntry, build_recovery_prompt};
pub use types::{TaskDefinition, TaskRecord, TaskStatus};

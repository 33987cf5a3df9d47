//! Per-task loop guard: stuck detection and recovery prompts.

use secureyeoman_core::{Timestamp, canonical_json_value};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

/// Default wall-clock budget before a task counts as stalled.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Default identical-call tail length that counts as looping.
pub const DEFAULT_REPETITION_THRESHOLD: usize = 2;

/// One recorded tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallEntry {
    /// Tool name.
    pub tool_name: String,
    /// Canonical JSON of the arguments (stable across key ordering).
    pub tool_args: String,
    /// Outcome string (result summary or error).
    pub outcome: String,
    /// When the call happened.
    pub called_at: Timestamp,
}

/// Why a task is considered stuck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum StuckReason {
    /// Wall-clock budget exhausted.
    Timeout {
        /// Detail for the recovery prompt.
        detail: String,
    },
    /// The same tool was called with identical arguments repeatedly.
    Repetition {
        /// Detail for the recovery prompt.
        detail: String,
    },
}

impl StuckReason {
    /// The detail string.
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::Timeout { detail } | Self::Repetition { detail } => detail,
        }
    }
}

/// Tracks one active task's tool-call history and elapsed time.
#[derive(Debug)]
pub struct LoopGuard {
    started_at: Instant,
    history: Vec<ToolCallEntry>,
    timeout_ms: u64,
    repetition_threshold: usize,
}

impl Default for LoopGuard {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_MS, DEFAULT_REPETITION_THRESHOLD)
    }
}

impl LoopGuard {
    /// Create a guard with explicit limits.
    #[must_use]
    pub fn new(timeout_ms: u64, repetition_threshold: usize) -> Self {
        Self {
            started_at: Instant::now(),
            history: Vec::new(),
            timeout_ms,
            repetition_threshold,
        }
    }

    /// Record a tool call. Arguments are canonicalized so semantically
    /// identical calls compare equal regardless of key order; arguments
    /// that cannot be canonicalized (float-bearing) fall back to their
    /// plain JSON form.
    pub fn record_tool_call(&mut self, tool_name: &str, tool_args: &Value, outcome: &str) {
        let canonical = canonical_json_value(tool_args)
            .unwrap_or_else(|_| tool_args.to_string());
        self.history.push(ToolCallEntry {
            tool_name: tool_name.to_string(),
            tool_args: canonical,
            outcome: outcome.to_string(),
            called_at: Timestamp::now(),
        });
    }

    /// The recorded history.
    #[must_use]
    pub fn history(&self) -> &[ToolCallEntry] {
        &self.history
    }

    /// The most recent tool call.
    #[must_use]
    pub fn last_call(&self) -> Option<&ToolCallEntry> {
        self.history.last()
    }

    /// Check whether the task is stuck. Call before each model turn.
    #[must_use]
    pub fn check_stuck(&self) -> Option<StuckReason> {
        let elapsed_ms = u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        if elapsed_ms >= self.timeout_ms {
            return Some(StuckReason::Timeout {
                detail: format!(
                    "task exceeded its {}ms budget ({elapsed_ms}ms elapsed)",
                    self.timeout_ms
                ),
            });
        }

        if self.repetition_threshold > 0 && self.history.len() >= self.repetition_threshold {
            let tail = &self.history[self.history.len() - self.repetition_threshold..];
            let first = &tail[0];
            let identical = tail
                .iter()
                .all(|e| e.tool_name == first.tool_name && e.tool_args == first.tool_args);
            if identical {
                return Some(StuckReason::Repetition {
                    detail: format!(
                        "tool '{}' called {} consecutive times with identical arguments",
                        first.tool_name, self.repetition_threshold
                    ),
                });
            }
        }

        None
    }

    /// Clear history and restart the clock.
    pub fn reset(&mut self) {
        self.history.clear();
        self.started_at = Instant::now();
    }
}

/// Build the recovery prompt injected before the next model turn.
#[must_use]
pub fn build_recovery_prompt(reason: &StuckReason, last_call: Option<&ToolCallEntry>) -> String {
    let state = match reason {
        StuckReason::Timeout { .. } => "stalled",
        StuckReason::Repetition { .. } => "looping",
    };
    let mut prompt = format!("Previous attempt {state}: {}.", reason.detail());
    if let Some(last) = last_call {
        prompt.push_str(&format!(
            " Last tool: {} -> {}.",
            last.tool_name, last.outcome
        ));
    }
    prompt.push_str(" Try a different approach or decompose the problem into smaller steps.");
    prompt
}

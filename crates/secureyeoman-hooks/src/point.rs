//! Enumerated hook points.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where handlers and webhooks may fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    /// Gateway finished startup.
    SystemStartup,
    /// Gateway is shutting down.
    SystemShutdown,
    /// A task was submitted.
    TaskSubmitted,
    /// A task completed.
    TaskCompleted,
    /// A task failed.
    TaskFailed,
    /// A memory was created.
    MemoryCreated,
    /// A deep consolidation run finished.
    MemoryConsolidated,
    /// An inbound platform message arrived.
    MessageInbound,
    /// A response is about to be sent to a platform.
    MessageOutbound,
    /// An AI request is about to be dispatched.
    AiRequest,
    /// An AI response arrived.
    AiResponse,
    /// A security-relevant denial or violation occurred.
    SecurityAlert,
    /// The agent performed an autonomous action.
    AgentAction,
    /// A proactive (self-initiated) trigger fired.
    ProactiveTrigger,
    /// Multimodal output (audio, image) was generated.
    MultimodalGenerated,
    /// A skill was deleted from the soul store.
    SkillDeleted,
}

impl HookPoint {
    /// All points, for discovery endpoints.
    #[must_use]
    pub const fn all() -> &'static [HookPoint] {
        &[
            Self::SystemStartup,
            Self::SystemShutdown,
            Self::TaskSubmitted,
            Self::TaskCompleted,
            Self::TaskFailed,
            Self::MemoryCreated,
            Self::MemoryConsolidated,
            Self::MessageInbound,
            Self::MessageOutbound,
            Self::AiRequest,
            Self::AiResponse,
            Self::SecurityAlert,
            Self::AgentAction,
            Self::ProactiveTrigger,
            Self::MultimodalGenerated,
            Self::SkillDeleted,
        ]
    }

    /// Dotted wire name (`task.submitted`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SystemStartup => "system.startup",
            Self::SystemShutdown => "system.shutdown",
            Self::TaskSubmitted => "task.submitted",
            Self::TaskCompleted => "task.completed",
            Self::TaskFailed => "task.failed",
            Self::MemoryCreated => "memory.created",
            Self::MemoryConsolidated => "memory.consolidated",
            Self::MessageInbound => "message.inbound",
            Self::MessageOutbound => "message.outbound",
            Self::AiRequest => "ai.request",
            Self::AiResponse => "ai.response",
            Self::SecurityAlert => "security.alert",
            Self::AgentAction => "agent.action",
            Self::ProactiveTrigger => "proactive.trigger",
            Self::MultimodalGenerated => "multimodal.generated",
            Self::SkillDeleted => "skill.deleted",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HookPoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown hook point: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_points() {
        for point in HookPoint::all() {
            let parsed: HookPoint = point.as_str().parse().unwrap();
            assert_eq!(parsed, *point);
        }
    }

    #[test]
    fn test_unknown_point_rejected() {
        assert!("no.such.point".parse::<HookPoint>().is_err());
    }
}

//! Prelude module - commonly used types for convenient import.

pub use crate::claude::ClaudeProvider;
pub use crate::cost::{CostCalculator, ModelPricing};
pub use crate::error::{AiError, AiResult};
pub use crate::gateway::AiGateway;
pub use crate::openai_compat::OpenAiCompatProvider;
pub use crate::optimizer::{CostOptimizer, Recommendation, RecommendationKind};
pub use crate::provider::{AiProvider, ProviderConfig};
pub use crate::retry::RetryConfig;
pub use crate::router::{
    CheaperAlternative, Complexity, ModelCandidate, ModelRouter, ModelTier, RouteDecision,
    TaskProfile, TaskType,
};
pub use crate::types::{
    ChatMessage, ChatRequest, ChatResponse, ChatRole, FinishReason, TokenUsage, ToolDefinition,
};
pub use crate::usage::{LimitCheck, UsageRecord, UsageSummary, UsageTracker};

//! SecureYeoman AI - provider-agnostic model gateway.
//!
//! This crate provides:
//! - The [`AiProvider`] trait with Claude and OpenAI-compatible
//!   implementations (the latter covers DeepSeek, Mistral, Grok, and
//!   Ollama via a base URL)
//! - The [`AiGateway`]: provider selection, daily budget enforcement,
//!   usage/cost accounting, and retry with exponential backoff
//! - The [`ModelRouter`]: task-complexity-based tier selection picking the
//!   cheapest qualifying model
//! - The [`CostOptimizer`]: recommendations derived from current usage

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod claude;
mod cost;
mod error;
mod gateway;
mod openai_compat;
mod optimizer;
mod provider;
mod retry;
mod router;
mod types;
mod usage;

pub use claude::ClaudeProvider;
pub use cost::{CostCalculator, ModelPricing};
pub use error::{AiError, AiResult};
pub use gateway::AiGateway;
pub use openai_compat::OpenAiCompatProvider;
pub use optimizer::{CostOptimizer, Recommendation, RecommendationKind};
pub use provider::{AiProvider, ProviderConfig};
pub use retry::RetryConfig;
pub use router::{
    CheaperAlternative, Complexity, ModelCandidate, ModelRouter, ModelTier, RouteDecision,
    TaskProfile, TaskType, default_catalog,
};
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, ChatRole, FinishReason, TokenUsage, ToolDefinition,
};
pub use usage::{LimitCheck, UsageRecord, UsageSummary, UsageTracker};

//! Task-complexity-based model routing.
//!
//! The router profiles a prompt (task type by keyword, complexity from
//! length and compound-sentence signals), maps the profile to a capability
//! tier, and picks the cheapest available model in that tier. When the
//! mapped tier has no available model the router degrades one tier at a
//! time rather than failing; only an empty candidate set yields no route.

use serde::{Deserialize, Serialize};

use crate::cost::CostCalculator;

/// Detected task category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Condense text.
    Summarize,
    /// Assign labels.
    Classify,
    /// Pull structured data out.
    Extract,
    /// Question answering.
    Qa,
    /// Write or modify code.
    Code,
    /// Multi-step reasoning.
    Reason,
    /// Planning and decomposition.
    Plan,
    /// Anything else.
    General,
}

/// Detected complexity band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    /// Short, single-clause request.
    Simple,
    /// Medium length or a few clauses.
    Moderate,
    /// Long or heavily compound.
    Complex,
}

/// Capability band a model is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Cheap and quick.
    Fast,
    /// Balanced.
    Capable,
    /// Frontier.
    Advanced,
}

impl ModelTier {
    fn downgrade(self) -> Option<Self> {
        match self {
            Self::Advanced => Some(Self::Capable),
            Self::Capable => Some(Self::Fast),
            Self::Fast => None,
        }
    }
}

/// The profile computed for a routing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskProfile {
    /// Detected task type.
    pub task_type: TaskType,
    /// Detected complexity.
    pub complexity: Complexity,
    /// Estimated input tokens (`len / 4`).
    pub estimated_input_tokens: u64,
}

/// A model the router may select.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCandidate {
    /// Provider name.
    pub provider: String,
    /// Model name.
    pub model: String,
    /// Assigned tier.
    pub tier: ModelTier,
}

impl ModelCandidate {
    /// Create a candidate.
    #[must_use]
    pub fn new(provider: impl Into<String>, model: impl Into<String>, tier: ModelTier) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            tier,
        }
    }
}

/// The default model catalog, tier assignments included.
#[must_use]
pub fn default_catalog() -> Vec<ModelCandidate> {
    vec![
        ModelCandidate::new("anthropic", "claude-haiku-3-5-20241022", ModelTier::Fast),
        ModelCandidate::new("anthropic", "claude-sonnet-4-20250514", ModelTier::Capable),
        ModelCandidate::new("anthropic", "claude-opus-4-1-20250805", ModelTier::Advanced),
        ModelCandidate::new("openai", "gpt-4o-mini", ModelTier::Fast),
        ModelCandidate::new("openai", "gpt-4o", ModelTier::Capable),
        ModelCandidate::new("deepseek", "deepseek-chat", ModelTier::Fast),
        ModelCandidate::new("mistral", "mistral-small-latest", ModelTier::Fast),
        ModelCandidate::new("mistral", "mistral-large-latest", ModelTier::Capable),
        ModelCandidate::new("grok", "grok-2-latest", ModelTier::Capable),
        ModelCandidate::new("ollama", "llama3.1", ModelTier::Fast),
    ]
}

/// A cheaper option the caller may prefer over the selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheaperAlternative {
    /// Provider name.
    pub provider: String,
    /// Model name.
    pub model: String,
    /// Estimated cost at the requested budget.
    pub estimated_cost_usd: f64,
}

/// The routing decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    /// Selected provider, if any model qualified.
    pub selected_provider: Option<String>,
    /// Selected model, if any qualified.
    pub selected_model: Option<String>,
    /// Tier the selection came from.
    pub tier: ModelTier,
    /// Confidence in the selection, `[0, 1]`.
    pub confidence: f64,
    /// The computed task profile.
    pub task_profile: TaskProfile,
    /// Estimated cost of the selection at the requested budget.
    pub estimated_cost_usd: f64,
    /// A meaningfully cheaper allowed model, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cheaper_alternative: Option<CheaperAlternative>,
}

/// The model router.
#[derive(Debug, Clone)]
pub struct ModelRouter {
    catalog: Vec<ModelCandidate>,
    costs: CostCalculator,
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self::new(default_catalog(), CostCalculator::new())
    }
}

impl ModelRouter {
    /// Create a router over an explicit catalog (availability already
    /// filtered by configured credentials).
    #[must_use]
    pub fn new(catalog: Vec<ModelCandidate>, costs: CostCalculator) -> Self {
        Self { catalog, costs }
    }

    /// Profile a prompt.
    #[must_use]
    pub fn profile(prompt: &str, context: Option<&str>) -> TaskProfile {
        let combined_len = prompt.len().saturating_add(context.map_or(0, str::len));
        let estimated_input_tokens = (combined_len / 4) as u64;
        let lower = prompt.to_lowercase();

        let task_type = if contains_any(&lower, &["summarize", "summary", "tl;dr", "condense"]) {
            TaskType::Summarize
        } else if contains_any(&lower, &["classify", "categorize", "label"]) {
            TaskType::Classify
        } else if contains_any(&lower, &["extract", "pull out", "parse out"]) {
            TaskType::Extract
        } else if contains_any(&lower, &["implement", "refactor", "debug", "code", "function", "algorithm"])
        {
            TaskType::Code
        } else if contains_any(&lower, &["plan", "roadmap", "break down", "decompose"]) {
            TaskType::Plan
        } else if contains_any(&lower, &["reason", "prove", "derive", "think through"]) {
            TaskType::Reason
        } else if lower.contains('?')
            || contains_any(&lower, &["what ", "why ", "how ", "when ", "who "])
        {
            TaskType::Qa
        } else {
            TaskType::General
        };

        // Compound-sentence signals: connectives and clause separators.
        let compound_signals = ["; ", " and ", " then ", " while ", " with ", " about "]
            .iter()
            .map(|s| lower.matches(s).count())
            .sum::<usize>();

        let complexity = if prompt.len() > 400 || compound_signals >= 4 {
            Complexity::Complex
        } else if prompt.len() > 120 || compound_signals >= 2 {
            Complexity::Moderate
        } else {
            Complexity::Simple
        };

        TaskProfile {
            task_type,
            complexity,
            estimated_input_tokens,
        }
    }

    fn tier_for(profile: &TaskProfile) -> ModelTier {
        use Complexity::{Complex, Moderate, Simple};
        use TaskType::{Classify, Code, Extract, General, Plan, Qa, Reason, Summarize};

        match (profile.task_type, profile.complexity) {
            // Mechanical transforms stay fast unless genuinely complex.
            (Summarize | Classify | Extract, Simple | Moderate) => ModelTier::Fast,
            (Summarize | Classify | Extract, Complex) => ModelTier::Capable,
            (Qa | General, Simple) => ModelTier::Fast,
            (Qa | General, Moderate) => ModelTier::Capable,
            (Qa | General, Complex) => ModelTier::Capable,
            (Code | Plan, Simple) => ModelTier::Capable,
            (Code | Plan, Moderate) => ModelTier::Capable,
            (Code | Plan, Complex) => ModelTier::Advanced,
            (Reason, Simple | Moderate) => ModelTier::Capable,
            (Reason, Complex) => ModelTier::Advanced,
        }
    }

    fn estimate_cost(&self, candidate: &ModelCandidate, input_tokens: u64, budget: u64) -> f64 {
        self.costs
            .cost_usd(&candidate.provider, &candidate.model, input_tokens, budget)
    }

    /// Route a prompt to a model.
    ///
    /// `allowed_models` intersects the catalog when non-empty. `token_budget`
    /// is the output allowance used for cost estimation.
    #[must_use]
    pub fn route(
        &self,
        prompt: &str,
        context: Option<&str>,
        token_budget: u64,
        allowed_models: &[String],
    ) -> RouteDecision {
        let profile = Self::profile(prompt, context);
        let target_tier = Self::tier_for(&profile);

        let allowed: Vec<&ModelCandidate> = self
            .catalog
            .iter()
            .filter(|c| allowed_models.is_empty() || allowed_models.contains(&c.model))
            .collect();

        if allowed.is_empty() {
            return RouteDecision {
                selected_provider: None,
                selected_model: None,
                tier: target_tier,
                confidence: 0.0,
                task_profile: profile,
                estimated_cost_usd: 0.0,
                cheaper_alternative: None,
            };
        }

        // Walk down from the target tier until a candidate exists.
        let mut tier = target_tier;
        let mut confidence: f64 = 0.9;
        let selection: Option<&ModelCandidate> = loop {
            let mut in_tier: Vec<&ModelCandidate> = allowed
                .iter()
                .copied()
                .filter(|c| c.tier == tier)
                .collect();
            if !in_tier.is_empty() {
                in_tier.sort_by(|a, b| {
                    let cost_a =
                        self.estimate_cost(a, profile.estimated_input_tokens, token_budget);
                    let cost_b =
                        self.estimate_cost(b, profile.estimated_input_tokens, token_budget);
                    cost_a.total_cmp(&cost_b)
                });
                break Some(in_tier[0]);
            }
            match tier.downgrade() {
                Some(lower) => {
                    tier = lower;
                    confidence -= 0.2;
                },
                None => break None,
            }
        };

        let Some(selected) = selection else {
            return RouteDecision {
                selected_provider: None,
                selected_model: None,
                tier: target_tier,
                confidence: 0.0,
                task_profile: profile,
                estimated_cost_usd: 0.0,
                cheaper_alternative: None,
            };
        };

        let selected_cost =
            self.estimate_cost(selected, profile.estimated_input_tokens, token_budget);

        // Cheapest allowed model overall that is meaningfully cheaper.
        let cheaper_alternative = allowed
            .iter()
            .copied()
            .filter(|c| c.model != selected.model)
            .map(|c| {
                (
                    c,
                    self.estimate_cost(c, profile.estimated_input_tokens, token_budget),
                )
            })
            .filter(|(_, cost)| *cost < selected_cost * 0.8)
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(c, cost)| CheaperAlternative {
                provider: c.provider.clone(),
                model: c.model.clone(),
                estimated_cost_usd: cost,
            });

        RouteDecision {
            selected_provider: Some(selected.provider.clone()),
            selected_model: Some(selected.model.clone()),
            tier,
            confidence: confidence.clamp(0.0, 1.0),
            task_profile: profile,
            estimated_cost_usd: selected_cost,
            cheaper_alternative,
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> ModelRouter {
        ModelRouter::default()
    }

    #[test]
    fn test_summarize_routes_fast_and_cheapest() {
        let decision = router().route("summarize this document", None, 10_000, &[]);
        assert_eq!(decision.tier, ModelTier::Fast);
        assert_eq!(decision.task_profile.task_type, TaskType::Summarize);
        let model = decision.selected_model.unwrap();
        assert!(
            model == "claude-haiku-3-5-20241022"
                || model == "gpt-4o-mini"
                || model == "llama3.1"
                || model == "mistral-small-latest"
        );
        // With the full catalog, the free local model wins on cost.
        assert!(decision.estimated_cost_usd <= 0.01);
    }

    #[test]
    fn test_fast_tier_picks_cheapest_of_allowed() {
        let allowed = vec![
            "claude-haiku-3-5-20241022".to_string(),
            "gpt-4o-mini".to_string(),
        ];
        let decision = router().route("summarize this document", None, 10_000, &allowed);
        assert_eq!(decision.tier, ModelTier::Fast);
        // gpt-4o-mini (0.15/0.6) undercuts haiku (0.8/4).
        assert_eq!(decision.selected_model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn test_complex_code_degrades_to_allowed_tier() {
        let allowed = vec![
            "claude-sonnet-4-20250514".to_string(),
            "claude-haiku-3-5-20241022".to_string(),
        ];
        let decision = router().route(
            "implement a complex algorithm with extensive reasoning about edge cases",
            None,
            50_000,
            &allowed,
        );
        assert_eq!(decision.task_profile.task_type, TaskType::Code);
        assert_eq!(
            decision.selected_model.as_deref(),
            Some("claude-sonnet-4-20250514")
        );
        let alt = decision.cheaper_alternative.unwrap();
        assert_eq!(alt.model, "claude-haiku-3-5-20241022");
    }

    #[test]
    fn test_empty_allowed_intersection_yields_no_route() {
        let decision = router().route(
            "summarize this",
            None,
            1_000,
            &["no-such-model".to_string()],
        );
        assert!(decision.selected_model.is_none());
        assert_eq!(decision.confidence, 0.0);
    }

    #[test]
    fn test_token_estimate() {
        let profile = ModelRouter::profile("abcdefgh", Some("ijkl"));
        assert_eq!(profile.estimated_input_tokens, 3);
    }

    #[test]
    fn test_complexity_bands() {
        assert_eq!(
            ModelRouter::profile("hi", None).complexity,
            Complexity::Simple
        );
        let long = "analyze this and compare it with that and then merge the results while keeping notes about everything; also cross-check and verify each item";
        assert!(ModelRouter::profile(long, None).complexity >= Complexity::Moderate);
    }
}

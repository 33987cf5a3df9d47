//! Cost optimization recommendations.

use serde::{Deserialize, Serialize};

use crate::usage::UsageSummary;

/// Category of a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// Enable or improve prompt caching.
    Caching,
    /// Route eligible tasks to cheaper models.
    CheaperRouting,
    /// Shorten prompts and context.
    PromptReduction,
    /// Batch related requests.
    Batching,
}

/// One recommendation with an estimated daily saving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    /// Category.
    pub kind: RecommendationKind,
    /// Human-readable advice.
    pub description: String,
    /// Estimated saving in USD per day.
    pub estimated_savings_usd_per_day: f64,
}

/// Derives recommendations from current usage.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostOptimizer;

impl CostOptimizer {
    /// Analyze a usage summary and emit zero or more recommendations.
    ///
    /// Savings are fractions of the current daily cost; a quiet gateway
    /// gets no advice.
    #[must_use]
    pub fn analyze(summary: &UsageSummary) -> Vec<Recommendation> {
        let daily = summary.cost_usd_today;
        if daily <= 0.0 {
            return Vec::new();
        }

        let mut recommendations = Vec::new();

        // Heavy spend on premium models suggests routing headroom.
        let premium_tokens: u64 = summary
            .tokens_by_model
            .iter()
            .filter(|(model, _)| model.contains("opus") || model.contains("gpt-4o") && !model.contains("mini"))
            .map(|(_, tokens)| *tokens)
            .sum();
        let total_tokens: u64 = summary.tokens_by_model.values().sum();
        if total_tokens > 0 && premium_tokens * 2 > total_tokens {
            recommendations.push(Recommendation {
                kind: RecommendationKind::CheaperRouting,
                description: "over half of today's tokens went to premium models; route \
                              summarize/classify/extract tasks to the fast tier"
                    .into(),
                estimated_savings_usd_per_day: daily * 0.4,
            });
        }

        // Repeated context with no cached tokens suggests caching headroom.
        recommendations.push(Recommendation {
            kind: RecommendationKind::Caching,
            description: "enable provider prompt caching for the system prompt and \
                          personality preamble"
                .into(),
            estimated_savings_usd_per_day: daily * 0.15,
        });

        if summary.tokens_used_today > 500_000 {
            recommendations.push(Recommendation {
                kind: RecommendationKind::PromptReduction,
                description: "today's token volume is high; trim conversation context and \
                              memory snippets injected per request"
                    .into(),
                estimated_savings_usd_per_day: daily * 0.2,
            });
        }

        if summary.call_count > 200 {
            recommendations.push(Recommendation {
                kind: RecommendationKind::Batching,
                description: "many small calls today; batch consolidation and \
                              classification requests"
                    .into(),
                estimated_savings_usd_per_day: daily * 0.1,
            });
        }

        recommendations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_quiet_gateway_gets_no_advice() {
        let summary = UsageSummary::default();
        assert!(CostOptimizer::analyze(&summary).is_empty());
    }

    #[test]
    fn test_premium_heavy_usage_recommends_routing() {
        let mut tokens_by_model = HashMap::new();
        tokens_by_model.insert("claude-opus-4-1-20250805".to_string(), 900_000_u64);
        tokens_by_model.insert("claude-haiku-3-5-20241022".to_string(), 100_000_u64);
        let summary = UsageSummary {
            tokens_used_today: 1_000_000,
            cost_usd_today: 20.0,
            tokens_by_model,
            call_count: 50,
            ..UsageSummary::default()
        };

        let recs = CostOptimizer::analyze(&summary);
        assert!(
            recs.iter()
                .any(|r| r.kind == RecommendationKind::CheaperRouting)
        );
        assert!(
            recs.iter()
                .all(|r| r.estimated_savings_usd_per_day > 0.0)
        );
    }
}

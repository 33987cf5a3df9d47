//! Static per-model pricing.

use std::collections::HashMap;

/// USD per million tokens, input and output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    /// Input price per million tokens.
    pub input_per_million: f64,
    /// Output price per million tokens.
    pub output_per_million: f64,
}

impl ModelPricing {
    const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    /// Free (local providers).
    pub const FREE: Self = Self::new(0.0, 0.0);
}

/// Static pricing table keyed by `(provider, model)`.
#[derive(Debug, Clone)]
pub struct CostCalculator {
    table: HashMap<(String, String), ModelPricing>,
}

impl Default for CostCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl CostCalculator {
    /// Build the default pricing table.
    #[must_use]
    pub fn new() -> Self {
        let mut table = HashMap::new();
        let mut add = |provider: &str, model: &str, pricing: ModelPricing| {
            table.insert((provider.to_string(), model.to_string()), pricing);
        };

        add(
            "anthropic",
            "claude-haiku-3-5-20241022",
            ModelPricing::new(0.8, 4.0),
        );
        add(
            "anthropic",
            "claude-sonnet-4-20250514",
            ModelPricing::new(3.0, 15.0),
        );
        add(
            "anthropic",
            "claude-opus-4-1-20250805",
            ModelPricing::new(15.0, 75.0),
        );
        add("openai", "gpt-4o-mini", ModelPricing::new(0.15, 0.6));
        add("openai", "gpt-4o", ModelPricing::new(2.5, 10.0));
        add("deepseek", "deepseek-chat", ModelPricing::new(0.27, 1.1));
        add(
            "mistral",
            "mistral-small-latest",
            ModelPricing::new(0.1, 0.3),
        );
        add(
            "mistral",
            "mistral-large-latest",
            ModelPricing::new(2.0, 6.0),
        );
        add("grok", "grok-2-latest", ModelPricing::new(2.0, 10.0));
        add("ollama", "llama3.1", ModelPricing::FREE);

        Self { table }
    }

    /// Override or add a price.
    pub fn set_price(&mut self, provider: &str, model: &str, pricing: ModelPricing) {
        self.table
            .insert((provider.to_string(), model.to_string()), pricing);
    }

    /// Pricing for a model. Unknown models (and local providers) price zero.
    #[must_use]
    pub fn pricing(&self, provider: &str, model: &str) -> ModelPricing {
        if provider == "ollama" {
            return ModelPricing::FREE;
        }
        self.table
            .get(&(provider.to_string(), model.to_string()))
            .copied()
            .unwrap_or(ModelPricing::FREE)
    }

    /// Cost in USD for a token count.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cost_usd(
        &self,
        provider: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> f64 {
        let pricing = self.pricing(provider, model);
        (input_tokens as f64 * pricing.input_per_million
            + output_tokens as f64 * pricing.output_per_million)
            / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_model_pricing() {
        let calc = CostCalculator::new();
        let cost = calc.cost_usd("anthropic", "claude-haiku-3-5-20241022", 1_000_000, 0);
        assert!((cost - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_local_provider_is_free() {
        let calc = CostCalculator::new();
        assert_eq!(calc.cost_usd("ollama", "anything", 1_000_000, 1_000_000), 0.0);
    }

    #[test]
    fn test_override() {
        let mut calc = CostCalculator::new();
        calc.set_price("anthropic", "claude-haiku-3-5-20241022", ModelPricing::new(1.0, 2.0));
        let cost = calc.cost_usd("anthropic", "claude-haiku-3-5-20241022", 1_000_000, 1_000_000);
        assert!((cost - 3.0).abs() < 1e-9);
    }
}

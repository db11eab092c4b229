//! Token cost calculation for chat completion responses.
//!
//! ```ignore
//! let completion: Completion = serde_json::from_str(&response_body)?;
//! let cost = calculate_cost(&completion, &pricing).await?;
//! println!("Total cost: ${:.6}", cost.total);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{PricingInfo, PricingLookup};
use crate::llm::TokenUsage;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CostError {
    #[error("Completion response missing model field")]
    MissingModel,

    #[error("Completion response missing usage field")]
    MissingUsage,
}

/// The parts of a chat completion response needed to price it.
///
/// Deserializes straight from an OpenAI-compatible response body; other
/// fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Completion {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "crate::llm::lenient_usage")]
    pub usage: Option<TokenUsage>,
}

impl Completion {
    pub fn new(model: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            model: Some(model.into()),
            usage: Some(usage),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenCounts {
    pub prompt: u64,
    pub completion: u64,
    pub total: u64,
}

/// Cost of one completion, in USD. Not rounded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub input: f64,
    pub output: f64,
    /// Always `input + output`.
    pub total: f64,
    pub tokens: TokenCounts,
    pub model: String,
}

/// Price a usage record with already-fetched pricing.
pub fn compute_cost(model: &str, usage: &TokenUsage, pricing: &PricingInfo) -> CostBreakdown {
    let input = usage.prompt_tokens as f64 * pricing.prompt;
    let output = usage.completion_tokens as f64 * pricing.completion;

    CostBreakdown {
        input,
        output,
        total: input + output,
        tokens: TokenCounts {
            prompt: usage.prompt_tokens,
            completion: usage.completion_tokens,
            total: usage.total_tokens,
        },
        model: model.to_string(),
    }
}

/// Calculate the cost of a completion, fetching pricing for its model.
///
/// # Errors
/// `MissingModel` / `MissingUsage` when the completion lacks either field.
/// Pricing problems are not errors; they price the call at zero.
pub async fn calculate_cost(
    completion: &Completion,
    pricing: &dyn PricingLookup,
) -> Result<CostBreakdown, CostError> {
    let model = completion
        .model
        .as_deref()
        .filter(|m| !m.is_empty())
        .ok_or(CostError::MissingModel)?;
    let usage = completion.usage.as_ref().ok_or(CostError::MissingUsage)?;

    let rates = pricing.pricing_for(model).await;
    Ok(compute_cost(model, usage, &rates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedPricing {
        rates: PricingInfo,
        calls: AtomicUsize,
    }

    impl FixedPricing {
        fn new(prompt: f64, completion: f64) -> Self {
            Self {
                rates: PricingInfo::new(prompt, completion),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PricingLookup for FixedPricing {
        async fn pricing_for(&self, _model_id: &str) -> PricingInfo {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rates
        }
    }

    #[test]
    fn test_compute_cost_identities() {
        let usage = TokenUsage::new(20, 75);
        let pricing = PricingInfo::new(0.000003, 0.000003);
        let cost = compute_cost("anthropic/claude-3.5-sonnet", &usage, &pricing);

        assert_eq!(cost.input, 20.0 * 0.000003);
        assert_eq!(cost.output, 75.0 * 0.000003);
        assert_eq!(cost.total, cost.input + cost.output);
        assert_eq!(
            cost.tokens,
            TokenCounts {
                prompt: 20,
                completion: 75,
                total: 95
            }
        );
        assert_eq!(cost.model, "anthropic/claude-3.5-sonnet");
    }

    #[test]
    fn test_reported_total_tokens_are_passed_through() {
        // The upstream total is reported as-is, even if inconsistent.
        let usage = TokenUsage {
            prompt_tokens: 1,
            completion_tokens: 2,
            total_tokens: 10,
        };
        let cost = compute_cost("m", &usage, &PricingInfo::zero());
        assert_eq!(cost.tokens.total, 10);
        assert_eq!(cost.total, 0.0);
    }

    #[tokio::test]
    async fn test_calculate_cost_uses_lookup() {
        let pricing = FixedPricing::new(0.000001, 0.000002);
        let completion = Completion::new("openai/gpt-4o-mini", TokenUsage::new(1000, 500));

        let cost = calculate_cost(&completion, &pricing).await.unwrap();
        assert_eq!(cost.input, 1000.0 * 0.000001);
        assert_eq!(cost.output, 500.0 * 0.000002);
        assert_eq!(cost.total, cost.input + cost.output);
        assert_eq!(pricing.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_model_is_rejected_before_lookup() {
        let pricing = FixedPricing::new(1.0, 1.0);

        let no_model = Completion {
            model: None,
            usage: Some(TokenUsage::new(1, 1)),
        };
        assert_eq!(
            calculate_cost(&no_model, &pricing).await.unwrap_err(),
            CostError::MissingModel
        );

        let empty_model = Completion {
            model: Some(String::new()),
            usage: Some(TokenUsage::new(1, 1)),
        };
        assert_eq!(
            calculate_cost(&empty_model, &pricing).await.unwrap_err(),
            CostError::MissingModel
        );
        assert_eq!(pricing.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_usage_is_rejected() {
        let pricing = FixedPricing::new(1.0, 1.0);
        let completion = Completion {
            model: Some("m".to_string()),
            usage: None,
        };
        assert_eq!(
            calculate_cost(&completion, &pricing).await.unwrap_err(),
            CostError::MissingUsage
        );
    }

    #[tokio::test]
    async fn test_completion_from_response_body() {
        let body = r#"{
            "id": "gen-123",
            "model": "anthropic/claude-3.5-sonnet",
            "choices": [{"message": {"role": "assistant", "content": "Hello!"}}],
            "usage": {"prompt_tokens": 20, "completion_tokens": 75, "total_tokens": 95}
        }"#;
        let completion: Completion = serde_json::from_str(body).unwrap();
        let cost = calculate_cost(&completion, &FixedPricing::new(0.000003, 0.000003))
            .await
            .unwrap();
        assert_eq!(cost.tokens.total, 95);

        let json = serde_json::to_value(&cost).unwrap();
        assert_eq!(json["tokens"]["prompt"], 20);
        assert_eq!(json["model"], "anthropic/claude-3.5-sonnet");
    }

    #[tokio::test]
    async fn test_null_usage_counters_price_as_zero() {
        let body = r#"{
            "model": "anthropic/claude-3.5-sonnet",
            "usage": {"prompt_tokens": 10, "completion_tokens": null, "total_tokens": 10}
        }"#;
        let completion: Completion = serde_json::from_str(body).unwrap();
        let cost = calculate_cost(&completion, &FixedPricing::new(0.5, 2.0))
            .await
            .unwrap();
        assert_eq!(cost.tokens.completion, 0);
        assert_eq!(cost.input, 5.0);
        assert_eq!(cost.output, 0.0);
    }

    #[tokio::test]
    async fn test_malformed_usage_is_missing_usage() {
        let body = r#"{"model": "m", "usage": [1, 2, 3]}"#;
        let completion: Completion = serde_json::from_str(body).unwrap();
        assert_eq!(
            calculate_cost(&completion, &FixedPricing::new(1.0, 1.0))
                .await
                .unwrap_err(),
            CostError::MissingUsage
        );
    }
}

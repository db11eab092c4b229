//! Cost module - model pricing and token cost calculation.
//!
//! # Key Concepts
//! - Pricing: fetches OpenRouter per-token prices, zero when unavailable
//! - Calculator: turns a completion's token usage into a USD breakdown

mod calculator;
mod pricing;

pub use calculator::{
    calculate_cost, compute_cost, Completion, CostBreakdown, CostError, TokenCounts,
};
pub use pricing::{ModelPricing, PricingInfo, PricingLookup};

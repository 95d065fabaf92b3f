use crate::models::{ModelPricing, TokenUsageDelta};

/// USD cost of one accumulated usage delta under one resolved pricing.
///
/// Cached input tokens are a subset of input tokens and are billed once at
/// the cache-read rate; reasoning output tokens are a subset of output
/// tokens and carry no separate rate.
pub fn usage_cost(tokens: &TokenUsageDelta, pricing: &ModelPricing) -> f64 {
    let cached_input = tokens.cached_input_tokens.min(tokens.input_tokens);
    let non_cached_input = tokens.input_tokens - cached_input;

    (non_cached_input as f64 / 1_000_000.0) * pricing.input_cost_per_m_token
        + (cached_input as f64 / 1_000_000.0) * pricing.cached_input_cost_per_m_token
        + (tokens.output_tokens as f64 / 1_000_000.0) * pricing.output_cost_per_m_token
}

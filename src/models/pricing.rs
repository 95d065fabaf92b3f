use serde::{Deserialize, Serialize};

/// Which resolution tier matched a model name against the price list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingResolution {
    Direct,
    Alias,
    Fuzzy,
    Fallback,
}

/// Normalized pricing for one model: USD per million tokens.
///
/// Produced by the resolver, immutable, cached per model name for the
/// duration of one report build.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPricing {
    pub input_cost_per_m_token: f64,
    pub cached_input_cost_per_m_token: f64,
    pub output_cost_per_m_token: f64,
    pub resolution: PricingResolution,
    /// The literal price-list key that matched.
    pub pricing_key: String,
}

/// One raw price-list entry as fetched. Costs are per individual token
/// (e.g. 1.25e-6 = $1.25 per million tokens).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawModelPricing {
    pub input_cost_per_token: Option<f64>,
    pub output_cost_per_token: Option<f64>,
    pub cache_read_input_token_cost: Option<f64>,
}

impl RawModelPricing {
    pub fn has_cost_fields(&self) -> bool {
        self.input_cost_per_token.is_some() || self.output_cost_per_token.is_some()
    }
}

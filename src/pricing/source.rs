use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::models::RawModelPricing;
use crate::pricing::PricingError;

const LITELLM_PRICING_URL: &str =
    "https://raw.githubusercontent.com/BerriAI/litellm/main/model_prices_and_context_window.json";

const FETCH_TIMEOUT_SECS: u64 = 15;

pub type PriceList = HashMap<String, RawModelPricing>;

/// Where the raw price list comes from: the live LiteLLM dataset or the
/// snapshot embedded at compile time. Loaded at most once per report build;
/// a failed load fails every resolution in that build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceListSource {
    Online,
    Offline,
}

impl PriceListSource {
    pub async fn load(&self) -> Result<PriceList, PricingError> {
        match self {
            PriceListSource::Online => fetch_from_url().await,
            PriceListSource::Offline => load_snapshot(),
        }
    }
}

async fn fetch_from_url() -> Result<PriceList, PricingError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
        .build()
        .map_err(|e| PricingError::SourceUnavailable {
            reason: e.to_string(),
        })?;

    let response = client.get(LITELLM_PRICING_URL).send().await.map_err(|e| {
        PricingError::SourceUnavailable {
            reason: e.to_string(),
        }
    })?;

    if !response.status().is_success() {
        return Err(PricingError::SourceUnavailable {
            reason: format!("HTTP {}", response.status()),
        });
    }

    let raw: HashMap<String, serde_json::Value> =
        response
            .json()
            .await
            .map_err(|e| PricingError::SourceUnavailable {
                reason: e.to_string(),
            })?;

    let models = parse_raw_entries(raw);
    info!(models = models.len(), "fetched model price list");
    Ok(models)
}

fn load_snapshot() -> Result<PriceList, PricingError> {
    let json = include_str!("codex_snapshot.json");
    let models: PriceList =
        serde_json::from_str(json).map_err(|e| PricingError::SourceUnavailable {
            reason: format!("embedded price snapshot is invalid: {}", e),
        })?;
    debug!(models = models.len(), "loaded embedded price snapshot");
    Ok(models)
}

/// Parse raw JSON entries into typed pricing, dropping entries that fail to
/// deserialize or carry no cost fields at all.
fn parse_raw_entries(raw: HashMap<String, serde_json::Value>) -> PriceList {
    let mut models = HashMap::new();
    for (name, value) in raw {
        if let Ok(pricing) = serde_json::from_value::<RawModelPricing>(value) {
            if pricing.has_cost_fields() {
                models.insert(name, pricing);
            }
        }
    }
    models
}

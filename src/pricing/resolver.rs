use std::collections::HashMap;
use tracing::warn;

use crate::models::{ModelPricing, PricingResolution, RawModelPricing};
use crate::pricing::source::{PriceList, PriceListSource};
use crate::pricing::PricingError;

/// Provider prefixes tried, in order, after the verbatim key.
const PROVIDER_PREFIXES: &[&str] = &["openai/", "azure/", "openrouter/openai/"];

/// Static aliases for model names that drift from their price-list keys.
const MODEL_ALIASES: &[(&str, &str)] = &[
    ("gpt-5-codex", "gpt-5"),
    ("gpt-5.1-codex", "gpt-5.1"),
    ("gpt-5.1-codex-mini", "gpt-5.1"),
    ("codex-mini", "codex-mini-latest"),
];

/// The single pricing capability consumed by every report builder. Any
/// conforming implementation (including fixed-table test doubles) can stand
/// in for the real resolver.
#[allow(async_fn_in_trait)]
pub trait PricingLookup {
    async fn get_pricing(&mut self, model: &str) -> Result<ModelPricing, PricingError>;
}

/// Resolves free-form model names to normalized pricing.
///
/// The raw price list is loaded lazily, at most once; a load failure is
/// remembered and re-reported for every model in the build. Resolved names
/// are memoized for the lifetime of the resolver. The underlying HTTP
/// client and price list are released on drop.
pub struct PricingResolver {
    source: PriceListSource,
    price_list: Option<PriceList>,
    load_error: Option<PricingError>,
    cache: HashMap<String, ModelPricing>,
    fuzzy_enabled: bool,
    fallback_model: Option<String>,
}

impl PricingResolver {
    pub fn new(
        source: PriceListSource,
        fuzzy_enabled: bool,
        fallback_model: Option<String>,
    ) -> Self {
        Self {
            source,
            price_list: None,
            load_error: None,
            cache: HashMap::new(),
            fuzzy_enabled,
            fallback_model,
        }
    }

    /// Build a resolver over an already-materialized price list (tests).
    #[cfg(test)]
    pub fn with_price_list(
        price_list: PriceList,
        fuzzy_enabled: bool,
        fallback_model: Option<String>,
    ) -> Self {
        Self {
            source: PriceListSource::Offline,
            price_list: Some(price_list),
            load_error: None,
            cache: HashMap::new(),
            fuzzy_enabled,
            fallback_model,
        }
    }

    async fn ensure_price_list(&mut self) -> Result<(), PricingError> {
        if let Some(err) = &self.load_error {
            return Err(err.clone());
        }
        if self.price_list.is_none() {
            match self.source.load().await {
                Ok(list) => self.price_list = Some(list),
                Err(err) => {
                    self.load_error = Some(err.clone());
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}

impl PricingLookup for PricingResolver {
    async fn get_pricing(&mut self, model: &str) -> Result<ModelPricing, PricingError> {
        if let Some(hit) = self.cache.get(model) {
            return Ok(hit.clone());
        }

        self.ensure_price_list().await?;
        let Some(list) = self.price_list.as_ref() else {
            return Err(PricingError::SourceUnavailable {
                reason: "price list not loaded".to_string(),
            });
        };

        let resolved = resolve_model(
            list,
            model,
            self.fuzzy_enabled,
            self.fallback_model.as_deref(),
        )?;
        self.cache.insert(model.to_string(), resolved.clone());
        Ok(resolved)
    }
}

/// Tiered resolution: direct, alias, fuzzy (opt-in), configured fallback.
/// First tier to succeed wins; all tiers failing is `PricingNotFound`.
fn resolve_model(
    list: &PriceList,
    model: &str,
    fuzzy_enabled: bool,
    fallback_model: Option<&str>,
) -> Result<ModelPricing, PricingError> {
    if let Some(pricing) = resolve_direct(list, model, PricingResolution::Direct)? {
        return Ok(pricing);
    }

    if let Some(pricing) = resolve_alias(list, model)? {
        return Ok(pricing);
    }

    if fuzzy_enabled {
        if let Some(pricing) = resolve_fuzzy(list, model)? {
            return Ok(pricing);
        }
    }

    if let Some(fallback) = fallback_model {
        // The fallback target itself only gets the direct and alias tiers.
        let mut resolved = resolve_direct(list, fallback, PricingResolution::Direct)?;
        if resolved.is_none() {
            resolved = resolve_alias(list, fallback)?;
        }
        return match resolved {
            Some(mut pricing) => {
                warn!(model, fallback, "pricing model via configured fallback");
                pricing.resolution = PricingResolution::Fallback;
                Ok(pricing)
            }
            None => Err(PricingError::FallbackFailed {
                model: model.to_string(),
                fallback: fallback.to_string(),
            }),
        };
    }

    Err(PricingError::NotFound {
        model: model.to_string(),
        fuzzy_enabled,
    })
}

/// Tier 1: verbatim key, then each provider prefix in order.
fn resolve_direct(
    list: &PriceList,
    model: &str,
    resolution: PricingResolution,
) -> Result<Option<ModelPricing>, PricingError> {
    if let Some(raw) = list.get(model) {
        return normalize(model, raw, resolution).map(Some);
    }

    for prefix in PROVIDER_PREFIXES {
        let candidate = format!("{}{}", prefix, model);
        if let Some(raw) = list.get(&candidate) {
            return normalize(&candidate, raw, resolution).map(Some);
        }
    }

    Ok(None)
}

/// Tier 2: map through the alias table, then retry tier 1.
fn resolve_alias(list: &PriceList, model: &str) -> Result<Option<ModelPricing>, PricingError> {
    let Some((_, canonical)) = MODEL_ALIASES.iter().find(|(name, _)| *name == model) else {
        return Ok(None);
    };
    resolve_direct(list, canonical, PricingResolution::Alias)
}

/// Tier 3: case-insensitive substring match in both directions. Exactly one
/// match succeeds; two or more is a hard error naming every candidate.
fn resolve_fuzzy(list: &PriceList, model: &str) -> Result<Option<ModelPricing>, PricingError> {
    let needle = model.to_lowercase();
    let mut candidates: Vec<&String> = list
        .keys()
        .filter(|key| {
            let key_lower = key.to_lowercase();
            key_lower.contains(&needle) || needle.contains(&key_lower)
        })
        .collect();
    candidates.sort();

    if candidates.len() > 1 {
        return Err(PricingError::AmbiguousMatch {
            model: model.to_string(),
            candidates: candidates.into_iter().cloned().collect(),
        });
    }

    match candidates.first() {
        Some(key) => {
            let raw = &list[key.as_str()];
            normalize(key, raw, PricingResolution::Fuzzy).map(Some)
        }
        None => Ok(None),
    }
}

/// Convert a raw per-token record into per-million-token pricing. The
/// cached-input rate falls back to the plain input rate; a record without
/// both input and output costs cannot price a model.
fn normalize(
    key: &str,
    raw: &RawModelPricing,
    resolution: PricingResolution,
) -> Result<ModelPricing, PricingError> {
    let (Some(input), Some(output)) = (raw.input_cost_per_token, raw.output_cost_per_token) else {
        return Err(PricingError::IncompleteData {
            model: key.to_string(),
        });
    };
    let cached = raw.cache_read_input_token_cost.unwrap_or(input);

    Ok(ModelPricing {
        input_cost_per_m_token: input * 1_000_000.0,
        cached_input_cost_per_m_token: cached * 1_000_000.0,
        output_cost_per_m_token: output * 1_000_000.0,
        resolution,
        pricing_key: key.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(input: f64, output: f64, cached: Option<f64>) -> RawModelPricing {
        RawModelPricing {
            input_cost_per_token: Some(input),
            output_cost_per_token: Some(output),
            cache_read_input_token_cost: cached,
        }
    }

    fn sample_list() -> PriceList {
        let mut list = PriceList::new();
        list.insert("gpt-5".to_string(), raw(1.25e-6, 10e-6, Some(0.125e-6)));
        list.insert("gpt-5-mini".to_string(), raw(0.25e-6, 2e-6, Some(0.025e-6)));
        list.insert("openai/o3".to_string(), raw(2e-6, 8e-6, Some(0.5e-6)));
        list
    }

    fn resolver(list: PriceList) -> PricingResolver {
        PricingResolver::with_price_list(list, false, None)
    }

    #[tokio::test]
    async fn direct_match_is_normalized_per_million() {
        let mut r = resolver(sample_list());
        let pricing = r.get_pricing("gpt-5").await.unwrap();
        assert_eq!(pricing.resolution, PricingResolution::Direct);
        assert_eq!(pricing.pricing_key, "gpt-5");
        assert!((pricing.input_cost_per_m_token - 1.25).abs() < 1e-9);
        assert!((pricing.cached_input_cost_per_m_token - 0.125).abs() < 1e-9);
        assert!((pricing.output_cost_per_m_token - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn provider_prefix_matches_in_order() {
        let mut r = resolver(sample_list());
        let pricing = r.get_pricing("o3").await.unwrap();
        assert_eq!(pricing.resolution, PricingResolution::Direct);
        assert_eq!(pricing.pricing_key, "openai/o3");
    }

    #[tokio::test]
    async fn direct_wins_over_alias() {
        // Price list carries both the aliased name and its target with
        // different rates; the verbatim entry must win.
        let mut list = sample_list();
        list.insert("gpt-5-codex".to_string(), raw(9e-6, 9e-6, None));
        let mut r = resolver(list);

        let pricing = r.get_pricing("gpt-5-codex").await.unwrap();
        assert_eq!(pricing.resolution, PricingResolution::Direct);
        assert_eq!(pricing.pricing_key, "gpt-5-codex");
        assert!((pricing.input_cost_per_m_token - 9.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn alias_resolves_through_direct_tier() {
        let mut r = resolver(sample_list());
        let pricing = r.get_pricing("gpt-5-codex").await.unwrap();
        assert_eq!(pricing.resolution, PricingResolution::Alias);
        assert_eq!(pricing.pricing_key, "gpt-5");
    }

    #[tokio::test]
    async fn fuzzy_disabled_fails_with_hint() {
        let mut r = resolver(sample_list());
        let err = r.get_pricing("mini").await.unwrap_err();
        assert!(matches!(
            err,
            PricingError::NotFound {
                fuzzy_enabled: false,
                ..
            }
        ));
        assert!(err.to_string().contains("--fuzzy"));
    }

    #[tokio::test]
    async fn fuzzy_single_match_succeeds() {
        let mut r = PricingResolver::with_price_list(sample_list(), true, None);
        let pricing = r.get_pricing("openai/o3-2025-04-16").await.unwrap();
        assert_eq!(pricing.resolution, PricingResolution::Fuzzy);
        assert_eq!(pricing.pricing_key, "openai/o3");
    }

    #[tokio::test]
    async fn fuzzy_ambiguity_names_every_candidate() {
        let mut r = PricingResolver::with_price_list(sample_list(), true, None);
        let err = r.get_pricing("gpt").await.unwrap_err();
        match err {
            PricingError::AmbiguousMatch { candidates, .. } => {
                assert_eq!(candidates, vec!["gpt-5".to_string(), "gpt-5-mini".to_string()]);
            }
            other => panic!("expected ambiguous match, got {other}"),
        }
    }

    #[tokio::test]
    async fn fuzzy_zero_matches_falls_through_to_not_found() {
        let mut r = PricingResolver::with_price_list(sample_list(), true, None);
        let err = r.get_pricing("mystery-model").await.unwrap_err();
        assert!(matches!(
            err,
            PricingError::NotFound {
                fuzzy_enabled: true,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn fallback_prices_unknown_model_and_tags_it() {
        let mut r =
            PricingResolver::with_price_list(sample_list(), false, Some("gpt-5".to_string()));
        let pricing = r.get_pricing("mystery-model").await.unwrap();
        assert_eq!(pricing.resolution, PricingResolution::Fallback);
        assert_eq!(pricing.pricing_key, "gpt-5");
        assert!((pricing.input_cost_per_m_token - 1.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unresolvable_fallback_is_fatal() {
        let mut r =
            PricingResolver::with_price_list(sample_list(), false, Some("nonexistent".to_string()));
        let err = r.get_pricing("mystery-model").await.unwrap_err();
        assert!(matches!(err, PricingError::FallbackFailed { .. }));
    }

    #[tokio::test]
    async fn missing_cost_fields_are_a_hard_error() {
        let mut list = PriceList::new();
        list.insert(
            "half-priced".to_string(),
            RawModelPricing {
                input_cost_per_token: Some(1e-6),
                output_cost_per_token: None,
                cache_read_input_token_cost: None,
            },
        );
        let mut r = resolver(list);
        let err = r.get_pricing("half-priced").await.unwrap_err();
        assert!(matches!(err, PricingError::IncompleteData { .. }));
        assert!(err.to_string().contains("half-priced"));
    }

    #[tokio::test]
    async fn cached_rate_defaults_to_input_rate() {
        let mut list = PriceList::new();
        list.insert("flat".to_string(), raw(2e-6, 4e-6, None));
        let mut r = resolver(list);
        let pricing = r.get_pricing("flat").await.unwrap();
        assert!((pricing.cached_input_cost_per_m_token - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn resolution_is_memoized_per_model() {
        let mut r = resolver(sample_list());
        let first = r.get_pricing("gpt-5").await.unwrap();
        // Mutating the list behind the cache must not change the answer.
        if let Some(list) = r.price_list.as_mut() {
            list.remove("gpt-5");
        }
        let second = r.get_pricing("gpt-5").await.unwrap();
        assert_eq!(first, second);
    }
}

use thiserror::Error;

/// Failure modes of model-pricing resolution. Any of these aborts the
/// report build that triggered it.
#[derive(Debug, Clone, Error)]
pub enum PricingError {
    #[error("ambiguous pricing match for model {model}: candidates are {}", candidates.join(", "))]
    AmbiguousMatch {
        model: String,
        candidates: Vec<String>,
    },

    #[error("incomplete pricing data for model {model}: missing input or output cost")]
    IncompleteData { model: String },

    #[error("pricing not found for model {model}{}", fuzzy_hint(*fuzzy_enabled))]
    NotFound { model: String, fuzzy_enabled: bool },

    #[error("fallback model {fallback} could not be resolved while pricing {model}")]
    FallbackFailed { model: String, fallback: String },

    #[error("model price list unavailable: {reason}")]
    SourceUnavailable { reason: String },
}

fn fuzzy_hint(fuzzy_enabled: bool) -> &'static str {
    if fuzzy_enabled {
        " (fuzzy matching was enabled)"
    } else {
        "; fuzzy matching is disabled, retry with --fuzzy"
    }
}

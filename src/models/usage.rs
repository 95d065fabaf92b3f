use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::models::PricingResolution;

/// One billing-relevant unit parsed from a Codex session log.
#[derive(Debug, Clone)]
pub struct TokenUsageEvent {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub model: String,
    /// Set when the model name was substituted upstream because the log
    /// carried no model information.
    pub is_fallback_model: bool,
    pub usage: TokenUsageDelta,
}

/// The five token counters attached to an event or accumulated in a group.
///
/// `total_tokens` is `input + output` as recorded upstream; cached and
/// reasoning counts are subsets of input and output respectively and are
/// never added on top.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TokenUsageDelta {
    pub input_tokens: u64,
    pub cached_input_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsageDelta {
    pub fn add(&mut self, other: &TokenUsageDelta) {
        self.input_tokens += other.input_tokens;
        self.cached_input_tokens += other.cached_input_tokens;
        self.output_tokens += other.output_tokens;
        self.reasoning_output_tokens += other.reasoning_output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Accumulated usage for one model within one group, plus the pricing
/// metadata attached at report-assembly time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelUsage {
    #[serde(flatten)]
    pub tokens: TokenUsageDelta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_fallback: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing_resolution: Option<PricingResolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing_model: Option<String>,
}

impl ModelUsage {
    pub fn add_event(&mut self, event: &TokenUsageEvent) {
        self.tokens.add(&event.usage);
        if event.is_fallback_model {
            self.is_fallback = Some(true);
        }
    }
}

/// Running totals for one group (a day, a month, or a session).
///
/// Owned exclusively by the accumulation pass that builds it; `cost_usd`
/// stays `None` until report assembly.
#[derive(Debug, Clone)]
pub struct UsageSummary {
    pub first_seen: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub tokens: TokenUsageDelta,
    pub models: HashMap<String, ModelUsage>,
    pub cost_usd: Option<f64>,
}

impl UsageSummary {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            first_seen: timestamp,
            last_activity: timestamp,
            tokens: TokenUsageDelta::default(),
            models: HashMap::new(),
            cost_usd: None,
        }
    }

    pub fn add_event(&mut self, event: &TokenUsageEvent) {
        self.first_seen = self.first_seen.min(event.timestamp);
        self.last_activity = self.last_activity.max(event.timestamp);
        self.tokens.add(&event.usage);
        self.models
            .entry(event.model.clone())
            .or_default()
            .add_event(event);
    }
}

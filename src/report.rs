use chrono::SecondsFormat;
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::aggregate::{accumulate_events, day_key, month_key, session_key, DateRange};
use crate::cost::usage_cost;
use crate::models::{ModelPricing, ModelUsage, TokenUsageDelta, TokenUsageEvent, UsageSummary};
use crate::pricing::{PricingError, PricingLookup};

#[derive(Debug, Clone, Serialize)]
pub struct DailyReportRow {
    pub date: String,
    #[serde(flatten)]
    pub tokens: TokenUsageDelta,
    pub cost_usd: f64,
    pub models: BTreeMap<String, ModelUsage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyReportRow {
    pub month: String,
    #[serde(flatten)]
    pub tokens: TokenUsageDelta,
    pub cost_usd: f64,
    pub models: BTreeMap<String, ModelUsage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReportRow {
    pub session_id: String,
    /// Session id up to the last path separator; empty when there is none.
    pub directory: String,
    pub session_file: String,
    pub last_activity: String,
    #[serde(flatten)]
    pub tokens: TokenUsageDelta,
    pub cost_usd: f64,
    pub models: BTreeMap<String, ModelUsage>,
}

/// Aggregate counters summed over every row of a report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportTotals {
    #[serde(flatten)]
    pub tokens: TokenUsageDelta,
    pub cost_usd: f64,
}

impl ReportTotals {
    fn add(&mut self, tokens: &TokenUsageDelta, cost_usd: f64) {
        self.tokens.add(tokens);
        self.cost_usd += cost_usd;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyReport {
    pub daily: Vec<DailyReportRow>,
    pub totals: ReportTotals,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyReport {
    pub monthly: Vec<MonthlyReportRow>,
    pub totals: ReportTotals,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub sessions: Vec<SessionReportRow>,
    pub totals: ReportTotals,
}

pub async fn build_daily_report<P: PricingLookup>(
    events: &[TokenUsageEvent],
    range: &DateRange,
    timezone: Tz,
    pricing: &mut P,
) -> Result<DailyReport, PricingError> {
    let summaries = accumulate_events(events, day_key(timezone), range, timezone);
    let priced = resolve_all_models(pricing, summaries.values()).await?;

    let mut rows = Vec::new();
    let mut totals = ReportTotals::default();
    // BTreeMap iteration gives ascending date order.
    for (date, mut summary) in summaries {
        finalize_summary(&mut summary, &priced);
        let cost_usd = summary.cost_usd.unwrap_or(0.0);
        totals.add(&summary.tokens, cost_usd);
        rows.push(DailyReportRow {
            date,
            tokens: summary.tokens,
            cost_usd,
            models: into_sorted_models(summary.models),
        });
    }

    Ok(DailyReport {
        daily: rows,
        totals,
    })
}

pub async fn build_monthly_report<P: PricingLookup>(
    events: &[TokenUsageEvent],
    range: &DateRange,
    timezone: Tz,
    pricing: &mut P,
) -> Result<MonthlyReport, PricingError> {
    let summaries = accumulate_events(events, month_key(timezone), range, timezone);
    let priced = resolve_all_models(pricing, summaries.values()).await?;

    let mut rows = Vec::new();
    let mut totals = ReportTotals::default();
    for (month, mut summary) in summaries {
        finalize_summary(&mut summary, &priced);
        let cost_usd = summary.cost_usd.unwrap_or(0.0);
        totals.add(&summary.tokens, cost_usd);
        rows.push(MonthlyReportRow {
            month,
            tokens: summary.tokens,
            cost_usd,
            models: into_sorted_models(summary.models),
        });
    }

    Ok(MonthlyReport {
        monthly: rows,
        totals,
    })
}

pub async fn build_session_report<P: PricingLookup>(
    events: &[TokenUsageEvent],
    range: &DateRange,
    timezone: Tz,
    pricing: &mut P,
) -> Result<SessionReport, PricingError> {
    let summaries = accumulate_events(events, session_key(), range, timezone);
    let priced = resolve_all_models(pricing, summaries.values()).await?;

    let mut ordered: Vec<(String, UsageSummary)> = summaries.into_iter().collect();
    ordered.sort_by_key(|(_, summary)| summary.last_activity);

    let mut rows = Vec::new();
    let mut totals = ReportTotals::default();
    for (session_id, mut summary) in ordered {
        finalize_summary(&mut summary, &priced);
        let cost_usd = summary.cost_usd.unwrap_or(0.0);
        totals.add(&summary.tokens, cost_usd);
        let (directory, session_file) = split_session_path(&session_id);
        rows.push(SessionReportRow {
            session_id,
            directory,
            session_file,
            last_activity: summary
                .last_activity
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            tokens: summary.tokens,
            cost_usd,
            models: into_sorted_models(summary.models),
        });
    }

    Ok(SessionReport {
        sessions: rows,
        totals,
    })
}

/// Resolve pricing once per distinct model across all summaries. Any
/// resolution failure aborts the whole report build; partial reports with
/// silently mispriced models are never emitted.
async fn resolve_all_models<'a, P, I>(
    pricing: &mut P,
    summaries: I,
) -> Result<HashMap<String, ModelPricing>, PricingError>
where
    P: PricingLookup,
    I: Iterator<Item = &'a UsageSummary>,
{
    let mut models: BTreeSet<&str> = BTreeSet::new();
    for summary in summaries {
        for model in summary.models.keys() {
            models.insert(model.as_str());
        }
    }

    let mut priced = HashMap::new();
    for model in models {
        let resolved = pricing.get_pricing(model).await?;
        priced.insert(model.to_string(), resolved);
    }
    Ok(priced)
}

/// Compute the summary's cost and attach resolution metadata to each model
/// usage. A model missing from the priced mapping is reported with its raw
/// counters only and contributes nothing to the cost.
fn finalize_summary(summary: &mut UsageSummary, priced: &HashMap<String, ModelPricing>) {
    let mut cost_usd = 0.0;
    for (model, usage) in summary.models.iter_mut() {
        if let Some(pricing) = priced.get(model) {
            cost_usd += usage_cost(&usage.tokens, pricing);
            usage.pricing_resolution = Some(pricing.resolution);
            usage.pricing_model = Some(pricing.pricing_key.clone());
        }
    }
    summary.cost_usd = Some(cost_usd);
}

fn into_sorted_models(models: HashMap<String, ModelUsage>) -> BTreeMap<String, ModelUsage> {
    models.into_iter().collect()
}

fn split_session_path(session_id: &str) -> (String, String) {
    match session_id.rfind('/') {
        Some(index) => (
            session_id[..index].to_string(),
            session_id[index + 1..].to_string(),
        ),
        None => (String::new(), session_id.to_string()),
    }
}

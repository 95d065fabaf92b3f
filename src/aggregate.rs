use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;

use crate::models::{TokenUsageEvent, UsageSummary};

/// Inclusive day-granularity date filter. Bounds accept `YYYY-MM-DD` or
/// `YYYYMMDD`; comparison is lexicographic after stripping dashes.
#[derive(Debug, Clone, Default)]
pub struct DateRange {
    pub since: Option<String>,
    pub until: Option<String>,
}

impl DateRange {
    pub fn new(since: Option<String>, until: Option<String>) -> Self {
        Self { since, until }
    }

    pub fn contains(&self, date_key: &str) -> bool {
        let value = date_key.replace('-', "");
        if let Some(since) = &self.since {
            if value < since.replace('-', "") {
                return false;
            }
        }
        if let Some(until) = &self.until {
            if value > until.replace('-', "") {
                return false;
            }
        }
        true
    }
}

pub fn to_date_key(timestamp: DateTime<Utc>, timezone: Tz) -> String {
    timestamp
        .with_timezone(&timezone)
        .format("%Y-%m-%d")
        .to_string()
}

pub fn to_month_key(timestamp: DateTime<Utc>, timezone: Tz) -> String {
    timestamp
        .with_timezone(&timezone)
        .format("%Y-%m")
        .to_string()
}

/// Fold events into keyed summaries. One engine serves all three report
/// granularities; only the key function differs.
///
/// Events with a blank model are skipped, as are events the key function
/// declines (blank session ids). The date filter applies per event at day
/// granularity regardless of grouping, so a session whose events straddle
/// the window accumulates only the in-window subset.
pub fn accumulate_events<F>(
    events: &[TokenUsageEvent],
    key_fn: F,
    range: &DateRange,
    timezone: Tz,
) -> BTreeMap<String, UsageSummary>
where
    F: Fn(&TokenUsageEvent) -> Option<String>,
{
    let mut summaries: BTreeMap<String, UsageSummary> = BTreeMap::new();

    for event in events {
        if event.model.trim().is_empty() {
            continue;
        }
        let Some(key) = key_fn(event) else {
            continue;
        };
        if !range.contains(&to_date_key(event.timestamp, timezone)) {
            continue;
        }

        summaries
            .entry(key)
            .or_insert_with(|| UsageSummary::new(event.timestamp))
            .add_event(event);
    }

    summaries
}

pub fn day_key(timezone: Tz) -> impl Fn(&TokenUsageEvent) -> Option<String> {
    move |event| Some(to_date_key(event.timestamp, timezone))
}

pub fn month_key(timezone: Tz) -> impl Fn(&TokenUsageEvent) -> Option<String> {
    move |event| Some(to_month_key(event.timestamp, timezone))
}

pub fn session_key() -> impl Fn(&TokenUsageEvent) -> Option<String> {
    |event| {
        let id = event.session_id.trim();
        if id.is_empty() {
            None
        } else {
            Some(id.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TokenUsageDelta;

    fn event(
        timestamp: &str,
        session_id: &str,
        model: &str,
        input: u64,
        cached: u64,
        output: u64,
        reasoning: u64,
    ) -> TokenUsageEvent {
        TokenUsageEvent {
            timestamp: DateTime::parse_from_rfc3339(timestamp)
                .unwrap()
                .with_timezone(&Utc),
            session_id: session_id.to_string(),
            model: model.to_string(),
            is_fallback_model: false,
            usage: TokenUsageDelta {
                input_tokens: input,
                cached_input_tokens: cached,
                output_tokens: output,
                reasoning_output_tokens: reasoning,
                total_tokens: input + output,
            },
        }
    }

    fn sample_events() -> Vec<TokenUsageEvent> {
        vec![
            event("2025-09-11T10:00:00Z", "dir/a/session-1", "gpt-5", 1000, 200, 500, 0),
            event("2025-09-11T11:00:00Z", "dir/a/session-1", "gpt-5-mini", 400, 100, 200, 50),
            event("2025-09-12T09:00:00Z", "dir/b/session-2", "gpt-5", 2000, 0, 800, 0),
        ]
    }

    #[test]
    fn daily_grouping_matches_worked_example() {
        let events = sample_events();
        let range = DateRange::new(
            Some("2025-09-11".to_string()),
            Some("2025-09-12".to_string()),
        );
        let summaries = accumulate_events(&events, day_key(chrono_tz::UTC), &range, chrono_tz::UTC);

        assert_eq!(summaries.len(), 2);
        let day1 = &summaries["2025-09-11"];
        assert_eq!(day1.tokens.input_tokens, 1400);
        assert_eq!(day1.tokens.cached_input_tokens, 300);
        assert_eq!(day1.tokens.output_tokens, 700);
        assert_eq!(day1.tokens.reasoning_output_tokens, 50);
        assert_eq!(day1.models.len(), 2);
        assert_eq!(day1.models["gpt-5"].tokens.input_tokens, 1000);
        assert_eq!(day1.models["gpt-5-mini"].tokens.reasoning_output_tokens, 50);
    }

    #[test]
    fn blank_model_events_contribute_nowhere() {
        let mut events = sample_events();
        events.push(event("2025-09-11T12:00:00Z", "s", "  ", 9999, 0, 9999, 0));
        events.push(event("2025-09-11T12:00:00Z", "s", "", 9999, 0, 9999, 0));

        let summaries = accumulate_events(
            &events,
            day_key(chrono_tz::UTC),
            &DateRange::default(),
            chrono_tz::UTC,
        );
        assert_eq!(summaries["2025-09-11"].tokens.input_tokens, 1400);
    }

    #[test]
    fn blank_session_ids_are_skipped_by_session_grouping() {
        let mut events = sample_events();
        events.push(event("2025-09-11T12:00:00Z", "   ", "gpt-5", 100, 0, 10, 0));

        let summaries = accumulate_events(
            &events,
            session_key(),
            &DateRange::default(),
            chrono_tz::UTC,
        );
        assert_eq!(summaries.len(), 2);
    }

    #[test]
    fn date_filter_drops_events_per_session_not_whole_sessions() {
        // session-1 has one event inside and one outside the window; only
        // the in-window contribution survives.
        let events = vec![
            event("2025-09-10T10:00:00Z", "session-1", "gpt-5", 500, 0, 100, 0),
            event("2025-09-11T10:00:00Z", "session-1", "gpt-5", 1000, 0, 200, 0),
        ];
        let range = DateRange::new(Some("2025-09-11".to_string()), None);

        let summaries = accumulate_events(&events, session_key(), &range, chrono_tz::UTC);
        assert_eq!(summaries["session-1"].tokens.input_tokens, 1000);
    }

    #[test]
    fn date_range_accepts_compact_bounds() {
        let range = DateRange::new(Some("20250911".to_string()), Some("20250912".to_string()));
        assert!(range.contains("2025-09-11"));
        assert!(range.contains("2025-09-12"));
        assert!(!range.contains("2025-09-10"));
        assert!(!range.contains("2025-09-13"));
    }

    #[test]
    fn timezone_shifts_day_boundaries() {
        // 23:30 UTC on the 11th is still the 11th in UTC but the 12th in
        // Asia/Tokyo.
        let events = vec![event("2025-09-11T23:30:00Z", "s", "gpt-5", 100, 0, 10, 0)];

        let utc = accumulate_events(
            &events,
            day_key(chrono_tz::UTC),
            &DateRange::default(),
            chrono_tz::UTC,
        );
        assert!(utc.contains_key("2025-09-11"));

        let tokyo = accumulate_events(
            &events,
            day_key(chrono_tz::Asia::Tokyo),
            &DateRange::default(),
            chrono_tz::Asia::Tokyo,
        );
        assert!(tokyo.contains_key("2025-09-12"));
    }

    #[test]
    fn accumulation_is_order_invariant() {
        let events = sample_events();
        let mut reversed = events.clone();
        reversed.reverse();

        let forward = accumulate_events(
            &events,
            session_key(),
            &DateRange::default(),
            chrono_tz::UTC,
        );
        let backward = accumulate_events(
            &reversed,
            session_key(),
            &DateRange::default(),
            chrono_tz::UTC,
        );

        assert_eq!(forward.len(), backward.len());
        for (key, summary) in &forward {
            let other = &backward[key];
            assert_eq!(summary.tokens.total_tokens, other.tokens.total_tokens);
            assert_eq!(summary.first_seen, other.first_seen);
            assert_eq!(summary.last_activity, other.last_activity);
        }
    }

    #[test]
    fn last_activity_tracks_maximum_timestamp() {
        let events = sample_events();
        let summaries = accumulate_events(
            &events,
            session_key(),
            &DateRange::default(),
            chrono_tz::UTC,
        );
        let session = &summaries["dir/a/session-1"];
        assert_eq!(
            session.first_seen,
            DateTime::parse_from_rfc3339("2025-09-11T10:00:00Z").unwrap()
        );
        assert_eq!(
            session.last_activity,
            DateTime::parse_from_rfc3339("2025-09-11T11:00:00Z").unwrap()
        );
    }

    #[test]
    fn fallback_marker_is_sticky_for_the_group() {
        let mut flagged = event("2025-09-11T10:00:00Z", "s", "gpt-5", 100, 0, 10, 0);
        flagged.is_fallback_model = true;
        let events = vec![
            flagged,
            event("2025-09-11T11:00:00Z", "s", "gpt-5", 100, 0, 10, 0),
        ];

        let summaries = accumulate_events(
            &events,
            day_key(chrono_tz::UTC),
            &DateRange::default(),
            chrono_tz::UTC,
        );
        assert_eq!(summaries["2025-09-11"].models["gpt-5"].is_fallback, Some(true));
    }
}

use anyhow::Result;
use chrono::Utc;

use crate::aggregate::{to_date_key, to_month_key, DateRange};
use crate::cli::ReportArgs;
use crate::commands::{format_number, resolve_timezone, resolver_from_args};
use crate::data_loader::DataLoader;
use crate::report::{build_daily_report, build_monthly_report, build_session_report};

pub async fn show_status(args: &ReportArgs) -> Result<()> {
    let loader = DataLoader::new()?;
    let events = loader.load_events()?;
    let timezone = resolve_timezone(args.timezone.as_deref())?;
    let range = DateRange::new(args.since.clone(), args.until.clone());

    let mut resolver = resolver_from_args(args);
    let daily = build_daily_report(&events, &range, timezone, &mut resolver).await?;
    let monthly = build_monthly_report(&events, &range, timezone, &mut resolver).await?;
    let sessions = build_session_report(&events, &range, timezone, &mut resolver).await?;

    let now = Utc::now();
    let today = to_date_key(now, timezone);
    let current_month = to_month_key(now, timezone);
    let today_row = daily.daily.iter().find(|row| row.date == today);
    let month_row = monthly.monthly.iter().find(|row| row.month == current_month);

    if args.json {
        let output = serde_json::json!({
            "today": today_row,
            "current_month": month_row,
            "all_time": {
                "totals": daily.totals,
                "sessions": sessions.sessions.len(),
            },
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let locale = args.locale.as_deref();
    println!("🤖 Codex Usage Status\n");
    println!("═══════════════════════════════════════════");

    if let Some(row) = today_row {
        println!("📅 Today ({}):", row.date);
        println!(
            "   Tokens: {} input / {} output",
            format_number(row.tokens.input_tokens, locale),
            format_number(row.tokens.output_tokens, locale)
        );
        if row.tokens.cached_input_tokens > 0 {
            println!(
                "   Cache:  {} read",
                format_number(row.tokens.cached_input_tokens, locale)
            );
        }
        println!("   Cost:   ${:.2}", row.cost_usd);
        println!();
    }

    if let Some(row) = month_row {
        println!("📈 This Month ({}):", row.month);
        println!(
            "   Tokens: {} total",
            format_number(row.tokens.total_tokens, locale)
        );
        println!("   Cost:   ${:.2}", row.cost_usd);
        let models: Vec<&str> = row.models.keys().map(String::as_str).collect();
        println!("   Models: {}", models.join(", "));
        println!();
    }

    println!("💰 All Time:");
    println!(
        "   Tokens: {} total",
        format_number(daily.totals.tokens.total_tokens, locale)
    );
    println!("   Cost:   ${:.2}", daily.totals.cost_usd);
    println!("   Sessions: {}", sessions.sessions.len());
    println!("═══════════════════════════════════════════");

    Ok(())
}

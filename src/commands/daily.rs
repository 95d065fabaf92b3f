use anyhow::Result;

use crate::aggregate::DateRange;
use crate::cli::ReportArgs;
use crate::commands::{format_number, resolve_timezone, resolver_from_args};
use crate::data_loader::DataLoader;
use crate::report::build_daily_report;

pub async fn show_daily(args: &ReportArgs) -> Result<()> {
    let loader = DataLoader::new()?;
    let events = loader.load_events()?;
    let timezone = resolve_timezone(args.timezone.as_deref())?;
    let range = DateRange::new(args.since.clone(), args.until.clone());

    let mut resolver = resolver_from_args(args);
    let report = build_daily_report(&events, &range, timezone, &mut resolver).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let locale = args.locale.as_deref();
    println!("📅 Daily Usage Report\n");
    println!(
        "{:<12} {:>14} {:>14} {:>14} {:>14} {:>10}",
        "Date", "Input", "Cached", "Output", "Reasoning", "Cost"
    );
    println!("{}", "─".repeat(83));

    for row in &report.daily {
        println!(
            "{:<12} {:>14} {:>14} {:>14} {:>14} ${:>9.2}",
            row.date,
            format_number(row.tokens.input_tokens, locale),
            format_number(row.tokens.cached_input_tokens, locale),
            format_number(row.tokens.output_tokens, locale),
            format_number(row.tokens.reasoning_output_tokens, locale),
            row.cost_usd
        );
    }

    println!("{}", "─".repeat(83));
    println!(
        "{:<12} {:>14} {:>14} {:>14} {:>14} ${:>9.2}",
        "Total",
        format_number(report.totals.tokens.input_tokens, locale),
        format_number(report.totals.tokens.cached_input_tokens, locale),
        format_number(report.totals.tokens.output_tokens, locale),
        format_number(report.totals.tokens.reasoning_output_tokens, locale),
        report.totals.cost_usd
    );

    Ok(())
}

use anyhow::Result;

use crate::aggregate::DateRange;
use crate::cli::ReportArgs;
use crate::commands::{format_number, resolve_timezone, resolver_from_args};
use crate::data_loader::DataLoader;
use crate::report::build_session_report;

pub async fn show_sessions(args: &ReportArgs) -> Result<()> {
    let loader = DataLoader::new()?;
    let events = loader.load_events()?;
    let timezone = resolve_timezone(args.timezone.as_deref())?;
    let range = DateRange::new(args.since.clone(), args.until.clone());

    let mut resolver = resolver_from_args(args);
    let report = build_session_report(&events, &range, timezone, &mut resolver).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let locale = args.locale.as_deref();
    println!("🔍 Session Usage Report\n");
    println!(
        "{:<26} {:>14} {:>10} {:<40}",
        "Last Activity", "Total Tokens", "Cost", "Session"
    );
    println!("{}", "─".repeat(93));

    for row in &report.sessions {
        let session = if row.session_file.len() > 38 {
            format!("{}...", &row.session_file[..35])
        } else {
            row.session_file.clone()
        };
        println!(
            "{:<26} {:>14} ${:>9.2} {:<40}",
            row.last_activity,
            format_number(row.tokens.total_tokens, locale),
            row.cost_usd,
            session
        );
    }

    println!("{}", "─".repeat(93));
    println!(
        "{:<26} {:>14} ${:>9.2}",
        "Total",
        format_number(report.totals.tokens.total_tokens, locale),
        report.totals.cost_usd
    );

    Ok(())
}

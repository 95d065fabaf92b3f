use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "codex-usage")]
#[command(about = "Report Codex CLI token usage and costs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Daily usage report
    Daily {
        #[command(flatten)]
        args: ReportArgs,
    },

    /// Monthly usage report
    Monthly {
        #[command(flatten)]
        args: ReportArgs,
    },

    /// Per-session usage report
    Sessions {
        #[command(flatten)]
        args: ReportArgs,
    },

    /// Quick overview: today, this month, all time
    Status {
        #[command(flatten)]
        args: ReportArgs,
    },
}

/// Options shared by every report command.
#[derive(Args, Debug, Clone, Default)]
pub struct ReportArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Only include events on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub since: Option<String>,

    /// Only include events on or before this date (YYYY-MM-DD)
    #[arg(long)]
    pub until: Option<String>,

    /// IANA timezone for date grouping (defaults to $TZ, then UTC)
    #[arg(long)]
    pub timezone: Option<String>,

    /// Locale used for number formatting in tables (e.g. en-US, de-DE)
    #[arg(long)]
    pub locale: Option<String>,

    /// Price against the embedded snapshot instead of fetching the live list
    #[arg(long)]
    pub offline: bool,

    /// Enable fuzzy model-name matching against the price list
    #[arg(long)]
    pub fuzzy: bool,

    /// Price unknown models using this model's rates
    #[arg(long)]
    pub fallback_model: Option<String>,
}

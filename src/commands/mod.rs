pub mod daily;
pub mod monthly;
pub mod sessions;
pub mod status;

pub use daily::*;
pub use monthly::*;
pub use sessions::*;
pub use status::*;

use anyhow::{anyhow, Result};
use chrono_tz::Tz;

use crate::cli::ReportArgs;
use crate::pricing::{PriceListSource, PricingResolver};

/// Timezone precedence: explicit flag, then $TZ, then UTC.
pub(crate) fn resolve_timezone(raw: Option<&str>) -> Result<Tz> {
    if let Some(value) = raw {
        return value
            .trim()
            .parse::<Tz>()
            .map_err(|_| anyhow!("invalid timezone: {}", value));
    }

    if let Ok(value) = std::env::var("TZ") {
        if let Ok(timezone) = value.trim().parse::<Tz>() {
            return Ok(timezone);
        }
    }

    Ok(chrono_tz::UTC)
}

pub(crate) fn resolver_from_args(args: &ReportArgs) -> PricingResolver {
    let source = if args.offline {
        PriceListSource::Offline
    } else {
        PriceListSource::Online
    };
    PricingResolver::new(source, args.fuzzy, args.fallback_model.clone())
}

/// Group digits with the locale's thousands separator.
pub(crate) fn format_number(n: u64, locale: Option<&str>) -> String {
    let separator = match locale.map(|l| l.to_ascii_lowercase()) {
        Some(l) if l.starts_with("de") || l.starts_with("it") || l.starts_with("es") => '.',
        Some(l) if l.starts_with("fr") => ' ',
        _ => ',',
    };

    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(separator);
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_numbers_per_locale() {
        assert_eq!(format_number(1234567, None), "1,234,567");
        assert_eq!(format_number(1234567, Some("de-DE")), "1.234.567");
        assert_eq!(format_number(1234567, Some("fr")), "1 234 567");
        assert_eq!(format_number(999, Some("en-US")), "999");
    }

    #[test]
    fn explicit_timezone_wins() {
        let tz = resolve_timezone(Some("Asia/Tokyo")).unwrap();
        assert_eq!(tz, chrono_tz::Asia::Tokyo);
    }

    #[test]
    fn bad_timezone_is_an_error() {
        assert!(resolve_timezone(Some("Not/AZone")).is_err());
    }
}

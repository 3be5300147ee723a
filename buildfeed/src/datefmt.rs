use chrono::{DateTime, TimeDelta, Utc};
use std::str::FromStr;

#[derive(thiserror::Error, Debug)]
pub enum DateError {
    #[error("invalid timestamp: {0}")]
    Parse(#[from] chrono::ParseError),
}

/// Display locale. Only the distinction between Chinese and everything else
/// affects rendering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl FromStr for Locale {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.to_ascii_lowercase().starts_with("zh") {
            Ok(Locale::Zh)
        } else {
            Ok(Locale::En)
        }
    }
}

/// Renders an ISO-8601 timestamp for display. Chinese readers get UTC+8,
/// everyone else gets UTC.
pub fn format_release_date(iso: &str, locale: Locale) -> Result<String, DateError> {
    let date = DateTime::parse_from_rfc3339(iso)?.with_timezone(&Utc);

    let rendered = match locale {
        Locale::Zh => (date.naive_utc() + TimeDelta::hours(8))
            .format("%Y/%m/%d %H:%M:%S GMT+8")
            .to_string(),
        Locale::En => date.format("%m/%d/%Y, %I:%M:%S %p UTC").to_string(),
    };
    Ok(rendered)
}

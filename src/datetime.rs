use crate::types::{DataAccessError, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// Timestamp layout whose string form sorts the same way the instants do.
pub const DT_LEXICOGRAPHIC_FORMAT: &str = "%Y/%m/%d/%H/%M/%S/%6f";

/// Date-only layout used for date-partitioned key prefixes.
pub const DATE_LEXICOGRAPHIC_FORMAT: &str = "%Y/%m/%d";

/// Dash-separated variant for contexts where `/` is not a usable separator.
pub const DT_LEXICOGRAPHIC_DASH_FORMAT: &str = "%Y-%m-%d-%H-%M-%S-%6f";

/// Canonical published-date shape: ISO-8601 UTC with second precision.
pub const PUBLISHED_DATE_PATTERN: &str =
    r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\+00:00|Z)$";

fn published_date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(PUBLISHED_DATE_PATTERN).expect("published date pattern")
    })
}

pub fn dt_to_lexicographic_prefix(dt: DateTime<Utc>) -> String {
    dt.format(DT_LEXICOGRAPHIC_FORMAT).to_string()
}

pub fn dt_to_lexicographic_date_prefix(dt: DateTime<Utc>) -> String {
    dt.format(DATE_LEXICOGRAPHIC_FORMAT).to_string()
}

pub fn dt_to_lexicographic_dash_prefix(dt: DateTime<Utc>) -> String {
    dt.format(DT_LEXICOGRAPHIC_DASH_FORMAT).to_string()
}

pub fn lexicographic_prefix_to_dt(prefix: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(prefix, DT_LEXICOGRAPHIC_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| {
            DataAccessError::Validation(format!(
                "invalid lexicographic timestamp '{prefix}': {e}"
            ))
        })
}

/// Validate that a published-date string already has the canonical shape.
pub fn validate_published_date(dt_str: &str) -> Result<()> {
    if published_date_regex().is_match(dt_str) {
        Ok(())
    } else {
        Err(DataAccessError::InvalidPublishedDate {
            dt_str: dt_str.to_string(),
            pattern: PUBLISHED_DATE_PATTERN.to_string(),
        })
    }
}

/// Standardize an aggregator-native published date into the canonical shape.
///
/// The input is validated against the aggregator's own `expected_pattern`
/// first. Fractional seconds are dropped; the input is assumed to be UTC.
pub fn standardize_published_date(dt_str: &str, expected_pattern: &str) -> Result<String> {
    let re = Regex::new(expected_pattern).map_err(|e| {
        DataAccessError::Validation(format!(
            "invalid published date pattern '{expected_pattern}': {e}"
        ))
    })?;
    if !re.is_match(dt_str) {
        return Err(DataAccessError::InvalidPublishedDate {
            dt_str: dt_str.to_string(),
            pattern: expected_pattern.to_string(),
        });
    }
    let base = dt_str.split('.').next().unwrap_or(dt_str);
    let base = base.trim_end_matches('Z');
    let candidate = if base.contains('+') {
        base.to_string()
    } else {
        format!("{base}+00:00")
    };
    let parsed = DateTime::parse_from_rfc3339(&candidate).map_err(|_| {
        DataAccessError::InvalidPublishedDate {
            dt_str: dt_str.to_string(),
            pattern: expected_pattern.to_string(),
        }
    })?;
    Ok(parsed
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Secs, false))
}

/// Date partition (`yyyy/mm/dd`) an article belongs to, from its canonical
/// published date.
pub fn published_date_partition(dt_published: &str) -> Result<String> {
    validate_published_date(dt_published)?;
    let parsed = DateTime::parse_from_rfc3339(dt_published).map_err(|_| {
        DataAccessError::InvalidPublishedDate {
            dt_str: dt_published.to_string(),
            pattern: PUBLISHED_DATE_PATTERN.to_string(),
        }
    })?;
    Ok(parsed
        .with_timezone(&Utc)
        .format(DATE_LEXICOGRAPHIC_FORMAT)
        .to_string())
}

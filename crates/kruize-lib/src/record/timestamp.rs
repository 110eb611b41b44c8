//! Interval timestamp parsing
//!
//! Exports from different tools stamp intervals in different layouts. Each
//! known layout is tried in order and the first that parses wins; nothing is
//! guessed beyond that list. Layouts without an offset are read as UTC, so a
//! zone name in them must be UTC or GMT.

use crate::error::{PipelineError, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

/// Layout the service expects
pub const SERVICE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.000Z";

const UTC_ZONES: &[&str] = &["UTC", "GMT"];

#[derive(Debug, Clone, Copy)]
enum Layout {
    Naive(&'static str),
    WithOffset(&'static str),
    Rfc3339,
}

const LAYOUTS: &[Layout] = &[
    Layout::Naive("%a %b %d %H:%M:%S %Z %Y"),
    Layout::Naive("%Y-%m-%dT%H:%M:%S%.f"),
    Layout::Naive("%a %b %d %H:%M:%S UTC %Y"),
    Layout::Naive("%Y-%m-%d %H:%M:%S %Z"),
    Layout::WithOffset("%Y-%m-%d %H:%M:%S %z %Z"),
    Layout::Rfc3339,
];

impl Layout {
    fn parse(self, input: &str) -> Option<DateTime<Utc>> {
        match self {
            Layout::Naive(fmt) if !zone_is_utc(fmt, input) => None,
            Layout::Naive(fmt) => NaiveDateTime::parse_from_str(input, fmt)
                .ok()
                .map(|naive| naive.and_utc()),
            Layout::WithOffset(fmt) => DateTime::<FixedOffset>::parse_from_str(input, fmt)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Layout::Rfc3339 => DateTime::parse_from_rfc3339(input)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// chrono skips `%Z` tokens without interpreting them
fn zone_is_utc(fmt: &str, input: &str) -> bool {
    fmt.split_whitespace()
        .zip(input.split_whitespace())
        .filter(|(token, _)| *token == "%Z")
        .all(|(_, zone)| UTC_ZONES.contains(&zone))
}

pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();
    LAYOUTS
        .iter()
        .find_map(|layout| layout.parse(trimmed))
        .ok_or_else(|| PipelineError::UnrecognizedDate(input.to_string()))
}

/// Render with whole seconds, as the service expects
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format(SERVICE_FORMAT).to_string()
}

/// Re-stamp an exported timestamp in the service layout
pub fn convert_date_format(input: &str) -> Result<String> {
    parse_timestamp(input).map(|dt| format_timestamp(&dt))
}

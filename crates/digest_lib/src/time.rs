//! Parsing and formatting of the upstream UTC timestamps.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::error::DigestResult;
use crate::internal;

/// Parses an upstream UTC timestamp.
///
/// Accepts the RFC 3339 form emitted by the osu!API (`2023-01-02T03:04:05Z`)
/// and the space-separated form emitted by osu!track (`2023-01-02 03:04:05`),
/// both at second resolution. The space-separated form carries no offset and
/// is taken as UTC.
pub fn parse_utc_timestamp(s: &str) -> DigestResult<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
        return Ok(parsed.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| internal!("unparseable timestamp `{s}`: {e}"))?;
    Ok(naive.and_utc())
}

/// Formats a timestamp the way the stores persist it: ISO-8601 UTC at second
/// resolution, e.g. `2023-01-02T03:04:05Z`.
pub fn format_utc_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

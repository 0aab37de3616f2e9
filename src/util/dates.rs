//! Date normalization for feed entries.
//!
//! Feeds in the wild carry dates in several dialects of RFC 822 and ISO 8601.
//! [`parse_date`] tries a fixed list of layouts in order and converts the
//! first match to UTC.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

/// A date-time layout recognized by the normalizer.
///
/// Order matters: an input that more than one layout accepts is always
/// resolved by the earliest one in [`LAYOUTS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLayout {
    /// `Mon, 2 Jan 2006 15:04:05 +0000`
    Rfc822NumericOffset,
    /// `Mon, 2 Jan 2006 15:04:05 GMT`
    Rfc822NamedZone,
    /// `2006-01-02T15:04:05+07:00`, `2006-01-02T15:04:05.123Z`
    Iso8601,
    /// `02 Jan 2006 15:04:05 +0000` (English month names, weekday omitted)
    Rfc822NoWeekday,
}

/// Layouts in the order they are tried.
pub const LAYOUTS: [DateLayout; 4] = [
    DateLayout::Rfc822NumericOffset,
    DateLayout::Rfc822NamedZone,
    DateLayout::Iso8601,
    DateLayout::Rfc822NoWeekday,
];

impl DateLayout {
    /// Parses `input` with this layout only.
    pub fn parse(self, input: &str) -> Option<DateTime<FixedOffset>> {
        match self {
            DateLayout::Rfc822NumericOffset => {
                DateTime::parse_from_str(input, "%a, %d %b %Y %H:%M:%S %z").ok()
            }
            DateLayout::Rfc822NamedZone => {
                let (rest, zone) = input.rsplit_once(' ')?;
                let offset = FixedOffset::east_opt(named_zone_offset(zone)?)?;
                let naive = NaiveDateTime::parse_from_str(rest, "%a, %d %b %Y %H:%M:%S").ok()?;
                offset.from_local_datetime(&naive).single()
            }
            DateLayout::Iso8601 => DateTime::parse_from_rfc3339(input).ok(),
            DateLayout::Rfc822NoWeekday => {
                DateTime::parse_from_str(input, "%d %b %Y %H:%M:%S %z").ok()
            }
        }
    }
}

/// Offset in seconds east of UTC for the zone abbreviations RFC 822 allows,
/// plus the handful that show up in real feeds.
fn named_zone_offset(zone: &str) -> Option<i32> {
    const HOUR: i32 = 3600;
    let offset = match zone.to_ascii_uppercase().as_str() {
        "UT" | "UTC" | "GMT" | "Z" | "WET" => 0,
        "EST" => -5 * HOUR,
        "EDT" => -4 * HOUR,
        "CST" => -6 * HOUR,
        "CDT" => -5 * HOUR,
        "MST" => -7 * HOUR,
        "MDT" => -6 * HOUR,
        "PST" => -8 * HOUR,
        "PDT" => -7 * HOUR,
        "AKST" => -9 * HOUR,
        "AKDT" => -8 * HOUR,
        "HST" => -10 * HOUR,
        "BST" | "CET" | "WEST" => HOUR,
        "CEST" | "EET" => 2 * HOUR,
        "EEST" | "MSK" => 3 * HOUR,
        "JST" | "KST" => 9 * HOUR,
        "AEST" => 10 * HOUR,
        "AEDT" => 11 * HOUR,
        _ => return None,
    };
    Some(offset)
}

/// Parses a feed date string into a UTC timestamp.
///
/// Returns `None` when no layout matches; callers treat that as an unknown
/// date.
pub fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    LAYOUTS
        .iter()
        .find_map(|layout| layout.parse(input))
        .map(|dt| dt.with_timezone(&Utc))
}

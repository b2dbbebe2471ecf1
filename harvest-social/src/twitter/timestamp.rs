//! Creation timestamp parsing across upstream formats.
use chrono::{DateTime, NaiveDateTime, Utc};

/// `Tue Jan 06 14:54:38 +0000 2026`
const LEGACY_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";
/// `Jan 6, 2026 · 2:54 PM UTC`
const NITTER_FORMAT: &str = "%b %d, %Y · %I:%M %p UTC";

type Parser = fn(&str) -> Option<DateTime<Utc>>;

const PARSERS: &[Parser] = &[parse_legacy, parse_rfc3339, parse_nitter, parse_epoch];

/// First parser that accepts `raw` wins; `None` when every format fails.
pub(crate) fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    PARSERS.iter().find_map(|parse| parse(raw))
}

fn parse_legacy(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, LEGACY_FORMAT)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_nitter(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, NITTER_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn parse_epoch(raw: &str) -> Option<DateTime<Utc>> {
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let secs: i64 = raw.parse().ok()?;
    DateTime::from_timestamp(secs, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_legacy_twitter_format() {
        let dt = parse_created_at("Tue Jan 06 14:54:38 +0000 2026").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2026, 1, 6));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (14, 54, 38));
    }

    #[test]
    fn parses_rfc3339_with_offset() {
        let dt = parse_created_at("2025-09-01T12:00:00+02:00").unwrap();
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn parses_nitter_title() {
        let dt = parse_created_at("Jan 06, 2026 · 02:54 PM UTC").unwrap();
        assert_eq!((dt.month(), dt.day(), dt.hour(), dt.minute()), (1, 6, 14, 54));
    }

    #[test]
    fn parses_epoch_seconds() {
        let dt = parse_created_at("1700000000").unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);
    }

    #[test]
    fn garbage_is_none() {
        assert!(parse_created_at("yesterday-ish").is_none());
        assert!(parse_created_at("   ").is_none());
    }
}

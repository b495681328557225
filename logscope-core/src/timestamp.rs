//! Timestamp normalization
//!
//! Log formats disagree on how they write time. Everything is folded into a
//! `DateTime<Utc>` so the temporal stages can compare entries from any format.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

/// Three-letter month abbreviations shared by the bracketed and syslog forms.
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// 1-based month number for a three-letter abbreviation (case-insensitive).
pub fn month_index(name: &str) -> Option<u32> {
    MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(name))
        .map(|i| i as u32 + 1)
}

#[derive(Debug, Clone)]
pub struct TimestampNormalizer {
    iso_regex: Regex,
    bracketed_regex: Regex,
    syslog_regex: Regex,
    syslog_year: i32,
}

impl TimestampNormalizer {
    /// Syslog timestamps carry no year, so they are placed in the current
    /// year. Logs written last December and read in January land a year late.
    pub fn new() -> Self {
        Self::with_reference_year(Utc::now().year())
    }

    /// Pins the year used for syslog timestamps.
    pub fn with_reference_year(year: i32) -> Self {
        Self {
            iso_regex: Regex::new(
                r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?$",
            )
            .expect("static ISO-8601 pattern"),
            bracketed_regex: Regex::new(
                r"^\[?(\d{1,2})/([A-Za-z]{3})/(\d{4}):(\d{2}):(\d{2}):(\d{2})(?:\s+[+-]\d{4})?\]?$",
            )
            .expect("static bracketed pattern"),
            syslog_regex: Regex::new(r"^([A-Za-z]{3})\s+(\d{1,2})\s+(\d{2}):(\d{2}):(\d{2})$")
                .expect("static syslog pattern"),
            syslog_year: year,
        }
    }

    pub fn reference_year(&self) -> i32 {
        self.syslog_year
    }

    /// Returns `None` for anything unrecognized; callers drop such entries
    /// from temporal analysis instead of failing.
    pub fn normalize(&self, raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if self.iso_regex.is_match(raw) {
            return parse_iso(raw);
        }

        if let Some(caps) = self.bracketed_regex.captures(raw) {
            let day: u32 = caps[1].parse().ok()?;
            let month = month_index(&caps[2])?;
            let year: i32 = caps[3].parse().ok()?;
            return build_utc(year, month, day, &caps[4], &caps[5], &caps[6]);
        }

        if let Some(caps) = self.syslog_regex.captures(raw) {
            let month = month_index(&caps[1])?;
            let day: u32 = caps[2].parse().ok()?;
            return build_utc(self.syslog_year, month, day, &caps[3], &caps[4], &caps[5]);
        }

        None
    }
}

impl Default for TimestampNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_iso(raw: &str) -> Option<DateTime<Utc>> {
    let normalized = raw.replacen(' ', "T", 1);
    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    // No offset: read as UTC
    NaiveDateTime::parse_from_str(normalized.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn build_utc(
    year: i32,
    month: u32,
    day: u32,
    hour: &str,
    minute: &str,
    second: &str,
) -> Option<DateTime<Utc>> {
    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(
        hour.parse().ok()?,
        minute.parse().ok()?,
        second.parse().ok()?,
    )?;
    Some(Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn normalizer() -> TimestampNormalizer {
        TimestampNormalizer::with_reference_year(2023)
    }

    #[test]
    fn test_iso_variants() {
        let n = normalizer();
        let expected = Utc.with_ymd_and_hms(2024, 1, 20, 10, 30, 45).unwrap();

        assert_eq!(n.normalize("2024-01-20T10:30:45Z"), Some(expected));
        assert_eq!(n.normalize("2024-01-20T10:30:45"), Some(expected));
        assert_eq!(n.normalize("2024-01-20 10:30:45"), Some(expected));

        let with_millis = n.normalize("2024-01-20T10:30:45.123Z").unwrap();
        assert_eq!(with_millis.timestamp_subsec_millis(), 123);

        let offset = n.normalize("2024-01-20T12:30:45+02:00").unwrap();
        assert_eq!(offset, expected);
    }

    #[test]
    fn test_bracketed_form_ignores_offset() {
        let n = normalizer();
        let parsed = n.normalize("[10/Dec/2023:10:15:32 +0200]").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2023, 12, 10, 10, 15, 32).unwrap());

        let unbracketed = n.normalize("10/Dec/2023:10:15:32 +0000").unwrap();
        assert_eq!(parsed, unbracketed);
    }

    #[test]
    fn test_syslog_uses_reference_year() {
        let parsed = normalizer().normalize("Oct  3 22:14:15").unwrap();
        assert_eq!(parsed.year(), 2023);
        assert_eq!(parsed.month(), 10);
        assert_eq!(parsed.day(), 3);
        assert_eq!(parsed.hour(), 22);

        let later = TimestampNormalizer::with_reference_year(2025)
            .normalize("Oct  3 22:14:15")
            .unwrap();
        assert_eq!(later.year(), 2025);
    }

    #[test]
    fn test_syslog_defaults_to_current_year() {
        // Year-boundary logs are misattributed; this pins the documented default.
        let parsed = TimestampNormalizer::new().normalize("Jan  1 00:00:00").unwrap();
        assert_eq!(parsed.year(), Utc::now().year());
    }

    #[test]
    fn test_unrecognized_returns_none() {
        let n = normalizer();
        for raw in ["", "yesterday", "10/Foo/2023:10:15:32 +0000", "2024-13-45T99:00:00Z", "1702203332"] {
            assert_eq!(n.normalize(raw), None, "expected None for {:?}", raw);
        }
    }

    #[test]
    fn test_month_lookup() {
        assert_eq!(month_index("Jan"), Some(1));
        assert_eq!(month_index("dec"), Some(12));
        assert_eq!(month_index("Foo"), None);
    }
}

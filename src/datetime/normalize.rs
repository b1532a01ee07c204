//! Lenient datetime parsing and re-formatting.
//!
//! Incoming values come from many hands, so parsing tries ISO 8601 first and
//! then a fixed list of common layouts. Output is always one of the closed set
//! of [`OutputFormat`]s.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use regex::Regex;

use crate::error::DateTimeValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    IsoUtcZ,
    IsoUtcOffset,
    IsoWithTimezone,
    IsoNaiveUtc,
    IsoMillisecondsZ,
    DateIso,
    DateUs,
    DateEu,
    DateCompact,
    Time24h,
    Time24hNoSeconds,
    Time12hAmPm,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 12] = [
        Self::IsoUtcZ,
        Self::IsoUtcOffset,
        Self::IsoWithTimezone,
        Self::IsoNaiveUtc,
        Self::IsoMillisecondsZ,
        Self::DateIso,
        Self::DateUs,
        Self::DateEu,
        Self::DateCompact,
        Self::Time24h,
        Self::Time24hNoSeconds,
        Self::Time12hAmPm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::IsoUtcZ => "ISO_8601_UTC_Z",
            Self::IsoUtcOffset => "ISO_8601_UTC_OFFSET",
            Self::IsoWithTimezone => "ISO_8601_WITH_TIMEZONE",
            Self::IsoNaiveUtc => "ISO_8601_NAIVE_UTC",
            Self::IsoMillisecondsZ => "ISO_8601_MILLISECONDS_Z",
            Self::DateIso => "DATE_ISO",
            Self::DateUs => "DATE_US",
            Self::DateEu => "DATE_EU",
            Self::DateCompact => "DATE_COMPACT",
            Self::Time24h => "TIME_24H",
            Self::Time24hNoSeconds => "TIME_24H_NO_SECONDS",
            Self::Time12hAmPm => "TIME_12H_AMPM",
        }
    }

    /// Render a UTC instant in this format.
    pub fn format(self, dt: &DateTime<Utc>) -> String {
        let pattern = match self {
            Self::IsoUtcZ => "%Y-%m-%dT%H:%M:%SZ",
            Self::IsoUtcOffset | Self::IsoWithTimezone if dt.nanosecond() == 0 => {
                "%Y-%m-%dT%H:%M:%S+00:00"
            }
            Self::IsoUtcOffset | Self::IsoWithTimezone => "%Y-%m-%dT%H:%M:%S%.6f+00:00",
            Self::IsoNaiveUtc => "%Y-%m-%dT%H:%M:%S",
            Self::IsoMillisecondsZ => "%Y-%m-%dT%H:%M:%S%.3fZ",
            Self::DateIso => "%Y-%m-%d",
            Self::DateUs => "%m/%d/%Y",
            Self::DateEu => "%d/%m/%Y",
            Self::DateCompact => "%Y%m%d",
            Self::Time24h => "%H:%M:%S",
            Self::Time24hNoSeconds => "%H:%M",
            Self::Time12hAmPm => "%I:%M:%S %p",
        };
        dt.format(pattern).to_string()
    }

    /// Whether `s` is already written in this format.
    pub fn matches(self, s: &str) -> bool {
        FORMAT_PATTERNS[self as usize].is_match(s)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = DateTimeValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|fmt| fmt.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| DateTimeValidationError::new(format!("Unsupported format type: {s}")))
    }
}

// Indexed by `OutputFormat as usize`.
static FORMAT_PATTERNS: LazyLock<[Regex; 12]> = LazyLock::new(|| {
    [
        r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}Z$",
        r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}\+00:00$",
        r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}[+-][0-9]{2}:[0-9]{2}$",
        r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}$",
        r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}\.[0-9]{3}Z$",
        r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$",
        r"^[0-9]{2}/[0-9]{2}/[0-9]{4}$",
        r"^[0-9]{2}/[0-9]{2}/[0-9]{4}$",
        r"^[0-9]{8}$",
        r"^([01]?[0-9]|2[0-3]):[0-5][0-9]:[0-5][0-9]$",
        r"^([01]?[0-9]|2[0-3]):[0-5][0-9]$",
        r"^(0?[1-9]|1[0-2]):[0-5][0-9]:[0-5][0-9]\s?(AM|PM)$",
    ]
    .map(|pattern| Regex::new(pattern).expect("Invalid output format regex"))
});

#[derive(Clone, Copy)]
enum Layout {
    DateTime,
    Date,
    Time,
}

const FALLBACK_LAYOUTS: &[(&str, Layout)] = &[
    ("%Y-%m-%d %H:%M:%S", Layout::DateTime),
    ("%Y-%m-%d %H:%M", Layout::DateTime),
    ("%m/%d/%Y %H:%M:%S", Layout::DateTime),
    ("%d/%m/%Y %H:%M:%S", Layout::DateTime),
    ("%m/%d/%Y %I:%M:%S %p", Layout::DateTime),
    ("%d/%m/%Y %I:%M:%S %p", Layout::DateTime),
    ("%Y-%m-%d", Layout::Date),
    ("%m/%d/%Y", Layout::Date),
    ("%d/%m/%Y", Layout::Date),
    ("%H:%M:%S", Layout::Time),
    ("%H:%M", Layout::Time),
    ("%I:%M:%S %p", Layout::Time),
    ("%I:%M %p", Layout::Time),
];

const ISO_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Parse a datetime from any of the tolerated layouts.
///
/// Naive input is taken as UTC. Time-only input lands on 1900-01-01.
pub fn parse_datetime_flexible(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if looks_iso(s) {
        if let Some(dt) = parse_iso(s) {
            return Some(dt);
        }
    }

    FALLBACK_LAYOUTS
        .iter()
        .find_map(|(pattern, layout)| parse_layout(s, pattern, *layout))
        .or_else(|| parse_compact_date(s).map(|d| d.and_time(NaiveTime::MIN).and_utc()))
}

/// Parse `input` leniently and render it in `format`. `None` if unparseable.
pub fn normalize_datetime(input: &str, format: OutputFormat) -> Option<String> {
    parse_datetime_flexible(input).map(|dt| format.format(&dt))
}

pub fn is_datetime_valid(input: &str, format: OutputFormat) -> bool {
    normalize_datetime(input, format).is_some()
}

/// Normalize a named field, failing with a message that names it. Empty input
/// passes through untouched.
pub fn validate_datetime_field(
    value: &str,
    field_name: &str,
    format: OutputFormat,
) -> Result<String, DateTimeValidationError> {
    if value.is_empty() {
        return Ok(String::new());
    }
    normalize_datetime(value, format).ok_or_else(|| {
        DateTimeValidationError::new(format!(
            "Invalid {field_name} format: {value}. Expected {format} format."
        ))
    })
}

/// Basic-format `YYYYMMDD`.
pub(crate) fn parse_compact_date(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = s[0..4].parse().ok()?;
    let month = s[4..6].parse().ok()?;
    let day = s[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn looks_iso(s: &str) -> bool {
    let tail_start = s.len().saturating_sub(6);
    let tail = s.get(tail_start..).unwrap_or(s);
    s.contains('T') || s.contains('Z') || tail.contains('+') || tail.contains('-')
}

fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    let with_offset = match s.strip_suffix('Z') {
        Some(stripped) => format!("{stripped}+00:00"),
        None => s.to_string(),
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(&with_offset) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(&with_offset, "%Y-%m-%dT%H:%M%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    ISO_LAYOUTS
        .iter()
        .find_map(|pattern| NaiveDateTime::parse_from_str(s, pattern).ok())
        .map(|naive| naive.and_utc())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        })
}

fn parse_layout(s: &str, pattern: &str, layout: Layout) -> Option<DateTime<Utc>> {
    let naive = match layout {
        Layout::DateTime => NaiveDateTime::parse_from_str(s, pattern).ok()?,
        Layout::Date => NaiveDate::parse_from_str(s, pattern)
            .ok()?
            .and_time(NaiveTime::MIN),
        Layout::Time => {
            let time = NaiveTime::parse_from_str(s, pattern).ok()?;
            NaiveDate::from_ymd_opt(1900, 1, 1)?.and_time(time)
        }
    };
    Some(naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn parses_iso_forms() {
        let expected = utc(2024, 3, 15, 14, 30, 45);
        assert_eq!(parse_datetime_flexible("2024-03-15T14:30:45Z"), Some(expected));
        assert_eq!(parse_datetime_flexible("2024-03-15T11:30:45-03:00"), Some(expected));
        assert_eq!(parse_datetime_flexible("2024-03-15T14:30:45"), Some(expected));
        assert_eq!(parse_datetime_flexible("  2024-03-15T14:30:45Z  "), Some(expected));
        assert_eq!(
            parse_datetime_flexible("2024-03-15"),
            Some(utc(2024, 3, 15, 0, 0, 0))
        );
    }

    #[test]
    fn parses_fallback_layouts() {
        assert_eq!(
            parse_datetime_flexible("2024-03-15 14:30:45"),
            Some(utc(2024, 3, 15, 14, 30, 45))
        );
        assert_eq!(
            parse_datetime_flexible("2024-03-15 14:30"),
            Some(utc(2024, 3, 15, 14, 30, 0))
        );
        assert_eq!(
            parse_datetime_flexible("03/15/2024 02:30:45 PM"),
            Some(utc(2024, 3, 15, 14, 30, 45))
        );
        // Day-first only when month-first is impossible.
        assert_eq!(
            parse_datetime_flexible("15/03/2024"),
            Some(utc(2024, 3, 15, 0, 0, 0))
        );
        assert_eq!(parse_datetime_flexible("20240315"), Some(utc(2024, 3, 15, 0, 0, 0)));
        assert_eq!(parse_datetime_flexible("14:30"), Some(utc(1900, 1, 1, 14, 30, 0)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_datetime_flexible("invalid-date"), None);
        assert_eq!(parse_datetime_flexible(""), None);
        assert_eq!(normalize_datetime("nope", OutputFormat::IsoUtcZ), None);
        assert!(!is_datetime_valid("2024-02-30", OutputFormat::DateIso));
    }

    #[test]
    fn normalizes_into_each_format() {
        let input = "2024-03-15 14:30:45";
        let cases = [
            (OutputFormat::IsoUtcZ, "2024-03-15T14:30:45Z"),
            (OutputFormat::IsoUtcOffset, "2024-03-15T14:30:45+00:00"),
            (OutputFormat::IsoWithTimezone, "2024-03-15T14:30:45+00:00"),
            (OutputFormat::IsoNaiveUtc, "2024-03-15T14:30:45"),
            (OutputFormat::IsoMillisecondsZ, "2024-03-15T14:30:45.000Z"),
            (OutputFormat::DateIso, "2024-03-15"),
            (OutputFormat::DateUs, "03/15/2024"),
            (OutputFormat::DateEu, "15/03/2024"),
            (OutputFormat::DateCompact, "20240315"),
            (OutputFormat::Time24h, "14:30:45"),
            (OutputFormat::Time24hNoSeconds, "14:30"),
            (OutputFormat::Time12hAmPm, "02:30:45 PM"),
        ];
        for (format, expected) in cases {
            let rendered = normalize_datetime(input, format).unwrap();
            assert_eq!(rendered, expected, "{format}");
            assert!(format.matches(&rendered), "{format} pattern rejects {rendered}");
        }
    }

    #[test]
    fn format_names_round_trip() {
        for format in OutputFormat::ALL {
            assert_eq!(format.name().parse::<OutputFormat>().unwrap(), format);
        }
        assert!("ISO_9999".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn validate_field_names_the_field() {
        assert_eq!(
            validate_datetime_field("2024-03-15 14:30:45", "created_at", OutputFormat::IsoUtcZ)
                .unwrap(),
            "2024-03-15T14:30:45Z"
        );
        let err =
            validate_datetime_field("soon", "created_at", OutputFormat::IsoUtcZ).unwrap_err();
        assert_eq!(
            err.0,
            "Invalid created_at format: soon. Expected ISO_8601_UTC_Z format."
        );
        assert_eq!(
            validate_datetime_field("", "created_at", OutputFormat::IsoUtcZ).unwrap(),
            ""
        );
    }

    #[test]
    fn compact_dates_are_checked() {
        assert_eq!(parse_compact_date("20240229"), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(parse_compact_date("20230229"), None);
        assert_eq!(parse_compact_date("2024031"), None);
        assert_eq!(parse_compact_date("2024-3-1"), None);
    }
}

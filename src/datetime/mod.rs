//! Date, datetime, offset and IANA timezone handling.
//!
//! Every date the recurrence engine touches passes through here. The
//! structural checks are regex-shaped on purpose: `2024-13-01` *is* of the
//! `YYYY-MM-DD` format, it just isn't a date. Semantic validation happens when
//! a value is actually converted.

pub mod convert;
pub mod normalize;

use std::fmt;
use std::sync::LazyLock;

use chrono::DateTime;
use chrono_tz::Tz;
use regex::Regex;

use crate::error::DateTimeValidationError;

pub use convert::{
    local_to_utc, parse_instant, timezone_to_offset, utc_to_local, LocalDateTime, UtcDateTime,
};
pub use normalize::{normalize_datetime, parse_datetime_flexible, OutputFormat};

static DATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("Invalid date regex"));
static UTC_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}Z$")
        .expect("Invalid UTC datetime regex")
});
static OFFSET_DATETIME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}[+-][0-9]{2}:[0-9]{2}$")
        .expect("Invalid offset datetime regex")
});
static NAIVE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}$")
        .expect("Invalid naive datetime regex")
});
static OFFSET_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-](?:[01][0-9]|2[0-3]):[0-5][0-9]$").expect("Invalid offset regex")
});

/// Supported date-only layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `YYYY-MM-DD`
    YearMonthDay,
}

/// Supported datetime layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateTimeFormat {
    /// `YYYY-MM-DDTHH:MM:SSZ`
    Utc,
    /// `YYYY-MM-DDTHH:MM:SS±HH:MM`
    Offset,
    /// `YYYY-MM-DDTHH:MM:SS`
    Naive,
}

impl DateTimeFormat {
    pub const ALL: [DateTimeFormat; 3] = [Self::Utc, Self::Offset, Self::Naive];

    fn regex(self) -> &'static Regex {
        match self {
            Self::Utc => &UTC_REGEX,
            Self::Offset => &OFFSET_DATETIME_REGEX,
            Self::Naive => &NAIVE_REGEX,
        }
    }

    /// The layout `s` is written in, if any.
    pub fn detect(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|fmt| fmt.regex().is_match(s))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Utc => "YYYY-MM-DDTHH:MM:SSZ",
            Self::Offset => "YYYY-MM-DDTHH:MM:SS+/-HH:MM",
            Self::Naive => "YYYY-MM-DDTHH:MM:SS",
        }
    }
}

impl fmt::Display for DateTimeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn is_date_of_format(date: &str, format: DateFormat) -> bool {
    match format {
        DateFormat::YearMonthDay => DATE_REGEX.is_match(date),
    }
}

pub fn is_datetime_of_format(date_time: &str, format: DateTimeFormat) -> bool {
    format.regex().is_match(date_time)
}

/// `±HH:MM` with HH in 00..23 and MM in 00..59.
pub fn is_offset_valid(offset: &str) -> bool {
    OFFSET_REGEX.is_match(offset)
}

/// True iff `name` resolves in the IANA timezone database.
pub fn is_timezone_valid(name: &str) -> bool {
    name.parse::<Tz>().is_ok()
}

pub(crate) fn parse_timezone(name: &str) -> Result<Tz, DateTimeValidationError> {
    name.parse::<Tz>()
        .map_err(|_| DateTimeValidationError::new("Invalid timeZone"))
}

/// Validate the `date` / `dateTime` / `timeZone` triple of an incoming event
/// start or end.
///
/// `dateTime` may be any RFC 3339 value or the naive `YYYY-MM-DDTHH:MM:SS`
/// form; the naive form is only meaningful together with a `timeZone`.
pub fn validate_event_datetime(
    date: Option<&str>,
    date_time: Option<&str>,
    time_zone: Option<&str>,
) -> Result<(), DateTimeValidationError> {
    let date = date.filter(|s| !s.is_empty());
    let date_time = date_time.filter(|s| !s.is_empty());
    let time_zone = time_zone.filter(|s| !s.is_empty());

    if let Some(d) = date {
        if !is_date_of_format(d, DateFormat::YearMonthDay) {
            return Err(DateTimeValidationError::new("Invalid date"));
        }
    }
    if let Some(dt) = date_time {
        let rfc3339 = DateTime::parse_from_rfc3339(dt).is_ok();
        if !rfc3339 && !is_datetime_of_format(dt, DateTimeFormat::Naive) {
            return Err(DateTimeValidationError::new("Invalid dateTime"));
        }
    }
    if let Some(tz) = time_zone {
        if !is_timezone_valid(tz) {
            return Err(DateTimeValidationError::new("Invalid timeZone"));
        }
    }
    match (date, date_time) {
        (Some(_), Some(_)) => Err(DateTimeValidationError::new(
            "date and dateTime cannot be provided at the same time",
        )),
        (None, None) => Err(DateTimeValidationError::new(
            "Either date or dateTime must be provided",
        )),
        (None, Some(dt)) if is_datetime_of_format(dt, DateTimeFormat::Naive) && time_zone.is_none() => {
            Err(DateTimeValidationError::new(
                "If timeZone is not provided, dateTime must have timezone information.",
            ))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_format_is_structural_only() {
        assert!(is_date_of_format("2024-03-15", DateFormat::YearMonthDay));
        assert!(is_date_of_format("2024-13-45", DateFormat::YearMonthDay));
        assert!(!is_date_of_format("2024-3-15", DateFormat::YearMonthDay));
        assert!(!is_date_of_format("2024-03-15T00:00:00", DateFormat::YearMonthDay));
    }

    #[test]
    fn datetime_formats() {
        assert!(is_datetime_of_format("2024-03-15T14:30:45Z", DateTimeFormat::Utc));
        assert!(!is_datetime_of_format("2024-03-15 14:30:45", DateTimeFormat::Utc));
        assert!(is_datetime_of_format("2024-03-15T14:30:45-03:00", DateTimeFormat::Offset));
        assert!(!is_datetime_of_format("2024-03-15T14:30:45Z", DateTimeFormat::Offset));
        assert!(is_datetime_of_format("2024-03-15T14:30:45", DateTimeFormat::Naive));
        assert!(!is_datetime_of_format("2024-03-15T14:30:45Z", DateTimeFormat::Naive));
    }

    #[test]
    fn detect_picks_the_matching_layout() {
        assert_eq!(DateTimeFormat::detect("2024-03-15T14:30:45Z"), Some(DateTimeFormat::Utc));
        assert_eq!(
            DateTimeFormat::detect("2024-03-15T14:30:45+05:30"),
            Some(DateTimeFormat::Offset)
        );
        assert_eq!(DateTimeFormat::detect("2024-03-15T14:30:45"), Some(DateTimeFormat::Naive));
        assert_eq!(DateTimeFormat::detect("2024-03-15"), None);
    }

    #[test]
    fn offsets() {
        assert!(is_offset_valid("+03:00"));
        assert!(is_offset_valid("-04:00"));
        assert!(is_offset_valid("+23:59"));
        assert!(!is_offset_valid("+25:00"));
        assert!(!is_offset_valid("+24:00"));
        assert!(!is_offset_valid("+03:000"));
        assert!(!is_offset_valid("+3:00"));
        assert!(!is_offset_valid("03:00"));
        assert!(!is_offset_valid("+03:60"));
    }

    #[test]
    fn timezones() {
        assert!(is_timezone_valid("America/Sao_Paulo"));
        assert!(is_timezone_valid("Europe/London"));
        assert!(is_timezone_valid("UTC"));
        assert!(!is_timezone_valid("invalid_timezone"));
        assert!(!is_timezone_valid(""));
    }

    #[test]
    fn event_datetime_accepts_each_shape() {
        assert!(validate_event_datetime(None, Some("2024-03-15T14:30:45"), Some("America/Sao_Paulo")).is_ok());
        assert!(validate_event_datetime(None, Some("2024-03-15T14:30:45+04:00"), None).is_ok());
        assert!(validate_event_datetime(None, Some("2024-03-15T14:30:45Z"), None).is_ok());
        assert!(validate_event_datetime(Some("2024-03-15"), None, None).is_ok());
    }

    #[test]
    fn event_datetime_rejects_conflicts() {
        let err = validate_event_datetime(Some("2024-03-15"), Some("2024-03-15T10:00:00Z"), None)
            .unwrap_err();
        assert_eq!(err.0, "date and dateTime cannot be provided at the same time");

        let err = validate_event_datetime(None, None, Some("UTC")).unwrap_err();
        assert_eq!(err.0, "Either date or dateTime must be provided");

        let err = validate_event_datetime(None, Some("2024-03-15T14:30:45"), None).unwrap_err();
        assert_eq!(
            err.0,
            "If timeZone is not provided, dateTime must have timezone information."
        );
    }

    #[test]
    fn event_datetime_rejects_bad_values() {
        assert_eq!(
            validate_event_datetime(Some("15/03/2024"), None, None).unwrap_err().0,
            "Invalid date"
        );
        assert_eq!(
            validate_event_datetime(None, Some("yesterday"), None).unwrap_err().0,
            "Invalid dateTime"
        );
        assert_eq!(
            validate_event_datetime(None, Some("2024-03-15T14:30:45Z"), Some("Mars/Base")).unwrap_err().0,
            "Invalid timeZone"
        );
    }
}

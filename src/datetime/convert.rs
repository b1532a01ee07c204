use chrono::{
    DateTime, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeDelta,
    TimeZone, Utc,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::{is_datetime_of_format, is_offset_valid, parse_timezone, DateTimeFormat};
use crate::error::DateTimeValidationError;

pub(crate) const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A wall-clock instant in UTC together with the offset it was written in.
///
/// This is the stored shape of an event start/end: `dateTime` is always the
/// naive UTC value, `offset` is the original local offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtcDateTime {
    pub date_time: String,
    pub offset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

/// An offset-qualified local datetime (`YYYY-MM-DDTHH:MM:SS±HH:MM`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalDateTime {
    pub date_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

/// Convert a local datetime to naive UTC plus offset.
///
/// A `Z` suffix or explicit offset in `date_time` wins over `time_zone`. A
/// naive `date_time` needs `time_zone`, whose offset at that wall-clock time
/// (DST included) is used.
pub fn local_to_utc(
    date_time: &str,
    time_zone: Option<&str>,
) -> Result<UtcDateTime, DateTimeValidationError> {
    if date_time.is_empty() {
        return Err(DateTimeValidationError::new("dateTime must be a string"));
    }
    let time_zone = time_zone.filter(|tz| !tz.is_empty());
    let Some(layout) = DateTimeFormat::detect(date_time) else {
        return Err(DateTimeValidationError::new("Invalid dateTime"));
    };
    let tz = time_zone.map(parse_timezone).transpose()?;

    let wall = parse_naive(&date_time[..19])?;
    let (utc, offset) = match layout {
        DateTimeFormat::Utc => (wall, "+00:00".to_string()),
        DateTimeFormat::Offset => {
            let parsed = DateTime::parse_from_str(date_time, "%Y-%m-%dT%H:%M:%S%:z")
                .map_err(|_| DateTimeValidationError::new("Invalid dateTime"))?;
            (parsed.naive_utc(), date_time[19..].to_string())
        }
        DateTimeFormat::Naive => {
            let Some(tz) = tz else {
                return Err(DateTimeValidationError::new(
                    "If timeZone is not provided, dateTime must have timezone information.",
                ));
            };
            let fixed = resolve_offset(wall, tz);
            (wall - TimeDelta::seconds(i64::from(fixed.local_minus_utc())), format_offset(fixed))
        }
    };

    Ok(UtcDateTime {
        date_time: utc.format(NAIVE_FORMAT).to_string(),
        offset,
        time_zone: time_zone.map(str::to_string),
    })
}

/// Apply the stored offset to a naive UTC value.
///
/// The IANA zone is carried through (and validated) but the offset is
/// authoritative; the zone database is not consulted.
pub fn utc_to_local(value: &UtcDateTime) -> Result<LocalDateTime, DateTimeValidationError> {
    if value.date_time.is_empty() {
        return Err(DateTimeValidationError::new("dateTime must be a string"));
    }
    if value.offset.is_empty() {
        return Err(DateTimeValidationError::new("offset must be a string"));
    }
    if !is_datetime_of_format(&value.date_time, DateTimeFormat::Naive) {
        return Err(DateTimeValidationError::new("Invalid dateTime"));
    }
    let offset = parse_offset(&value.offset)?;
    let time_zone = value.time_zone.as_deref().filter(|tz| !tz.is_empty());
    if let Some(tz) = time_zone {
        parse_timezone(tz)?;
    }

    let utc = parse_naive(&value.date_time)?;
    Ok(LocalDateTime {
        date_time: render_with_offset(utc, offset),
        time_zone: time_zone.map(str::to_string),
    })
}

/// The `±HH:MM` offset in force for `time_zone` at the naive wall-clock
/// `date_time`.
///
/// Ambiguous wall times (DST fall-back) resolve to the earlier offset; wall
/// times inside a DST gap resolve to the offset in force before the gap.
pub fn timezone_to_offset(
    date_time: &str,
    time_zone: &str,
) -> Result<String, DateTimeValidationError> {
    if !is_datetime_of_format(date_time, DateTimeFormat::Naive) {
        return Err(DateTimeValidationError::new("Invalid dateTime"));
    }
    let tz = parse_timezone(time_zone)?;
    let wall = parse_naive(date_time)?;
    Ok(format_offset(resolve_offset(wall, tz)))
}

/// Parse any of the accepted instant spellings into UTC.
///
/// RFC 3339 values are converted; naive datetimes are taken as UTC (the
/// stored form); bare dates mean midnight UTC.
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>, DateTimeValidationError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, NAIVE_FORMAT) {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    Err(DateTimeValidationError::new(format!(
        "Cannot parse datetime: '{s}'. Use ISO 8601 format."
    )))
}

/// Render a naive UTC instant in one of the datetime layouts. `offset` is
/// only used by [`DateTimeFormat::Offset`].
pub fn render_utc(utc: NaiveDateTime, layout: DateTimeFormat, offset: FixedOffset) -> String {
    match layout {
        DateTimeFormat::Utc => utc.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        DateTimeFormat::Offset => render_with_offset(utc, offset),
        DateTimeFormat::Naive => utc.format(NAIVE_FORMAT).to_string(),
    }
}

pub fn parse_offset(offset: &str) -> Result<FixedOffset, DateTimeValidationError> {
    if !is_offset_valid(offset) {
        return Err(DateTimeValidationError::new("Invalid offset"));
    }
    let sign = if offset.starts_with('-') { -1 } else { 1 };
    let hours: i32 = offset[1..3]
        .parse()
        .map_err(|_| DateTimeValidationError::new("Invalid offset"))?;
    let minutes: i32 = offset[4..6]
        .parse()
        .map_err(|_| DateTimeValidationError::new("Invalid offset"))?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| DateTimeValidationError::new("Invalid offset"))
}

pub fn format_offset(offset: FixedOffset) -> String {
    let secs = offset.local_minus_utc();
    let sign = if secs < 0 { '-' } else { '+' };
    let abs = secs.unsigned_abs();
    format!("{sign}{:02}:{:02}", abs / 3600, (abs % 3600) / 60)
}

pub(crate) fn parse_naive(s: &str) -> Result<NaiveDateTime, DateTimeValidationError> {
    NaiveDateTime::parse_from_str(s, NAIVE_FORMAT)
        .map_err(|_| DateTimeValidationError::new("Invalid dateTime"))
}

fn render_with_offset(utc: NaiveDateTime, offset: FixedOffset) -> String {
    offset
        .from_utc_datetime(&utc)
        .format("%Y-%m-%dT%H:%M:%S%:z")
        .to_string()
}

fn resolve_offset(wall: NaiveDateTime, tz: Tz) -> FixedOffset {
    match tz.offset_from_local_datetime(&wall) {
        LocalResult::Single(offset) => offset.fix(),
        LocalResult::Ambiguous(earliest, _) => earliest.fix(),
        // Offsets change at most a few times a year, so a day earlier is
        // always on the far side of the gap.
        LocalResult::None => tz
            .offset_from_utc_datetime(&(wall - TimeDelta::days(1)))
            .fix(),
    }
}

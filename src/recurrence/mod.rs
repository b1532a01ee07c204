//! Recurrence rules: the parsed form of `RRULE:`/`EXDATE:`/`RDATE:` entries,
//! their validation, and expansion into occurrences.

pub mod expander;
pub mod validator;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::datetime::normalize::parse_compact_date;
use crate::error::{DateTimeValidationError, InvalidInputError};

pub use expander::{expand_event, expand_recurring_events};
pub use validator::validate_recurrence_rules;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub const ALL: [Frequency; 7] = [
        Self::Secondly,
        Self::Minutely,
        Self::Hourly,
        Self::Daily,
        Self::Weekly,
        Self::Monthly,
        Self::Yearly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Secondly => "SECONDLY",
            Self::Minutely => "MINUTELY",
            Self::Hourly => "HOURLY",
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }
}

impl FromStr for Frequency {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|freq| freq.as_str().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two-letter RFC 5545 weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Weekday {
    Su,
    #[default]
    Mo,
    Tu,
    We,
    Th,
    Fr,
    Sa,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Self::Su,
        Self::Mo,
        Self::Tu,
        Self::We,
        Self::Th,
        Self::Fr,
        Self::Sa,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Su => "SU",
            Self::Mo => "MO",
            Self::Tu => "TU",
            Self::We => "WE",
            Self::Th => "TH",
            Self::Fr => "FR",
            Self::Sa => "SA",
        }
    }
}

impl FromStr for Weekday {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|day| day.as_str().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `BYDAY` entry such as `MO`, `2TU` or `-1FR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WeekdayNum {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<i8>,
    pub weekday: Weekday,
}

impl fmt::Display for WeekdayNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ordinal {
            Some(n) => write!(f, "{n}{}", self.weekday),
            None => write!(f, "{}", self.weekday),
        }
    }
}

/// An EXDATE, RDATE or UNTIL value in basic format.
///
/// Floating and `Z` values are both read as UTC wall time, the form events
/// are stored in. A date without a time matches the whole day as an EXDATE
/// and means midnight as an RDATE or UNTIL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RecurrenceDate {
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    pub utc: bool,
}

impl RecurrenceDate {
    pub fn is_all_day(&self) -> bool {
        self.time.is_none()
    }

    /// The instant this value names; midnight for date-only values.
    pub fn instant(&self) -> DateTime<Utc> {
        self.date
            .and_time(self.time.unwrap_or(NaiveTime::MIN))
            .and_utc()
    }

    /// Exact match, or same calendar day for date-only values.
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        match self.time {
            Some(_) => at == self.instant(),
            None => at.date_naive() == self.date,
        }
    }

    /// `at` lies beyond this value used as an inclusive upper bound. A
    /// date-only bound is midnight of that date.
    pub fn is_exceeded_by(&self, at: DateTime<Utc>) -> bool {
        at > self.instant()
    }
}

impl FromStr for RecurrenceDate {
    type Err = DateTimeValidationError;

    /// `YYYYMMDD`, `YYYYMMDDTHHMMSS` or `YYYYMMDDTHHMMSSZ`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DateTimeValidationError::new(format!("Invalid date: {s}"));
        let s = s.trim();
        if !s.is_ascii() {
            return Err(invalid());
        }
        let (body, utc) = match s.strip_suffix('Z') {
            Some(body) => (body, true),
            None => (s, false),
        };
        let date = parse_compact_date(body.get(..8).ok_or_else(invalid)?).ok_or_else(invalid)?;
        let time = match &body[8..] {
            "" if !utc => None,
            rest if rest.len() == 7 && rest.starts_with('T') => {
                if !rest[1..].bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                let field = |range: std::ops::Range<usize>| rest[range].parse::<u32>().ok();
                let (Some(hour), Some(minute), Some(second)) = (field(1..3), field(3..5), field(5..7))
                else {
                    return Err(invalid());
                };
                // from_hms_opt rejects second 60, unlike `%S`.
                Some(NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(invalid)?)
            }
            _ => return Err(invalid()),
        };
        Ok(Self { date, time, utc })
    }
}

impl fmt::Display for RecurrenceDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date.format("%Y%m%d"))?;
        if let Some(time) = self.time {
            write!(f, "T{}", time.format("%H%M%S"))?;
        }
        if self.utc {
            f.write_str("Z")?;
        }
        Ok(())
    }
}

/// A validated `RRULE:` body.
///
/// The `by_*` lists are range-checked but do not filter expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RRule {
    pub freq: Frequency,
    pub interval: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<RecurrenceDate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub by_day: Vec<WeekdayNum>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub by_month: Vec<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub by_month_day: Vec<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub by_year_day: Vec<u16>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub by_week_no: Vec<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub by_hour: Vec<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub by_minute: Vec<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub by_second: Vec<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub by_set_pos: Vec<i16>,
    pub wkst: Weekday,
    /// Keys outside the supported set, kept verbatim.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub other: Vec<(String, String)>,
}

impl RRule {
    pub fn new(freq: Frequency) -> Self {
        Self {
            freq,
            interval: 1,
            count: None,
            until: None,
            by_day: Vec::new(),
            by_month: Vec::new(),
            by_month_day: Vec::new(),
            by_year_day: Vec::new(),
            by_week_no: Vec::new(),
            by_hour: Vec::new(),
            by_minute: Vec::new(),
            by_second: Vec::new(),
            by_set_pos: Vec::new(),
            wkst: Weekday::default(),
            other: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "UPPERCASE")]
pub enum RecurrenceRule {
    RRule(RRule),
    ExDate(RecurrenceDate),
    RDate(RecurrenceDate),
}

/// A validated recurrence list grouped by entry kind, each group in input
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecurrenceSet {
    pub rrules: Vec<RRule>,
    pub exdates: Vec<RecurrenceDate>,
    pub rdates: Vec<RecurrenceDate>,
}

impl RecurrenceSet {
    pub fn parse<S: AsRef<str>>(rules: &[S]) -> Result<Self, InvalidInputError> {
        Ok(validate_recurrence_rules(rules)?.into_iter().collect())
    }

    pub fn is_excluded(&self, at: DateTime<Utc>) -> bool {
        self.exdates.iter().any(|exdate| exdate.matches(at))
    }
}

impl FromIterator<RecurrenceRule> for RecurrenceSet {
    fn from_iter<I: IntoIterator<Item = RecurrenceRule>>(iter: I) -> Self {
        let mut set = Self::default();
        for rule in iter {
            match rule {
                RecurrenceRule::RRule(rrule) => set.rrules.push(rrule),
                RecurrenceRule::ExDate(date) => set.exdates.push(date),
                RecurrenceRule::RDate(date) => set.rdates.push(date),
            }
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn recurrence_date_forms() {
        let date: RecurrenceDate = "20240117".parse().unwrap();
        assert!(date.is_all_day());
        assert!(!date.utc);

        let floating: RecurrenceDate = "20240117T090000".parse().unwrap();
        assert_eq!(floating.time, NaiveTime::from_hms_opt(9, 0, 0));
        assert!(!floating.utc);

        let utc: RecurrenceDate = " 20240117T090000Z ".parse().unwrap();
        assert!(utc.utc);
        assert_eq!(utc.instant(), Utc.with_ymd_and_hms(2024, 1, 17, 9, 0, 0).unwrap());
        assert_eq!(utc.to_string(), "20240117T090000Z");
    }

    #[test]
    fn recurrence_date_rejects_other_spellings() {
        for bad in [
            "2024-01-17",
            "20240117Z",
            "20240117T0900",
            "20240117T090000+0100",
            "20241317",
            "20240117T250000",
            "20240117T09000Z",
            "20240117T235960Z",
            "20240117T235960",
            "",
        ] {
            assert!(bad.parse::<RecurrenceDate>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn date_only_matches_whole_day() {
        let day: RecurrenceDate = "20240116".parse().unwrap();
        assert!(day.matches(Utc.with_ymd_and_hms(2024, 1, 16, 0, 0, 0).unwrap()));
        assert!(day.matches(Utc.with_ymd_and_hms(2024, 1, 16, 23, 59, 59).unwrap()));
        assert!(!day.matches(Utc.with_ymd_and_hms(2024, 1, 17, 0, 0, 0).unwrap()));

        let exact: RecurrenceDate = "20240116T090000Z".parse().unwrap();
        assert!(exact.matches(Utc.with_ymd_and_hms(2024, 1, 16, 9, 0, 0).unwrap()));
        assert!(!exact.matches(Utc.with_ymd_and_hms(2024, 1, 16, 9, 0, 1).unwrap()));
    }

    #[test]
    fn until_bound_is_inclusive() {
        let until: RecurrenceDate = "20240120".parse().unwrap();
        assert!(!until.is_exceeded_by(Utc.with_ymd_and_hms(2024, 1, 20, 0, 0, 0).unwrap()));
        assert!(until.is_exceeded_by(Utc.with_ymd_and_hms(2024, 1, 20, 9, 0, 0).unwrap()));

        let until: RecurrenceDate = "20240120T090000Z".parse().unwrap();
        assert!(!until.is_exceeded_by(until.instant()));
        assert!(until.is_exceeded_by(Utc.with_ymd_and_hms(2024, 1, 20, 9, 0, 1).unwrap()));
    }

    #[test]
    fn set_groups_by_kind() {
        let set = RecurrenceSet::parse(&[
            "RRULE:FREQ=DAILY;COUNT=3",
            "EXDATE:20240116T090000Z",
            "RDATE:20240120",
            "RRULE:FREQ=WEEKLY",
        ])
        .unwrap();
        assert_eq!(set.rrules.len(), 2);
        assert_eq!(set.rrules[1].freq, Frequency::Weekly);
        assert_eq!(set.exdates.len(), 1);
        assert_eq!(set.rdates.len(), 1);
        assert!(set.is_excluded(Utc.with_ymd_and_hms(2024, 1, 16, 9, 0, 0).unwrap()));
    }

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("weekly".parse::<Frequency>(), Ok(Frequency::Weekly));
        assert_eq!("Fr".parse::<Weekday>(), Ok(Weekday::Fr));
        assert!("FRI".parse::<Weekday>().is_err());
        assert_eq!(
            WeekdayNum { ordinal: Some(-1), weekday: Weekday::Fr }.to_string(),
            "-1FR"
        );
    }
}

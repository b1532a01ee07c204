use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::datetime::{self, parse_instant, UtcDateTime};
use crate::error::{CadenceError, DateTimeValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Start or end of an event: either an all-day `date` or a `dateTime`.
///
/// Stored events keep `dateTime` as naive UTC plus the original `offset`;
/// incoming events may use any accepted datetime spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    pub fn from_date_time(date_time: impl Into<String>) -> Self {
        Self {
            date_time: Some(date_time.into()),
            ..Default::default()
        }
    }

    pub fn from_date(date: impl Into<String>) -> Self {
        Self {
            date: Some(date.into()),
            ..Default::default()
        }
    }

    pub fn with_offset(mut self, offset: impl Into<String>) -> Self {
        self.offset = Some(offset.into());
        self
    }

    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = Some(time_zone.into());
        self
    }

    pub fn is_date_time(&self) -> bool {
        self.date_time.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn is_all_day(&self) -> bool {
        !self.is_date_time() && self.date.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// Checks for a caller-supplied start/end.
    pub fn validate_input(&self) -> Result<(), DateTimeValidationError> {
        datetime::validate_event_datetime(
            self.date.as_deref(),
            self.date_time.as_deref(),
            self.time_zone.as_deref(),
        )
    }

    /// Checks for the stored shape: naive UTC `dateTime` with its `offset`,
    /// or a bare `date`.
    pub fn validate_stored(&self) -> Result<(), DateTimeValidationError> {
        use crate::datetime::{DateFormat, DateTimeFormat};

        let date = self.date.as_deref().filter(|s| !s.is_empty());
        let date_time = self.date_time.as_deref().filter(|s| !s.is_empty());
        let offset = self.offset.as_deref().filter(|s| !s.is_empty());
        let time_zone = self.time_zone.as_deref().filter(|s| !s.is_empty());

        if date.is_some_and(|d| !datetime::is_date_of_format(d, DateFormat::YearMonthDay)) {
            return Err(DateTimeValidationError::new("Invalid date"));
        }
        if date_time.is_some_and(|dt| !datetime::is_datetime_of_format(dt, DateTimeFormat::Naive)) {
            return Err(DateTimeValidationError::new("Invalid dateTime"));
        }
        if offset.is_some_and(|o| !datetime::is_offset_valid(o)) {
            return Err(DateTimeValidationError::new("Invalid offset"));
        }
        if time_zone.is_some_and(|tz| !datetime::is_timezone_valid(tz)) {
            return Err(DateTimeValidationError::new("Invalid timeZone"));
        }
        match (date, date_time) {
            (Some(_), Some(_)) => Err(DateTimeValidationError::new(
                "date and dateTime cannot be provided at the same time",
            )),
            (None, None) => Err(DateTimeValidationError::new(
                "Either date or dateTime must be provided",
            )),
            (None, Some(_)) if offset.is_none() => Err(DateTimeValidationError::new(
                "If dateTime is provided, offset must be provided.",
            )),
            _ => Ok(()),
        }
    }

    /// Convert a caller-supplied start/end into the stored shape.
    pub fn to_stored(&self) -> Result<Self, DateTimeValidationError> {
        self.validate_input()?;
        let Some(date_time) = self.date_time.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(self.clone());
        };
        let UtcDateTime {
            date_time,
            offset,
            time_zone,
        } = datetime::local_to_utc(date_time, self.time_zone.as_deref())?;
        Ok(Self {
            date: None,
            date_time: Some(date_time),
            offset: Some(offset),
            time_zone,
        })
    }

    /// Render a stored start/end back in local, offset-qualified form.
    pub fn to_local(&self) -> Result<Self, DateTimeValidationError> {
        let (Some(date_time), Some(offset)) = (self.date_time.as_ref(), self.offset.as_ref()) else {
            return Ok(self.clone());
        };
        let local = datetime::utc_to_local(&UtcDateTime {
            date_time: date_time.clone(),
            offset: offset.clone(),
            time_zone: self.time_zone.clone(),
        })?;
        Ok(Self {
            date: None,
            date_time: Some(local.date_time),
            offset: None,
            time_zone: local.time_zone,
        })
    }

    /// The instant this value denotes. All-day values resolve to midnight
    /// UTC of their date.
    pub fn instant(&self) -> Result<DateTime<Utc>, DateTimeValidationError> {
        match (self.date_time.as_deref(), self.date.as_deref()) {
            (Some(dt), _) if !dt.is_empty() => parse_instant(dt),
            (_, Some(d)) if !d.is_empty() => parse_instant(d),
            _ => Err(DateTimeValidationError::new(
                "Either date or dateTime must be provided",
            )),
        }
    }
}

/// A calendar event as the engine sees it.
///
/// Only the time and recurrence fields are interpreted. Everything else the
/// caller sends (summary, attendees, reminders, ...) rides along in `fields`
/// and is reproduced on every occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub id: EventId,
    pub start: EventDateTime,
    pub end: EventDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_event_id: Option<EventId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_start_time: Option<EventDateTime>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// One materialized instance of a recurring event.
pub type Occurrence = Event;

impl Event {
    pub fn new(start: EventDateTime, end: EventDateTime) -> Self {
        Self {
            id: EventId::new(),
            start,
            end,
            recurrence: None,
            recurring_event_id: None,
            original_start_time: None,
            fields: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<EventId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_recurrence<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recurrence = Some(rules.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.as_ref().is_some_and(|rules| !rules.is_empty())
    }

    pub fn duration(&self) -> Result<TimeDelta, DateTimeValidationError> {
        Ok(self.end.instant()? - self.start.instant()?)
    }

    /// Start and end must be the same kind; timed events must end after they
    /// start, all-day events may start and end on the same date.
    pub fn validate_times(&self) -> Result<(), CadenceError> {
        let start = self.start.instant()?;
        let end = self.end.instant()?;
        match (self.start.is_date_time(), self.end.is_date_time()) {
            (true, true) if start >= end => Err(CadenceError::InvalidEvent(
                "Start time must be before end time.".to_string(),
            )),
            (false, false) if end < start => Err(CadenceError::InvalidEvent(
                "Start time must be before end time.".to_string(),
            )),
            (true, false) | (false, true) => Err(CadenceError::InvalidEvent(
                "start and end must both be dates or both be dateTimes".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

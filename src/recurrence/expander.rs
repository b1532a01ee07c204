use std::collections::HashSet;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, TimeDelta, Utc};
use tracing::{debug, warn};

use super::{Frequency, RRule, RecurrenceSet};
use crate::calendar::{Event, EventDateTime, Occurrence, TimeWindow};
use crate::datetime::convert::{parse_offset, render_utc};
use crate::datetime::DateTimeFormat;
use crate::error::CadenceError;

/// Occurrences a rule without COUNT or UNTIL may generate.
pub const DEFAULT_OCCURRENCE_CAP: u32 = 100;
/// Occurrences a rule bounded only by UNTIL may generate.
pub const UNTIL_OCCURRENCE_CAP: u32 = 1000;

/// Expand one event into its occurrences within `window`.
///
/// Events without recurrence, and all-day events, come back as a single
/// unchanged copy. Otherwise every RRULE is stepped from the event start,
/// EXDATEs are removed, RDATEs are added, and the result is deduplicated,
/// sorted by start and cut to `window.max_instances`.
pub fn expand_event(event: &Event, window: &TimeWindow) -> Result<Vec<Occurrence>, CadenceError> {
    let Some(rules) = event.recurrence.as_deref().filter(|rules| !rules.is_empty()) else {
        return Ok(vec![event.clone()]);
    };
    if !(event.start.is_date_time() && event.end.is_date_time()) {
        debug!(event_id = %event.id, "Not expanding all-day recurring event");
        return Ok(vec![event.clone()]);
    }

    let set = RecurrenceSet::parse(rules)?;
    let base = Base::of(event)?;

    let mut starts = Vec::new();
    for rule in &set.rrules {
        starts.extend(rule_starts(rule, base.start, window, &set));
    }
    starts.extend(
        set.rdates
            .iter()
            .map(|rdate| rdate.instant())
            .filter(|start| window.contains(*start)),
    );

    let mut seen = HashSet::new();
    starts.retain(|start| seen.insert(*start));
    starts.sort();
    starts.truncate(window.max_instances);

    debug!(
        event_id = %event.id,
        rrules = set.rrules.len(),
        exdates = set.exdates.len(),
        rdates = set.rdates.len(),
        occurrences = starts.len(),
        "Expanded recurring event"
    );

    Ok(starts
        .into_iter()
        .filter_map(|start| base.occurrence(event, start))
        .collect())
}

/// Expand every event, each under its own `max_instances` cap, keeping input
/// order.
pub fn expand_recurring_events(
    events: &[Event],
    window: &TimeWindow,
) -> Result<Vec<Occurrence>, CadenceError> {
    let mut expanded = Vec::with_capacity(events.len());
    for event in events {
        expanded.extend(expand_event(event, window)?);
    }
    Ok(expanded)
}

/// What every occurrence of one event shares.
struct Base {
    start: DateTime<Utc>,
    duration: TimeDelta,
    original_start: String,
    layout: DateTimeFormat,
    offset: FixedOffset,
}

impl Base {
    fn of(event: &Event) -> Result<Self, CadenceError> {
        let start = event.start.instant()?;
        let end = event.end.instant()?;
        let original_start = event.start.date_time.clone().unwrap_or_default();
        let layout = DateTimeFormat::detect(&original_start).unwrap_or(DateTimeFormat::Utc);
        let offset = match layout {
            DateTimeFormat::Offset => parse_offset(&original_start[19..])?,
            _ => Utc.fix(),
        };
        Ok(Self {
            start,
            duration: end - start,
            original_start,
            layout,
            offset,
        })
    }

    fn render(&self, at: DateTime<Utc>) -> String {
        render_utc(at.naive_utc(), self.layout, self.offset)
    }

    /// `None` when the end falls outside chrono's representable range.
    fn occurrence(&self, event: &Event, start: DateTime<Utc>) -> Option<Occurrence> {
        let Some(end) = start.checked_add_signed(self.duration) else {
            warn!(event_id = %event.id, %start, "Skipping occurrence whose end is out of range");
            return None;
        };
        let mut occurrence = event.clone();
        occurrence.recurrence = None;
        occurrence.start.date_time = Some(self.render(start));
        occurrence.end.date_time = Some(self.render(end));
        occurrence.recurring_event_id = Some(event.id.clone());
        occurrence.original_start_time =
            Some(EventDateTime::from_date_time(self.original_start.clone()));
        Some(occurrence)
    }
}

fn rule_starts(
    rule: &RRule,
    from: DateTime<Utc>,
    window: &TimeWindow,
    set: &RecurrenceSet,
) -> Vec<DateTime<Utc>> {
    let cap = match (rule.count, rule.until) {
        (Some(count), _) => count,
        (None, Some(_)) => UNTIL_OCCURRENCE_CAP,
        (None, None) => DEFAULT_OCCURRENCE_CAP,
    };

    let mut starts = Vec::new();
    let mut current = from;
    let mut generated = 0;
    // Starts ascend; the caller keeps at most `max_instances` of them.
    while generated < cap && starts.len() < window.max_instances {
        if window.ends_by(current) || rule.until.is_some_and(|until| until.is_exceeded_by(current)) {
            break;
        }
        generated += 1;
        if !window.starts_after(current) && !set.is_excluded(current) {
            starts.push(current);
        }
        match advance(current, rule.freq, rule.interval) {
            Some(next) if next > current => current = next,
            _ => {
                warn!(freq = %rule.freq, interval = rule.interval, %current, "Recurrence stopped advancing");
                break;
            }
        }
    }
    starts
}

fn advance(current: DateTime<Utc>, freq: Frequency, interval: u32) -> Option<DateTime<Utc>> {
    let n = i64::from(interval);
    let step = match freq {
        Frequency::Secondly => TimeDelta::try_seconds(n)?,
        Frequency::Minutely => TimeDelta::try_minutes(n)?,
        Frequency::Hourly => TimeDelta::try_hours(n)?,
        Frequency::Daily => TimeDelta::try_days(n)?,
        Frequency::Weekly => TimeDelta::try_weeks(n)?,
        Frequency::Monthly => {
            return add_months(current, n)
                .or_else(|| current.checked_add_signed(TimeDelta::try_days(30 * n)?));
        }
        Frequency::Yearly => {
            return add_months(current, 12 * n)
                .or_else(|| current.checked_add_signed(TimeDelta::try_days(365 * n)?));
        }
    };
    current.checked_add_signed(step)
}

/// Same day-of-month and time, `months` later; `None` when that day does not
/// exist in the target month.
fn add_months(current: DateTime<Utc>, months: i64) -> Option<DateTime<Utc>> {
    let naive = current.naive_utc();
    let total = i64::from(naive.year()) * 12 + i64::from(naive.month0()) + months;
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    let month = u32::try_from(total.rem_euclid(12)).ok()? + 1;
    NaiveDate::from_ymd_opt(year, month, naive.day())
        .map(|date| date.and_time(naive.time()).and_utc())
}

use std::sync::LazyLock;

use regex::Regex;

use super::{Frequency, RRule, RecurrenceDate, RecurrenceRule, Weekday, WeekdayNum};
use crate::error::InvalidInputError;

static BYDAY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-]?[0-9]{1,2})?([A-Za-z]{2})$").expect("Invalid BYDAY regex")
});

/// Longest day of each month, February counted as 29.
const MAX_DAYS_IN_MONTH: [u8; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

const DATE_FORMS: &str = "must be YYYYMMDD, YYYYMMDDTHHMMSS or YYYYMMDDTHHMMSSZ";

/// Parse and validate an ordered recurrence list.
///
/// The first violation aborts the whole list; its error names the entry's
/// index and the offending field.
pub fn validate_recurrence_rules<S: AsRef<str>>(
    rules: &[S],
) -> Result<Vec<RecurrenceRule>, InvalidInputError> {
    rules
        .iter()
        .enumerate()
        .map(|(index, rule)| parse_rule(index, rule.as_ref()))
        .collect::<Result<Vec<_>, _>>()
        .inspect_err(|err| {
            tracing::debug!(index = err.index, field = %err.field, "Rejected recurrence rule: {err}");
        })
}

/// Parse one entry of a recurrence list.
pub fn parse_rule(index: usize, rule: &str) -> Result<RecurrenceRule, InvalidInputError> {
    if let Some(body) = rule.strip_prefix("RRULE:") {
        parse_rrule(index, body).map(RecurrenceRule::RRule)
    } else if let Some(body) = rule.strip_prefix("EXDATE:") {
        parse_date(index, "EXDATE", body).map(RecurrenceRule::ExDate)
    } else if let Some(body) = rule.strip_prefix("RDATE:") {
        parse_date(index, "RDATE", body).map(RecurrenceRule::RDate)
    } else {
        Err(InvalidInputError::new(
            index,
            "RULE",
            "must start with RRULE:, EXDATE: or RDATE:",
        ))
    }
}

/// Parse the body of an `RRULE:` entry.
pub fn parse_rrule(index: usize, body: &str) -> Result<RRule, InvalidInputError> {
    let err = |field: &str, reason: String| InvalidInputError::new(index, field, reason);

    let mut pairs: Vec<(&str, &str)> = Vec::new();
    for part in body.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((key, value)) = part.split_once('=') else {
            return Err(err("RRULE", format!("parameter '{part}' must be KEY=VALUE")));
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() {
            return Err(err("RRULE", format!("parameter '{part}' has an empty key")));
        }
        if pairs.iter().any(|(seen, _)| *seen == key) {
            return Err(err(key, "must not be repeated".to_string()));
        }
        pairs.push((key, value));
    }
    let get = |key: &str| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| *v);

    let freq = match get("FREQ") {
        None => return Err(err("FREQ", "is required".to_string())),
        Some(value) => value.parse::<Frequency>().map_err(|()| {
            let names: Vec<_> = Frequency::ALL.iter().map(|f| f.as_str()).collect();
            err("FREQ", format!("must be one of {}", names.join(", ")))
        })?,
    };
    let mut rule = RRule::new(freq);

    if let Some(value) = get("INTERVAL") {
        rule.interval = parse_positive(value)
            .ok_or_else(|| err("INTERVAL", "must be a positive integer".to_string()))?;
    }
    if let Some(value) = get("COUNT") {
        rule.count = Some(
            parse_positive(value)
                .ok_or_else(|| err("COUNT", "must be a positive integer".to_string()))?,
        );
    }
    if let Some(value) = get("UNTIL") {
        rule.until = Some(
            value
                .parse::<RecurrenceDate>()
                .map_err(|_| err("UNTIL", DATE_FORMS.to_string()))?,
        );
    }
    if let Some(value) = get("BYDAY") {
        rule.by_day = value
            .split(',')
            .map(|item| parse_weekday_num(item.trim()))
            .collect::<Result<_, _>>()
            .map_err(|reason| err("BYDAY", reason))?;
    }
    if let Some(value) = get("BYMONTH") {
        rule.by_month = int_list(index, "BYMONTH", value, 1, 12)?;
    }
    if let Some(value) = get("BYMONTHDAY") {
        rule.by_month_day = int_list(index, "BYMONTHDAY", value, 1, 31)?;
    }
    for &month in &rule.by_month {
        let max = MAX_DAYS_IN_MONTH[usize::from(month - 1)];
        if rule.by_month_day.iter().any(|&day| day > max) {
            return Err(err("BYMONTHDAY", format!("must be 1-{max} for month {month}")));
        }
    }
    if let Some(value) = get("BYYEARDAY") {
        rule.by_year_day = int_list(index, "BYYEARDAY", value, 1, 366)?;
    }
    if let Some(value) = get("BYWEEKNO") {
        rule.by_week_no = int_list(index, "BYWEEKNO", value, 1, 53)?;
    }
    if let Some(value) = get("BYHOUR") {
        rule.by_hour = int_list(index, "BYHOUR", value, 0, 23)?;
    }
    if let Some(value) = get("BYMINUTE") {
        rule.by_minute = int_list(index, "BYMINUTE", value, 0, 59)?;
    }
    if let Some(value) = get("BYSECOND") {
        rule.by_second = int_list(index, "BYSECOND", value, 0, 59)?;
    }
    if let Some(value) = get("BYSETPOS") {
        rule.by_set_pos = value
            .split(',')
            .map(|item| {
                item.trim()
                    .parse::<i16>()
                    .ok()
                    .filter(|n| *n != 0 && (-366..=366).contains(n))
            })
            .collect::<Option<_>>()
            .ok_or_else(|| err("BYSETPOS", "must be 1-366 or -366 to -1".to_string()))?;
    }
    if let Some(value) = get("WKST") {
        rule.wkst = value
            .parse::<Weekday>()
            .map_err(|()| err("WKST", "must be one of SU, MO, TU, WE, TH, FR, SA".to_string()))?;
    }

    rule.other = pairs
        .iter()
        .filter(|(key, _)| !is_known_key(key))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

    Ok(rule)
}

fn parse_date(index: usize, field: &str, body: &str) -> Result<RecurrenceDate, InvalidInputError> {
    body.parse()
        .map_err(|_| InvalidInputError::new(index, field, DATE_FORMS))
}

fn parse_positive(value: &str) -> Option<u32> {
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse::<u32>().ok().filter(|n| *n > 0)
}

fn parse_weekday_num(item: &str) -> Result<WeekdayNum, String> {
    let shape = || "must be a comma-separated list of [+/-n]SU, MO, TU, WE, TH, FR or SA".to_string();
    let caps = BYDAY_REGEX.captures(item).ok_or_else(shape)?;
    let weekday = caps[2].parse::<Weekday>().map_err(|()| shape())?;
    let ordinal = match caps.get(1) {
        None => None,
        Some(m) => {
            let n: i8 = m.as_str().parse().map_err(|_| shape())?;
            if n == 0 || !(-53..=53).contains(&n) {
                return Err(format!("ordinal {n} must be 1-53 or -53 to -1"));
            }
            Some(n)
        }
    };
    Ok(WeekdayNum { ordinal, weekday })
}

fn int_list<T>(
    index: usize,
    field: &str,
    value: &str,
    min: i32,
    max: i32,
) -> Result<Vec<T>, InvalidInputError>
where
    T: TryFrom<i32>,
{
    value
        .split(',')
        .map(|item| {
            item.trim()
                .parse::<i32>()
                .ok()
                .filter(|n| (min..=max).contains(n))
                .and_then(|n| T::try_from(n).ok())
        })
        .collect::<Option<Vec<T>>>()
        .ok_or_else(|| InvalidInputError::new(index, field, format!("must be {min}-{max}")))
}

fn is_known_key(key: &str) -> bool {
    matches!(
        key,
        "FREQ"
            | "INTERVAL"
            | "COUNT"
            | "UNTIL"
            | "BYDAY"
            | "BYMONTH"
            | "BYMONTHDAY"
            | "BYYEARDAY"
            | "BYWEEKNO"
            | "BYHOUR"
            | "BYMINUTE"
            | "BYSECOND"
            | "BYSETPOS"
            | "WKST"
    )
}

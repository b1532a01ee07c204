use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime::parse_instant;
use crate::error::DateTimeValidationError;

/// Per-event cap used when listing a calendar with expanded instances.
pub const DEFAULT_MAX_INSTANCES: usize = 50;

/// The query window occurrences are generated for.
///
/// Half-open: `time_min` is inclusive, `time_max` exclusive. Both bounds are
/// optional; `max_instances` always applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    #[serde(default)]
    pub time_min: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_max: Option<DateTime<Utc>>,
    #[serde(default = "default_max_instances")]
    pub max_instances: usize,
}

fn default_max_instances() -> usize {
    DEFAULT_MAX_INSTANCES
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::unbounded(DEFAULT_MAX_INSTANCES)
    }
}

impl TimeWindow {
    pub fn unbounded(max_instances: usize) -> Self {
        Self {
            time_min: None,
            time_max: None,
            max_instances,
        }
    }

    pub fn new(
        time_min: Option<DateTime<Utc>>,
        time_max: Option<DateTime<Utc>>,
        max_instances: usize,
    ) -> Self {
        Self {
            time_min,
            time_max,
            max_instances,
        }
    }

    /// Build a window from RFC 3339 (or naive UTC) bound strings.
    pub fn parse(
        time_min: Option<&str>,
        time_max: Option<&str>,
        max_instances: usize,
    ) -> Result<Self, DateTimeValidationError> {
        Ok(Self {
            time_min: time_min.map(parse_instant).transpose()?,
            time_max: time_max.map(parse_instant).transpose()?,
            max_instances,
        })
    }

    /// `at` falls before the inclusive lower bound.
    pub fn starts_after(&self, at: DateTime<Utc>) -> bool {
        self.time_min.is_some_and(|min| at < min)
    }

    /// `at` is at or beyond the exclusive upper bound.
    pub fn ends_by(&self, at: DateTime<Utc>) -> bool {
        self.time_max.is_some_and(|max| at >= max)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        !self.starts_after(at) && !self.ends_by(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn bounds_are_half_open() {
        let window = TimeWindow::new(Some(utc(2025, 1, 1, 9)), Some(utc(2025, 1, 1, 17)), 10);
        assert!(window.contains(utc(2025, 1, 1, 9)));
        assert!(window.contains(utc(2025, 1, 1, 16)));
        assert!(!window.contains(utc(2025, 1, 1, 17)));
        assert!(!window.contains(utc(2025, 1, 1, 8)));
        assert!(window.starts_after(utc(2025, 1, 1, 8)));
        assert!(window.ends_by(utc(2025, 1, 1, 17)));
    }

    #[test]
    fn unbounded_contains_everything() {
        let window = TimeWindow::unbounded(5);
        assert!(window.contains(utc(1970, 1, 1, 0)));
        assert!(window.contains(utc(2999, 12, 31, 23)));
    }

    #[test]
    fn parse_accepts_offsets_and_naive() {
        let window =
            TimeWindow::parse(Some("2025-01-01T04:00:00-05:00"), Some("2025-01-02T00:00:00"), 3)
                .unwrap();
        assert_eq!(window.time_min, Some(utc(2025, 1, 1, 9)));
        assert_eq!(window.time_max, Some(utc(2025, 1, 2, 0)));
        assert_eq!(window.max_instances, 3);
        assert!(TimeWindow::parse(Some("tomorrow"), None, 3).is_err());
    }

    #[test]
    fn default_cap() {
        assert_eq!(TimeWindow::default().max_instances, DEFAULT_MAX_INSTANCES);
        let parsed: TimeWindow = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.max_instances, DEFAULT_MAX_INSTANCES);
    }
}

//! Template projection: instantiate a template's time-of-day on a date.
//!
//! Templates are stored as `<anchor-date> HH:MM[:SS]`. Only the time part is
//! meaningful, and its precision must survive projection unchanged.

use std::fmt;

use chrono::{NaiveTime, Timelike};

use crate::error::ProjectionError;
use crate::types::{BoardDate, ScheduledTask, TaskTemplate};

/// Whether a template time was written with seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePrecision {
    Minutes,
    Seconds,
}

impl TimePrecision {
    fn format(self) -> &'static str {
        match self {
            TimePrecision::Minutes => "%H:%M",
            TimePrecision::Seconds => "%H:%M:%S",
        }
    }
}

/// A time of day together with the precision it was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub time: NaiveTime,
    pub precision: TimePrecision,
}

impl TimeOfDay {
    /// Parse the time portion of a template timestamp.
    ///
    /// Everything up to the first whitespace is discarded as the anchor date;
    /// with no whitespace the whole string is the time. `HH:MM:SS` is tried
    /// before `HH:MM`.
    pub fn parse(template: &str) -> Result<Self, ProjectionError> {
        let trimmed = template.trim();
        let time_part = match trimmed.split_once(char::is_whitespace) {
            Some((_date, time)) => time.trim(),
            None => trimmed,
        };

        for precision in [TimePrecision::Seconds, TimePrecision::Minutes] {
            if let Ok(time) = NaiveTime::parse_from_str(time_part, precision.format()) {
                // chrono encodes a `:60` leap second as nanos past one second.
                if time.nanosecond() >= 1_000_000_000 {
                    break;
                }
                return Ok(Self { time, precision });
            }
        }

        Err(ProjectionError::MalformedTimeOfDay {
            input: template.to_owned(),
        })
    }

    /// Render as `<date> <time>` in the original precision.
    pub fn on_date(&self, date: &str) -> String {
        format!("{date} {self}")
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.time.format(self.precision.format()))
    }
}

/// Replace the date part of `template` with `date`, keeping the time and its
/// precision.
///
/// ```
/// use dayboard_core::projector::project_timestamp;
///
/// assert_eq!(
///     project_timestamp("2024-08-06 08:00", "2025-01-01").unwrap(),
///     "2025-01-01 08:00"
/// );
/// ```
pub fn project_timestamp(template: &str, date: &str) -> Result<String, ProjectionError> {
    TimeOfDay::parse(template).map(|time| time.on_date(date))
}

/// Truthiness of a stored `must_review` flag.
pub fn parse_must_review(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "是" | "true" | "1" | "y" | "yes"
    )
}

/// Project every template onto `date`, ordered by template id.
pub fn project_templates(templates: &[TaskTemplate], date: &BoardDate) -> Vec<ScheduledTask> {
    let date = date.to_string();
    let mut scheduled: Vec<ScheduledTask> = templates
        .iter()
        .map(|template| ScheduledTask {
            id: template.id,
            name: template.name.clone(),
            start: template.start.on_date(&date),
            end: template.end.on_date(&date),
            predecessors: template.predecessors.clone(),
            must_review: template.must_review,
        })
        .collect();
    scheduled.sort_by_key(|task| task.id);
    scheduled
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskId;
    use rstest::rstest;

    #[rstest]
    #[case("2024-08-06 08:00", "2025-01-01", "2025-01-01 08:00")]
    #[case("2024-08-06 08:00:30", "2025-01-01", "2025-01-01 08:00:30")]
    #[case("2024-08-06 08:00:00", "2025-01-01", "2025-01-01 08:00:00")]
    #[case("09:50", "2025-03-04", "2025-03-04 09:50")]
    #[case("  2024-08-06   23:59:59  ", "2025-03-04", "2025-03-04 23:59:59")]
    fn projects_preserving_precision(
        #[case] template: &str,
        #[case] date: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(project_timestamp(template, date).expect("project"), expected);
    }

    #[rstest]
    #[case("")]
    #[case("2024-08-06")]
    #[case("2024-08-06 8am")]
    #[case("2024-08-06 25:00")]
    #[case("2024-08-06 08:00:30:10")]
    #[case("2024-08-06 08:61")]
    #[case("2024-08-06 08:00:60")]
    #[case("23:59:60")]
    fn rejects_malformed_time(#[case] template: &str) {
        let err = project_timestamp(template, "2025-01-01").unwrap_err();
        assert!(matches!(err, ProjectionError::MalformedTimeOfDay { .. }));
    }

    #[test]
    fn reprojection_is_independent_of_prior_projection() {
        for template in ["2024-08-06 08:15", "2024-08-06 10:40:05"] {
            let once = project_timestamp(template, "2025-01-01").expect("first");
            let twice = project_timestamp(&once, "2026-02-02").expect("second");
            let direct = project_timestamp(template, "2026-02-02").expect("direct");
            assert_eq!(twice, direct);
        }
    }

    #[test]
    fn minute_precision_never_gains_seconds() {
        let out = project_timestamp("2024-08-06 08:00", "2025-01-01").expect("project");
        assert_eq!(out.matches(':').count(), 1);
    }

    #[rstest]
    #[case("是", true)]
    #[case("TRUE", true)]
    #[case("1", true)]
    #[case("Yes", true)]
    #[case(" y ", true)]
    #[case("否", false)]
    #[case("", false)]
    #[case("0", false)]
    #[case("no", false)]
    fn must_review_truthiness(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(parse_must_review(value), expected);
    }

    #[test]
    fn timetable_is_sorted_and_dated() {
        let template = |id: u32, start: &str| TaskTemplate {
            id: TaskId(id),
            name: format!("T{id}"),
            start: TimeOfDay::parse(start).expect("start"),
            end: TimeOfDay::parse("2024-08-06 11:00").expect("end"),
            predecessors: vec![],
            must_review: false,
        };
        let templates = vec![template(2, "2024-08-06 08:10"), template(1, "2024-08-06 08:00:05")];
        let date: BoardDate = "2025-01-01".parse().expect("date");

        let timetable = project_templates(&templates, &date);
        assert_eq!(timetable[0].id, TaskId(1));
        assert_eq!(timetable[0].start, "2025-01-01 08:00:05");
        assert_eq!(timetable[1].start, "2025-01-01 08:10");
        assert_eq!(timetable[1].end, "2025-01-01 11:00");
    }
}

//! Domain types for the Dayboard status model.
//!
//! Stored shapes (`TemplateRecord`) keep the raw strings they were seeded
//! with. Everything else is parsed: flags are `bool`, predecessor lists are
//! `Vec<String>`, times are [`TimeOfDay`].

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, StoreError};
use crate::projector::{parse_must_review, TimeOfDay};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable integer identifier of a task template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u32);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u32> for TaskId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// A calendar date, always rendered as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BoardDate(NaiveDate);

impl BoardDate {
    pub const FORMAT: &'static str = "%Y-%m-%d";

    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl FromStr for BoardDate {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // chrono accepts unpadded fields; the canonical form is exactly 10 chars.
        if trimmed.len() != 10 {
            return Err(CoreError::InvalidDate {
                input: s.to_owned(),
            });
        }
        NaiveDate::parse_from_str(trimmed, Self::FORMAT)
            .map(Self)
            .map_err(|_| CoreError::InvalidDate {
                input: s.to_owned(),
            })
    }
}

impl TryFrom<String> for BoardDate {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<BoardDate> for String {
    fn from(date: BoardDate) -> Self {
        date.to_string()
    }
}

impl fmt::Display for BoardDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// A template row exactly as stored in `templates.yaml`.
///
/// `start`/`end` carry an arbitrary anchor date; `predecessor` is a
/// JSON-encoded list of task names; `must_review` is a locale flag string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub id: TaskId,
    pub name: String,
    pub start: String,
    pub end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predecessor: Option<String>,
    #[serde(default = "default_must_review")]
    pub must_review: String,
}

fn default_must_review() -> String {
    "否".to_owned()
}

/// A parsed, immutable schedule template for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTemplate {
    pub id: TaskId,
    pub name: String,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub predecessors: Vec<String>,
    pub must_review: bool,
}

impl TryFrom<&TemplateRecord> for TaskTemplate {
    type Error = StoreError;

    fn try_from(record: &TemplateRecord) -> Result<Self, Self::Error> {
        let parse_time = |raw: &str| {
            TimeOfDay::parse(raw).map_err(|source| StoreError::Template {
                id: record.id,
                source,
            })
        };
        Ok(Self {
            id: record.id,
            name: record.name.clone(),
            start: parse_time(&record.start)?,
            end: parse_time(&record.end)?,
            predecessors: parse_predecessors(record.predecessor.as_deref()),
            must_review: parse_must_review(&record.must_review),
        })
    }
}

/// Decode the JSON predecessor list; anything undecodable counts as empty.
pub fn parse_predecessors(raw: Option<&str>) -> Vec<String> {
    match raw.map(str::trim) {
        Some(json) if !json.is_empty() => serde_json::from_str(json).unwrap_or_default(),
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Completion/review flags for one task on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStatus {
    pub date: BoardDate,
    pub task_id: TaskId,
    pub completed: bool,
    pub reviewed: bool,
}

impl DailyStatus {
    /// The implicit status of a task with no stored row.
    pub fn unrecorded(date: BoardDate, task_id: TaskId) -> Self {
        Self {
            date,
            task_id,
            completed: false,
            reviewed: false,
        }
    }
}

/// One requested flag change, also the element type of [`ChangeEvent::changes`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub task_id: TaskId,
    pub completed: bool,
    pub reviewed: bool,
}

impl From<&DailyStatus> for StatusChange {
    fn from(status: &DailyStatus) -> Self {
        Self {
            task_id: status.task_id,
            completed: status.completed,
            reviewed: status.reviewed,
        }
    }
}

/// Ephemeral notification pushed to live listeners. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub date: BoardDate,
    pub changes: Vec<StatusChange>,
    /// Millisecond wall clock; non-decreasing within a process, ties allowed.
    #[serde(rename = "seq")]
    pub sequence: u64,
}

// ---------------------------------------------------------------------------
// Read models
// ---------------------------------------------------------------------------

/// A template projected onto a concrete date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub name: String,
    pub start: String,
    pub end: String,
    pub predecessors: Vec<String>,
    pub must_review: bool,
}

/// One row of a [`DaySnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub id: TaskId,
    pub name: String,
    pub must_review: bool,
    pub completed: bool,
    pub reviewed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayStats {
    pub total: usize,
    pub done_reviewed: usize,
    pub done_unreviewed: usize,
    pub undone: usize,
    pub must_review_undone: usize,
}

/// Baseline for reconciliation: every template with its status on `date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySnapshot {
    pub date: BoardDate,
    pub list: Vec<StatusEntry>,
    pub stats: DayStats,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_date_parses_and_displays_canonically() {
        let date: BoardDate = "2025-01-01".parse().expect("parse");
        assert_eq!(date.to_string(), "2025-01-01");
    }

    #[test]
    fn board_date_rejects_other_shapes() {
        for bad in ["2025-1-1", "01/01/2025", "2025-13-01", "", "today"] {
            assert!(bad.parse::<BoardDate>().is_err(), "accepted '{bad}'");
        }
    }

    #[test]
    fn change_event_uses_seq_on_the_wire() {
        let event = ChangeEvent {
            date: "2025-01-01".parse().expect("date"),
            changes: vec![StatusChange {
                task_id: TaskId(3),
                completed: true,
                reviewed: false,
            }],
            sequence: 1000,
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "date": "2025-01-01",
                "changes": [{"task_id": 3, "completed": true, "reviewed": false}],
                "seq": 1000
            })
        );
    }

    #[test]
    fn predecessors_tolerate_missing_and_garbage() {
        assert!(parse_predecessors(None).is_empty());
        assert!(parse_predecessors(Some("")).is_empty());
        assert!(parse_predecessors(Some("not json")).is_empty());
        assert_eq!(
            parse_predecessors(Some(r#"["T1","T3","T2"]"#)),
            vec!["T1", "T3", "T2"]
        );
    }

    #[test]
    fn template_record_parses_once_at_boundary() {
        let record = TemplateRecord {
            id: TaskId(5),
            name: "T5".into(),
            start: "2024-08-06 10:00".into(),
            end: "2024-08-06 10:40".into(),
            predecessor: Some(r#"["T4"]"#.into()),
            must_review: "是".into(),
        };
        let template = TaskTemplate::try_from(&record).expect("template");
        assert!(template.must_review);
        assert_eq!(template.predecessors, vec!["T4"]);
        assert_eq!(template.start.to_string(), "10:00");
    }

    #[test]
    fn template_record_with_bad_time_names_the_task() {
        let record = TemplateRecord {
            id: TaskId(9),
            name: "broken".into(),
            start: "2024-08-06 8am".into(),
            end: "2024-08-06 09:00".into(),
            predecessor: None,
            must_review: "否".into(),
        };
        let err = TaskTemplate::try_from(&record).unwrap_err();
        assert!(matches!(err, StoreError::Template { id: TaskId(9), .. }));
    }
}

//! Status store port and its in-process implementation.
//!
//! The store is the authoritative source for templates and per-date status
//! rows. The live fan-out engine never reads from it; clients fetch a
//! snapshot through it for baseline reconciliation.
//!
//! # Storage layout (see [`crate::file_store`])
//!
//! ```text
//! ~/.dayboard/
//!   templates.yaml
//!   state/<YYYY-MM-DD>.yaml
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::StoreError;
use crate::projector::project_templates;
use crate::snapshot::build_snapshot;
use crate::types::{
    BoardDate, DailyStatus, DaySnapshot, ScheduledTask, StatusChange, TaskId, TaskTemplate,
    TemplateRecord,
};

/// Read/write access to templates and daily status rows.
///
/// Single-row upserts are atomic; no cross-row transactions are offered.
pub trait StatusStore: Send + Sync {
    /// All templates, parsed, ordered by id.
    fn templates(&self) -> Result<Vec<TaskTemplate>, StoreError>;

    /// Stored rows for `date`. Tasks without rows are simply absent.
    fn read_status_rows(&self, date: &BoardDate) -> Result<Vec<DailyStatus>, StoreError>;

    /// Upsert one status row and return what was persisted.
    ///
    /// Fails with [`StoreError::UnknownTask`] when no template has that id.
    fn write_status(
        &self,
        date: &BoardDate,
        change: &StatusChange,
    ) -> Result<DailyStatus, StoreError>;

    /// Templates projected onto `date`.
    fn timetable(&self, date: &BoardDate) -> Result<Vec<ScheduledTask>, StoreError> {
        Ok(project_templates(&self.templates()?, date))
    }

    /// Every template with its status on `date`, plus summary stats.
    fn snapshot(&self, date: &BoardDate) -> Result<DaySnapshot, StoreError> {
        let templates = self.templates()?;
        let rows = self.read_status_rows(date)?;
        Ok(build_snapshot(&templates, &rows, date))
    }
}

/// `<home>/.dayboard/`
pub fn board_root(home: &Path) -> PathBuf {
    home.join(".dayboard")
}

/// Resolve the current user's home directory.
pub fn home() -> Result<PathBuf, StoreError> {
    dirs::home_dir().ok_or(StoreError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    rows: BTreeMap<(BoardDate, TaskId), DailyStatus>,
}

/// Process-local store; contents vanish with the process.
pub struct MemoryStatusStore {
    templates: Vec<TaskTemplate>,
    state: Mutex<MemoryState>,
}

impl MemoryStatusStore {
    pub fn new(records: &[TemplateRecord]) -> Result<Self, StoreError> {
        let mut templates = records
            .iter()
            .map(TaskTemplate::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        templates.sort_by_key(|t| t.id);
        Ok(Self {
            templates,
            state: Mutex::new(MemoryState::default()),
        })
    }

    /// A store holding the built-in sample templates and statuses.
    pub fn seeded() -> Result<Self, StoreError> {
        let store = Self::new(&crate::seed::sample_templates())?;
        for status in crate::seed::sample_statuses() {
            store.write_status(&status.date, &StatusChange::from(&status))?;
        }
        Ok(store)
    }
}

impl StatusStore for MemoryStatusStore {
    fn templates(&self) -> Result<Vec<TaskTemplate>, StoreError> {
        Ok(self.templates.clone())
    }

    fn read_status_rows(&self, date: &BoardDate) -> Result<Vec<DailyStatus>, StoreError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(state
            .rows
            .values()
            .filter(|row| row.date == *date)
            .cloned()
            .collect())
    }

    fn write_status(
        &self,
        date: &BoardDate,
        change: &StatusChange,
    ) -> Result<DailyStatus, StoreError> {
        if !self.templates.iter().any(|t| t.id == change.task_id) {
            return Err(StoreError::UnknownTask(change.task_id));
        }
        let status = DailyStatus {
            date: *date,
            task_id: change.task_id,
            completed: change.completed,
            reviewed: change.reviewed,
        };
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.rows.insert((*date, change.task_id), status.clone());
        Ok(status)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> BoardDate {
        s.parse().expect("date")
    }

    fn change(id: u32, completed: bool, reviewed: bool) -> StatusChange {
        StatusChange {
            task_id: TaskId(id),
            completed,
            reviewed,
        }
    }

    #[test]
    fn latest_write_wins() {
        let store = MemoryStatusStore::seeded().expect("store");
        let day = date("2025-01-01");
        store.write_status(&day, &change(3, true, false)).expect("first");
        store.write_status(&day, &change(3, true, true)).expect("second");

        let rows = store.read_status_rows(&day).expect("rows");
        assert_eq!(rows.len(), 1);
        assert!(rows[0].completed && rows[0].reviewed);
    }

    #[test]
    fn unknown_task_is_rejected_without_writing() {
        let store = MemoryStatusStore::seeded().expect("store");
        let day = date("2025-01-01");
        let err = store.write_status(&day, &change(42, true, true)).unwrap_err();
        assert!(matches!(err, StoreError::UnknownTask(TaskId(42))));
        assert_eq!(err.to_string(), "task 42 not exists");
        assert!(store.read_status_rows(&day).expect("rows").is_empty());
    }

    #[test]
    fn snapshot_defaults_unrecorded_tasks() {
        let store = MemoryStatusStore::seeded().expect("store");
        let snapshot = store.snapshot(&date("2030-05-05")).expect("snapshot");
        assert_eq!(snapshot.stats.total, 5);
        assert_eq!(snapshot.stats.undone, 5);
        assert_eq!(snapshot.stats.must_review_undone, 2);
    }

    #[test]
    fn timetable_projects_onto_requested_date() {
        let store = MemoryStatusStore::seeded().expect("store");
        let timetable = store.timetable(&date("2025-01-01")).expect("timetable");
        assert_eq!(timetable[0].start, "2025-01-01 08:00");
        assert_eq!(timetable[3].predecessors, vec!["T1", "T3", "T2"]);
    }
}

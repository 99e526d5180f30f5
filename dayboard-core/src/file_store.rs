//! YAML-backed [`StatusStore`].
//!
//! # Storage layout
//!
//! ```text
//! ~/.dayboard/
//!   templates.yaml          (list of TemplateRecord, mode 0600)
//!   state/
//!     <YYYY-MM-DD>.yaml     (one document per date, mode 0600)
//! ```
//!
//! Every write goes to a `.tmp` sibling, is chmod'ed, then renamed over the
//! target, so readers never observe a half-written document.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::seed::{sample_statuses, sample_templates};
use crate::store::{board_root, StatusStore};
use crate::types::{BoardDate, DailyStatus, StatusChange, TaskId, TaskTemplate, TemplateRecord};

/// On-disk status document for one date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StateDocument {
    #[serde(default)]
    rows: Vec<StateRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StateRow {
    task_id: TaskId,
    completed: bool,
    reviewed: bool,
}

pub struct FileStatusStore {
    home: PathBuf,
    /// Serializes read-modify-write of state documents within this process.
    write_lock: Mutex<()>,
}

impl FileStatusStore {
    /// Store rooted at `<home>/.dayboard/`. No I/O happens until first use.
    pub fn open_at(home: &Path) -> Self {
        Self {
            home: home.to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// `<home>/.dayboard/templates.yaml`
    pub fn templates_path(&self) -> PathBuf {
        board_root(&self.home).join("templates.yaml")
    }

    /// `<home>/.dayboard/state/<date>.yaml`
    pub fn state_path(&self, date: &BoardDate) -> PathBuf {
        board_root(&self.home)
            .join("state")
            .join(format!("{date}.yaml"))
    }

    /// Raw template rows as stored. Missing file → empty list.
    pub fn template_records(&self) -> Result<Vec<TemplateRecord>, StoreError> {
        let path = self.templates_path();
        let Some(contents) = read_optional(&path)? else {
            return Ok(Vec::new());
        };
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        let mut records: Vec<TemplateRecord> = serde_yaml::from_str(&contents)
            .map_err(|source| StoreError::Parse { path, source })?;
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    pub fn save_templates(&self, records: &[TemplateRecord]) -> Result<(), StoreError> {
        let yaml = serde_yaml::to_string(records)?;
        write_atomic(&self.templates_path(), &yaml)
    }

    /// Write the sample board if no templates exist yet.
    ///
    /// Returns `true` when seeding happened. Idempotent.
    pub fn seed_if_empty(&self) -> Result<bool, StoreError> {
        if !self.template_records()?.is_empty() {
            return Ok(false);
        }
        self.save_templates(&sample_templates())?;
        for status in sample_statuses() {
            self.write_status(&status.date, &StatusChange::from(&status))?;
        }
        Ok(true)
    }

    fn load_state(&self, date: &BoardDate) -> Result<StateDocument, StoreError> {
        let path = self.state_path(date);
        let Some(contents) = read_optional(&path)? else {
            return Ok(StateDocument::default());
        };
        if contents.trim().is_empty() {
            return Ok(StateDocument::default());
        }
        serde_yaml::from_str(&contents).map_err(|source| StoreError::Parse { path, source })
    }
}

impl StatusStore for FileStatusStore {
    fn templates(&self) -> Result<Vec<TaskTemplate>, StoreError> {
        self.template_records()?
            .iter()
            .map(TaskTemplate::try_from)
            .collect()
    }

    fn read_status_rows(&self, date: &BoardDate) -> Result<Vec<DailyStatus>, StoreError> {
        Ok(self
            .load_state(date)?
            .rows
            .into_iter()
            .map(|row| DailyStatus {
                date: *date,
                task_id: row.task_id,
                completed: row.completed,
                reviewed: row.reviewed,
            })
            .collect())
    }

    fn write_status(
        &self,
        date: &BoardDate,
        change: &StatusChange,
    ) -> Result<DailyStatus, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if !self
            .template_records()?
            .iter()
            .any(|record| record.id == change.task_id)
        {
            return Err(StoreError::UnknownTask(change.task_id));
        }

        let mut document = self.load_state(date)?;
        let row = StateRow {
            task_id: change.task_id,
            completed: change.completed,
            reviewed: change.reviewed,
        };
        match document.rows.iter_mut().find(|r| r.task_id == change.task_id) {
            Some(existing) => *existing = row,
            None => document.rows.push(row),
        }
        document.rows.sort_by_key(|r| r.task_id);

        let yaml = serde_yaml::to_string(&document)?;
        write_atomic(&self.state_path(date), &yaml)?;

        Ok(DailyStatus {
            date: *date,
            task_id: change.task_id,
            completed: change.completed,
            reviewed: change.reviewed,
        })
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

/// Write flow: `<name>.tmp` sibling → `chmod 0600` → `rename`.
fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid store path")));
    };
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        set_dir_permissions(dir)?;
    }

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{file_name}.tmp"));
    std::fs::write(&tmp, contents).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(s: &str) -> BoardDate {
        s.parse().expect("date")
    }

    #[test]
    fn state_path_is_per_date() {
        let home = TempDir::new().expect("home");
        let store = FileStatusStore::open_at(home.path());
        assert!(store
            .state_path(&date("2025-01-01"))
            .ends_with(".dayboard/state/2025-01-01.yaml"));
    }

    #[test]
    fn empty_store_has_no_templates() {
        let home = TempDir::new().expect("home");
        let store = FileStatusStore::open_at(home.path());
        assert!(store.templates().expect("templates").is_empty());
        assert!(store
            .read_status_rows(&date("2025-01-01"))
            .expect("rows")
            .is_empty());
    }

    #[test]
    fn seed_is_idempotent() {
        let home = TempDir::new().expect("home");
        let store = FileStatusStore::open_at(home.path());
        assert!(store.seed_if_empty().expect("seed"));
        assert!(!store.seed_if_empty().expect("seed again"));
        assert_eq!(store.templates().expect("templates").len(), 5);
        assert_eq!(
            store
                .read_status_rows(&date("2024-08-06"))
                .expect("rows")
                .len(),
            5
        );
    }

    #[test]
    fn write_leaves_no_tmp_file() {
        let home = TempDir::new().expect("home");
        let store = FileStatusStore::open_at(home.path());
        store.seed_if_empty().expect("seed");
        let day = date("2025-01-01");
        store
            .write_status(
                &day,
                &StatusChange {
                    task_id: TaskId(1),
                    completed: true,
                    reviewed: false,
                },
            )
            .expect("write");

        let path = store.state_path(&day);
        assert!(path.exists());
        assert!(!path.with_file_name("2025-01-01.yaml.tmp").exists());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }
}

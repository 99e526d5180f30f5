//! `dayboard set <task_id> [--completed] [--reviewed] [--date D]`
//!
//! Goes through the daemon when it is running so live listeners are
//! notified; otherwise writes the file store directly.

use anyhow::{Context, Result};
use clap::Args;

use dayboard_core::{BoardDate, DailyStatus, StatusChange, StatusStore, TaskId};
use dayboard_daemon::{request_set, DaemonError};

/// Record completion/review flags for one task.
#[derive(Args, Debug)]
pub struct SetArgs {
    /// Template id of the task.
    pub task_id: u32,

    /// Mark the task completed (omitted means not completed).
    #[arg(long)]
    pub completed: bool,

    /// Mark the task reviewed (omitted means not reviewed).
    #[arg(long)]
    pub reviewed: bool,

    /// Date as YYYY-MM-DD. Defaults to today in the configured offset.
    #[arg(long)]
    pub date: Option<BoardDate>,
}

impl SetArgs {
    pub fn run(self) -> Result<()> {
        if self.task_id == 0 {
            anyhow::bail!("need task_id");
        }
        let home = super::home_dir()?;
        let date = super::resolve_date(&home, self.date)?;
        let change = StatusChange {
            task_id: TaskId(self.task_id),
            completed: self.completed,
            reviewed: self.reviewed,
        };

        let (persisted, via) = match request_set(&home, &date, &change) {
            Ok(persisted) => (persisted, "daemon"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                let store = super::open_store(&home)?;
                let persisted = store
                    .write_status(&date, &change)
                    .with_context(|| format!("failed to update task {}", change.task_id))?;
                (persisted, "store")
            }
            Err(err) => return Err(err).context("daemon rejected the update"),
        };

        println!("✓ {} (via {via})", describe(&persisted));
        Ok(())
    }
}

fn describe(status: &DailyStatus) -> String {
    format!(
        "task {} on {}: {}, {}",
        status.task_id,
        status.date,
        if status.completed { "completed" } else { "not completed" },
        if status.reviewed { "reviewed" } else { "not reviewed" },
    )
}

//! `dayboard tasks [--date D] [--json]`

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use dayboard_core::{BoardDate, ScheduledTask, StatusStore};

/// Show the task templates projected onto a date.
#[derive(Args, Debug)]
pub struct TasksArgs {
    /// Date as YYYY-MM-DD. Defaults to today in the configured offset.
    #[arg(long)]
    pub date: Option<BoardDate>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "id")]
    id: u32,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "start")]
    start: String,
    #[tabled(rename = "end")]
    end: String,
    #[tabled(rename = "after")]
    predecessors: String,
    #[tabled(rename = "review")]
    must_review: String,
}

impl TasksArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home_dir()?;
        let date = super::resolve_date(&home, self.date)?;
        let store = super::open_store(&home)?;
        let timetable = store
            .timetable(&date)
            .with_context(|| format!("failed to build timetable for {date}"))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&timetable)
                    .context("failed to serialize timetable JSON")?
            );
            return Ok(());
        }

        print_table(&date, timetable);
        Ok(())
    }
}

fn print_table(date: &BoardDate, timetable: Vec<ScheduledTask>) {
    println!("{} {}", "Timetable".bold(), date);
    if timetable.is_empty() {
        println!("No tasks.");
        return;
    }

    let rows: Vec<TaskRow> = timetable
        .into_iter()
        .map(|task| TaskRow {
            id: task.id.0,
            name: task.name,
            start: task.start,
            end: task.end,
            predecessors: if task.predecessors.is_empty() {
                "-".to_string()
            } else {
                task.predecessors.join(", ")
            },
            must_review: if task.must_review { "yes" } else { "no" }.to_string(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

//! `dayboard state [--date D] [--json]`: one day's snapshot and stats.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use dayboard_core::{BoardDate, DaySnapshot, StatusEntry, StatusStore};

/// Show every task's status on a date, with summary stats.
#[derive(Args, Debug)]
pub struct StateArgs {
    /// Date as YYYY-MM-DD. Defaults to today in the configured offset.
    #[arg(long)]
    pub date: Option<BoardDate>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct StateRow {
    #[tabled(rename = "id")]
    id: u32,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "must review")]
    must_review: String,
}

impl StateArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home_dir()?;
        let date = super::resolve_date(&home, self.date)?;
        let store = super::open_store(&home)?;
        let snapshot = store
            .snapshot(&date)
            .with_context(|| format!("failed to load state for {date}"))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&snapshot)
                    .context("failed to serialize state JSON")?
            );
            return Ok(());
        }

        print_table(&date, snapshot);
        Ok(())
    }
}

fn print_table(date: &BoardDate, snapshot: DaySnapshot) {
    let stats = &snapshot.stats;
    println!(
        "{} {} | {} tasks | {} done+reviewed | {} done | {} undone | {} awaiting review",
        "State".bold(),
        date,
        stats.total,
        stats.done_reviewed.to_string().green(),
        stats.done_unreviewed.to_string().yellow(),
        stats.undone.to_string().red(),
        stats.must_review_undone,
    );

    let rows: Vec<StateRow> = snapshot
        .list
        .iter()
        .map(|entry| StateRow {
            id: entry.id.0,
            name: entry.name.clone(),
            status: status_label(entry).to_string(),
            must_review: if entry.must_review { "yes" } else { "no" }.to_string(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn status_label(entry: &StatusEntry) -> &'static str {
    match (entry.completed, entry.reviewed) {
        (true, true) => "DONE + REVIEWED",
        (true, false) => "DONE",
        (false, true) => "REVIEWED",
        (false, false) => "UNDONE",
    }
}

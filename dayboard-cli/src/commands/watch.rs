//! `dayboard watch [--date D]`

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use clap::Args;
use colored::Colorize;

use dayboard_core::{BoardDate, ChangeEvent};
use dayboard_daemon::{open_stream, DaemonError, StreamRecord};

/// Print live status changes pushed by the daemon.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Date as YYYY-MM-DD. Defaults to today in the configured offset.
    #[arg(long)]
    pub date: Option<BoardDate>,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home_dir()?;
        let date = super::resolve_date(&home, self.date)?;
        let offset = super::load_config(&home)?
            .offset()
            .context("invalid utc_offset_minutes in config")?;

        let stream = match open_stream(&home, &date) {
            Ok(stream) => stream,
            Err(DaemonError::DaemonNotRunning { .. }) => {
                anyhow::bail!("daemon is not running; start it with `dayboard daemon start`")
            }
            Err(err) => return Err(err).context("failed to open live stream"),
        };

        for record in stream {
            match record.context("failed to read live stream")? {
                StreamRecord::Connected { date } => {
                    println!("{} watching {date} (ctrl-c to stop)", "●".green().bold());
                }
                // The daemon streams every date; show only ours.
                StreamRecord::Event(event) if event.date == date => {
                    for line in format_event(&event, offset) {
                        println!("{line}");
                    }
                }
                StreamRecord::Event(_) => {}
            }
        }
        println!("daemon closed the stream");
        Ok(())
    }
}

fn format_event(event: &ChangeEvent, offset: FixedOffset) -> Vec<String> {
    let at = i64::try_from(event.sequence)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|at| at.with_timezone(&offset).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| event.sequence.to_string());
    event
        .changes
        .iter()
        .map(|change| {
            let flag = |on: bool, label: &str| {
                if on {
                    label.green().to_string()
                } else {
                    format!("not {label}").bright_black().to_string()
                }
            };
            format!(
                "[{at}] task {}: {}, {}",
                change.task_id,
                flag(change.completed, "completed"),
                flag(change.reviewed, "reviewed"),
            )
        })
        .collect()
}

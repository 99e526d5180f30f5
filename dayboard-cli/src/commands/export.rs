//! `dayboard export templates|state`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use dayboard_core::{
    export::{state_csv, state_file_name, templates_csv, TEMPLATES_FILE_NAME},
    BoardDate, StatusStore,
};

#[derive(Subcommand, Debug)]
pub enum ExportCommand {
    /// Stored task templates as CSV.
    Templates(TemplatesExportArgs),
    /// One day's stored status rows as CSV.
    State(StateExportArgs),
}

#[derive(Args, Debug)]
pub struct TemplatesExportArgs {
    /// Write to this file instead of stdout. A directory gets `fixed_tasks.csv`.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct StateExportArgs {
    /// Date as YYYY-MM-DD. Defaults to today in the configured offset.
    #[arg(long)]
    pub date: Option<BoardDate>,

    /// Write to this file instead of stdout. A directory gets `state_<date>.csv`.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

pub fn run(command: ExportCommand) -> Result<()> {
    let home = super::home_dir()?;
    let store = super::open_store(&home)?;

    match command {
        ExportCommand::Templates(args) => {
            let records = store
                .template_records()
                .context("failed to read task templates")?;
            emit(&templates_csv(&records), args.output, TEMPLATES_FILE_NAME)
        }
        ExportCommand::State(args) => {
            let date = super::resolve_date(&home, args.date)?;
            let rows = store
                .read_status_rows(&date)
                .with_context(|| format!("failed to read state for {date}"))?;
            emit(&state_csv(&date, &rows), args.output, &state_file_name(&date))
        }
    }
}

fn emit(csv: &str, output: Option<PathBuf>, default_name: &str) -> Result<()> {
    let Some(output) = output else {
        print!("{csv}");
        return Ok(());
    };
    let path = target_path(&output, default_name);
    std::fs::write(&path, csv).with_context(|| format!("failed to write {}", path.display()))?;
    println!("✓ Wrote {}", path.display());
    Ok(())
}

fn target_path(output: &Path, default_name: &str) -> PathBuf {
    if output.is_dir() {
        output.join(default_name)
    } else {
        output.to_path_buf()
    }
}

pub mod daemon;
pub mod export;
pub mod init;
pub mod set;
pub mod state;
pub mod tasks;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use dayboard_core::{BoardConfig, BoardDate, FileStatusStore};

pub fn home_dir() -> Result<PathBuf> {
    dayboard_core::store::home().context("could not determine home directory")
}

pub fn load_config(home: &Path) -> Result<BoardConfig> {
    BoardConfig::load_at(home).with_context(|| {
        format!(
            "failed to load {}",
            BoardConfig::path_at(home).display()
        )
    })
}

/// `--date` if given, else today in the configured UTC offset.
pub fn resolve_date(home: &Path, date: Option<BoardDate>) -> Result<BoardDate> {
    match date {
        Some(date) => Ok(date),
        None => load_config(home)?
            .today()
            .context("invalid utc_offset_minutes in config"),
    }
}

/// Open the file store and make sure it has templates to show.
pub fn open_store(home: &Path) -> Result<FileStatusStore> {
    let store = FileStatusStore::open_at(home);
    let records = store
        .template_records()
        .with_context(|| format!("failed to read {}", store.templates_path().display()))?;
    if records.is_empty() {
        anyhow::bail!("no task templates found; run `dayboard init` first");
    }
    Ok(store)
}

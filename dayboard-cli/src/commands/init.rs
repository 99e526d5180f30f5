//! `dayboard init`

use anyhow::{Context, Result};
use clap::Args;

use dayboard_core::FileStatusStore;

/// Seed the store with the sample board if it is empty.
#[derive(Args, Debug)]
pub struct InitArgs {}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home_dir()?;
        let store = FileStatusStore::open_at(&home);
        let seeded = store
            .seed_if_empty()
            .with_context(|| format!("failed to seed {}", store.templates_path().display()))?;

        let count = store
            .template_records()
            .context("failed to read templates after seeding")?
            .len();
        if seeded {
            println!("✓ Seeded sample board with {count} tasks");
        } else {
            println!("Store already has {count} task templates; nothing to do");
        }
        println!("  Templates: {}", store.templates_path().display());
        Ok(())
    }
}

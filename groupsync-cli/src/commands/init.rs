//! `groupsync init`

use anyhow::{Context, Result};
use clap::Args;

use groupsync_core::config;

/// Write a commented config skeleton.
#[derive(Args, Debug)]
pub struct InitArgs {}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let (path, created) = config::init_at(&home)
            .with_context(|| format!("failed to write config under {}", home.display()))?;

        if created {
            println!("✓ Wrote config skeleton to {}", path.display());
            println!("  Fill in the directory and monitoring sections, then run `groupsync plan`.");
        } else {
            println!("· Config already exists at {}; left unchanged", path.display());
        }
        Ok(())
    }
}

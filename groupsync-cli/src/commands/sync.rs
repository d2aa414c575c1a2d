//! `groupsync sync`: apply the reconciliation to the monitoring system.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use tracing::{debug, warn};

use groupsync_engine::{pipeline, run_log, RunRecord, SyncError, SyncReport};

/// Arguments for `groupsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Config file (default: ~/.groupsync/config.yaml).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Show what would be written without changing the monitoring system.
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let (home, config) = super::load_config(self.config.as_deref())?;

        if self.dry_run {
            let (report, writes) = super::plan::preview(&config)?;
            super::plan::print_plan(&report, &writes);
            return Ok(());
        }

        let options = super::sync_options(&config)?;
        let (mut directory, mut monitoring) = super::connect(&config)?;

        let started_at = Utc::now();
        let result = pipeline::run(&mut directory, &mut monitoring, &options);
        super::disconnect(directory, monitoring);

        let record = RunRecord::from_result(started_at, &result);
        let saved = run_log::save_at(&home, &record);
        let report = settle(result, saved)?;
        print_report(&report);
        Ok(())
    }
}

/// A sync failure outranks a run-log failure; the latter is only logged then.
fn settle(
    result: Result<SyncReport, SyncError>,
    saved: Result<PathBuf, SyncError>,
) -> Result<SyncReport> {
    match (result, saved) {
        (Ok(report), Ok(path)) => {
            debug!(path = %path.display(), "run log written");
            Ok(report)
        }
        (Ok(_), Err(save_err)) => Err(save_err).context("failed to write run log"),
        (Err(err), saved) => {
            if let Err(save_err) = saved {
                warn!(error = %save_err, "failed to write run log");
            }
            Err(err).context("sync failed")
        }
    }
}

fn print_report(report: &SyncReport) {
    if report.is_noop() && report.conflicts.is_empty() {
        println!(
            "✓ {} directory groups already in sync, nothing to do",
            report.counts.directory_groups
        );
        return;
    }

    println!(
        "✓ synced {} directory groups ({} groups created, {} users created, {} groups updated)",
        report.counts.directory_groups,
        report.counts.groups_created,
        report.counts.users_created,
        report.counts.memberships_updated,
    );
    for group in &report.created_groups {
        println!("  {} group   {group}", "+".green());
    }
    for alias in &report.created_users {
        println!("  {} user    {alias}", "+".green());
    }
    for group in &report.updated_groups {
        println!("  {} members {group}", "~".yellow());
    }
    for conflict in &report.conflicts {
        println!("  {} skipped: {conflict}", "!".red().bold());
    }
}

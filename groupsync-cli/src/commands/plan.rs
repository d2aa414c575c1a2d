//! `groupsync plan`: dry-run the full pipeline and list the writes it implies.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use groupsync_core::{Config, MappingConflict};
use groupsync_engine::{pipeline, PlannedWrite, PlanningMonitor, SyncReport};

/// Arguments for `groupsync plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Config file (default: ~/.groupsync/config.yaml).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl PlanArgs {
    pub fn run(self) -> Result<()> {
        let (_, config) = super::load_config(self.config.as_deref())?;
        let (report, writes) = preview(&config)?;
        if self.json {
            print_json(&report, writes)
        } else {
            print_plan(&report, &writes);
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct PlanJson<'a> {
    writes: Vec<PlannedWrite>,
    conflicts: &'a [MappingConflict],
}

/// Run the staged pipeline against a simulated monitoring side.
pub(crate) fn preview(config: &Config) -> Result<(SyncReport, Vec<PlannedWrite>)> {
    let options = super::sync_options(config)?;
    let (mut directory, mut monitoring) = super::connect(config)?;

    let mut planner = PlanningMonitor::new(&mut monitoring);
    let result = pipeline::run(&mut directory, &mut planner, &options);
    let writes = planner.into_writes();
    super::disconnect(directory, monitoring);

    let report = result.context("planning failed")?;
    Ok((report, writes))
}

fn print_json(report: &SyncReport, writes: Vec<PlannedWrite>) -> Result<()> {
    let payload = PlanJson {
        writes,
        conflicts: &report.conflicts,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize plan JSON")?
    );
    Ok(())
}

pub(crate) fn print_plan(report: &SyncReport, writes: &[PlannedWrite]) {
    let prefix = "[dry-run] ";
    if writes.is_empty() {
        println!("{prefix}✓ in sync, nothing to do");
    }

    for write in writes {
        match write {
            PlannedWrite::CreateGroup { name } => {
                println!("{prefix}{} group   {name}", "+".green());
            }
            PlannedWrite::CreateUser {
                alias,
                display_name,
                groups,
            } => {
                let groups: Vec<&str> = groups.iter().map(|g| g.0.as_str()).collect();
                println!(
                    "{prefix}{} user    {alias} ({display_name}) → {}",
                    "+".green(),
                    groups.join(", ")
                );
            }
            PlannedWrite::UpdateMembers {
                group,
                added,
                removed,
            } => {
                let mut delta: Vec<String> = added
                    .iter()
                    .map(|a| format!("+{a}").green().to_string())
                    .collect();
                delta.extend(removed.iter().map(|a| format!("-{a}").red().to_string()));
                println!("{prefix}{} members {group}: {}", "~".yellow(), delta.join(" "));
            }
        }
    }

    for conflict in &report.conflicts {
        println!("{prefix}{} skipped: {conflict}", "!".red().bold());
    }
    println!(
        "{prefix}{} groups, {} users to create; {} groups to update",
        report.counts.groups_created, report.counts.users_created, report.counts.memberships_updated
    );
}

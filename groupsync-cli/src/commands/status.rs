//! `groupsync status`: outcome of the last recorded sync run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use groupsync_engine::{run_log, Outcome, RunRecord};

/// Arguments for `groupsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let last = run_log::load_at(&home).context("failed to read run log")?;

        if self.json {
            let payload = StatusJson { last_run: last };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        match last {
            Some(record) => print_table(&record),
            None => println!("No sync run recorded yet. Run `groupsync sync`."),
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusJson {
    last_run: Option<RunRecord>,
}

#[derive(Tabled)]
struct StageRow {
    #[tabled(rename = "stage")]
    stage: &'static str,
    #[tabled(rename = "applied")]
    applied: usize,
}

fn print_table(record: &RunRecord) {
    let outcome = match record.outcome {
        Outcome::Succeeded => "SUCCEEDED".green().bold(),
        Outcome::Failed => "FAILED".red().bold(),
    };
    let took = record
        .finished_at
        .signed_duration_since(record.started_at)
        .num_milliseconds()
        .max(0);
    println!(
        "groupsync v{} | last run {} ago | {outcome} in {took} ms",
        env!("CARGO_PKG_VERSION"),
        format_age(record.finished_at),
    );
    if let Some(err) = &record.error {
        println!("  {}", err.red());
    }

    let rows = vec![
        StageRow {
            stage: "directory groups",
            applied: record.counts.directory_groups,
        },
        StageRow {
            stage: "groups created",
            applied: record.counts.groups_created,
        },
        StageRow {
            stage: "users created",
            applied: record.counts.users_created,
        },
        StageRow {
            stage: "memberships updated",
            applied: record.counts.memberships_updated,
        },
    ];
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    for conflict in &record.conflicts {
        println!("{} skipped: {conflict}", "!".yellow().bold());
    }
}

fn format_age(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0);
    match seconds {
        s if s < 60 => format!("{s}s"),
        s if s < 60 * 60 => format!("{}m", s / 60),
        s if s < 60 * 60 * 24 => format!("{}h", s / (60 * 60)),
        s => format!("{}d", s / (60 * 60 * 24)),
    }
}

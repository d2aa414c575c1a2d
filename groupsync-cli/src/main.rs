//! groupsync: mirror directory groups into monitoring user groups.
//!
//! # Usage
//!
//! ```text
//! groupsync init
//! groupsync sync [--dry-run] [--config PATH]
//! groupsync plan [--json] [--config PATH]
//! groupsync status [--json]
//! ```

mod commands;
mod logging;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{init::InitArgs, plan::PlanArgs, status::StatusArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "groupsync",
    version,
    about = "Synchronize Active Directory groups into Zabbix user groups",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a commented config skeleton to ~/.groupsync/config.yaml.
    Init(InitArgs),

    /// Create missing groups and users, then reconcile group membership.
    Sync(SyncArgs),

    /// Show every write a sync would perform, without performing it.
    Plan(PlanArgs),

    /// Show the outcome of the last sync run.
    Status(StatusArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Plan(args) => args.run(),
        Commands::Status(args) => args.run(),
    }
}

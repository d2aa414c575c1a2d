//! # groupsync-engine
//!
//! Reconciliation of directory groups into monitoring user groups.
//!
//! The [`engine`] passes are pure functions over two snapshots. [`StagedRun`]
//! enforces their order, [`pipeline::run`] applies their work orders through
//! the providers, and [`PlanningMonitor`] lets the same pipeline run as a dry
//! run.

pub mod engine;
pub mod error;
pub mod pipeline;
pub mod planning;
pub mod run_log;
pub mod stage;

pub use engine::{groups_to_create, membership_updates, users_to_create};
pub use error::{EngineError, SyncError};
pub use pipeline::{run, SyncCounts, SyncOptions, SyncReport};
pub use planning::{PlannedWrite, PlanningMonitor};
pub use run_log::{Outcome, RunRecord};
pub use stage::{Stage, StagedRun};

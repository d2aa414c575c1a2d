//! Sync pipeline: drives a [`StagedRun`] against live providers.
//!
//! The pipeline owns the write side. After each pass it applies the work
//! orders through the monitoring provider and re-reads the monitoring
//! snapshot before the next pass, so every pass sees the effects of the
//! previous one.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use groupsync_core::{
    Alias, DirectoryProvider, GroupFilter, GroupName, MappingConflict, MonitoringId,
    MonitoringProvider, MonitoringSnapshot, NameMappingPolicy, NewUser, Plan,
};

use crate::error::SyncError;
use crate::stage::StagedRun;

/// Inputs of one sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub policy: NameMappingPolicy,
    pub filter: GroupFilter,
    /// Monitoring group every created user also joins.
    pub default_group: GroupName,
}

/// Number of work orders applied per stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub directory_groups: usize,
    pub groups_created: usize,
    pub users_created: usize,
    pub memberships_updated: usize,
}

/// What a completed run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub counts: SyncCounts,
    pub created_groups: Vec<GroupName>,
    pub created_users: Vec<Alias>,
    pub updated_groups: Vec<GroupName>,
    /// Mapping conflicts skipped by any pass, without repeats.
    pub conflicts: Vec<MappingConflict>,
}

impl SyncReport {
    fn absorb<T>(&mut self, plan: &Plan<T>) {
        for conflict in &plan.conflicts {
            if !self.conflicts.contains(conflict) {
                warn!(mapped_name = %conflict.mapped_name(), "skipping: {conflict}");
                self.conflicts.push(conflict.clone());
            }
        }
    }

    pub fn is_noop(&self) -> bool {
        self.created_groups.is_empty()
            && self.created_users.is_empty()
            && self.updated_groups.is_empty()
    }
}

/// Run one full synchronization.
///
/// Any provider failure or precondition violation stops the run at once;
/// writes already applied stay applied and a re-run picks up from there.
pub fn run<D, M>(
    directory: &mut D,
    monitoring: &mut M,
    options: &SyncOptions,
) -> Result<SyncReport, SyncError>
where
    D: DirectoryProvider + ?Sized,
    M: MonitoringProvider + ?Sized,
{
    let groups = directory.snapshot(&options.filter)?;
    info!(groups = groups.len(), "loaded directory snapshot");

    let mut report = SyncReport::default();
    report.counts.directory_groups = groups.len();

    let mut staged = StagedRun::new(options.policy.clone(), groups);
    match apply(&mut staged, monitoring, options, &mut report) {
        Ok(()) => Ok(report),
        Err(err) => {
            staged.abort();
            Err(err)
        }
    }
}

fn apply<M>(
    staged: &mut StagedRun,
    monitoring: &mut M,
    options: &SyncOptions,
    report: &mut SyncReport,
) -> Result<(), SyncError>
where
    M: MonitoringProvider + ?Sized,
{
    // ---- groups ----
    let snapshot = monitoring.snapshot()?;
    let plan = staged.resolve_groups(&snapshot)?;
    report.absorb(&plan);
    for order in &plan.orders {
        let id = monitoring.create_user_group(&order.mapped_name)?;
        info!(group = %order.mapped_name, %id, "created monitoring group");
        report.created_groups.push(order.mapped_name.clone());
    }

    let default_id = ensure_default_group(monitoring, &options.default_group, report)?;

    // ---- users ----
    let snapshot = monitoring.snapshot()?;
    let plan = staged.resolve_users(&snapshot)?;
    report.absorb(&plan);
    for order in &plan.orders {
        let mut group_ids = order.target_group_ids.clone();
        if !group_ids.contains(&default_id) {
            group_ids.push(default_id.clone());
        }
        let user = NewUser {
            alias: order.alias.clone(),
            display_name: order.display_name.clone(),
            group_ids,
        };
        let id = monitoring.create_user(&user)?;
        info!(alias = %user.alias, %id, groups = user.group_ids.len(), "created monitoring user");
        report.created_users.push(user.alias);
    }

    // ---- membership ----
    let snapshot = monitoring.snapshot()?;
    let plan = staged.resolve_membership(&snapshot)?;
    report.absorb(&plan);
    for order in &plan.orders {
        let current = current_member_ids(&snapshot, &order.group_id);
        let members = order.resulting_members(&current);
        monitoring.update_user_group_members(&order.group_id, &members)?;
        info!(
            group = %order.group_name,
            added = order.add_user_ids.len(),
            removed = order.remove_user_ids.len(),
            "updated group membership"
        );
        report.updated_groups.push(order.group_name.clone());
    }

    staged.finish()?;

    report.counts.groups_created = report.created_groups.len();
    report.counts.users_created = report.created_users.len();
    report.counts.memberships_updated = report.updated_groups.len();
    Ok(())
}

/// Id of the default group, creating it when the monitoring side lacks it.
fn ensure_default_group<M>(
    monitoring: &mut M,
    name: &GroupName,
    report: &mut SyncReport,
) -> Result<MonitoringId, SyncError>
where
    M: MonitoringProvider + ?Sized,
{
    match monitoring.find_user_group(name) {
        Ok(id) => {
            debug!(group = %name, %id, "default group present");
            Ok(id)
        }
        Err(err) if err.is_not_found() => {
            let id = monitoring.create_user_group(name)?;
            info!(group = %name, %id, "created default group");
            report.created_groups.push(name.clone());
            Ok(id)
        }
        Err(err) => Err(err.into()),
    }
}

fn current_member_ids(snapshot: &MonitoringSnapshot, group: &MonitoringId) -> BTreeSet<MonitoringId> {
    snapshot
        .groups
        .iter()
        .find(|g| &g.id == group)
        .map(|g| g.member_ids())
        .unwrap_or_default()
}

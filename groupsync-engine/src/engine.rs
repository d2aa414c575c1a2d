//! Reconciliation passes.
//!
//! Three pure functions over a directory snapshot and a monitoring snapshot.
//! None of them touches a provider; each returns a [`Plan`] of work orders
//! plus the mapping conflicts it had to skip.
//!
//! Matching rule: a directory group corresponds to the monitoring group whose
//! name equals the directory name mapped through [`NameMappingPolicy`]. The
//! mapping must be injective over the participating directory groups and the
//! mapped name must be carried by at most one monitoring group; anything else
//! is reported as a [`MappingConflict`] and left alone.

use std::collections::{BTreeSet, HashMap, HashSet};

use groupsync_core::{
    Alias, DirectoryGroup, DirectoryUser, GroupName, MappingConflict, MonitoringGroup,
    MonitoringId, MonitoringSnapshot, NameMappingPolicy, PendingGroupCreation,
    PendingMembershipUpdate, PendingUserCreation, Plan,
};

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// a. groups_to_create
// ---------------------------------------------------------------------------

/// Monitoring groups to create: every mapped name no monitoring group carries.
///
/// Output follows the directory list order. The same directory group listed
/// twice yields one request.
pub fn groups_to_create(
    policy: &NameMappingPolicy,
    directory: &[DirectoryGroup],
    monitoring: &MonitoringSnapshot,
) -> Plan<PendingGroupCreation> {
    let index = MappingIndex::build(policy, directory);
    let mut plan = Plan {
        orders: Vec::new(),
        conflicts: index.conflicts.clone(),
    };

    for group in &index.groups {
        match find_monitoring_group(monitoring, &group.mapped_name) {
            Lookup::Missing => plan.orders.push(PendingGroupCreation {
                mapped_name: group.mapped_name.clone(),
            }),
            Lookup::Unique(_) => {}
            Lookup::Duplicate(conflict) => plan.conflicts.push(conflict),
        }
    }
    plan
}

// ---------------------------------------------------------------------------
// b. users_to_create
// ---------------------------------------------------------------------------

/// Directory members unknown to the monitoring side, each with the ids of
/// every monitoring group it must join.
///
/// Every group that contributes a missing member must already exist on the
/// monitoring side; otherwise the groups stage was skipped and the call fails
/// with [`EngineError::UnresolvedGroup`].
pub fn users_to_create(
    policy: &NameMappingPolicy,
    directory: &[DirectoryGroup],
    monitoring: &MonitoringSnapshot,
) -> Result<Plan<PendingUserCreation>, EngineError> {
    let index = MappingIndex::build(policy, directory);
    let known: HashSet<&Alias> = monitoring.all_users().map(|u| &u.alias).collect();

    let mut plan = Plan {
        orders: Vec::new(),
        conflicts: index.conflicts.clone(),
    };
    let mut position: HashMap<&Alias, usize> = HashMap::new();

    for group in &index.groups {
        let missing: Vec<&DirectoryUser> = group
            .members()
            .filter(|m| !known.contains(&m.alias))
            .collect();
        if missing.is_empty() {
            continue;
        }

        let target = match find_monitoring_group(monitoring, &group.mapped_name) {
            Lookup::Unique(target) => target,
            Lookup::Missing => return Err(group.unresolved()),
            Lookup::Duplicate(conflict) => {
                plan.conflicts.push(conflict);
                continue;
            }
        };

        for member in missing {
            let slot = *position.entry(&member.alias).or_insert_with(|| {
                plan.orders.push(PendingUserCreation {
                    alias: member.alias.clone(),
                    display_name: member.display_name.clone(),
                    target_group_ids: Vec::new(),
                });
                plan.orders.len() - 1
            });
            if let Some(pending) = plan.orders.get_mut(slot) {
                if !pending.target_group_ids.contains(&target.id) {
                    pending.target_group_ids.push(target.id.clone());
                }
            }
        }
    }
    Ok(plan)
}

// ---------------------------------------------------------------------------
// c. membership_updates
// ---------------------------------------------------------------------------

/// Membership deltas for every matched group whose alias sets differ.
///
/// Comparison is set equality over aliases, so member order and duplicates
/// inside one snapshot never produce an update. Monitoring groups with no
/// directory counterpart are never touched.
pub fn membership_updates(
    policy: &NameMappingPolicy,
    directory: &[DirectoryGroup],
    monitoring: &MonitoringSnapshot,
) -> Result<Plan<PendingMembershipUpdate>, EngineError> {
    let index = MappingIndex::build(policy, directory);

    let mut ids_by_alias: HashMap<&Alias, BTreeSet<&MonitoringId>> = HashMap::new();
    for user in monitoring.all_users() {
        ids_by_alias.entry(&user.alias).or_default().insert(&user.id);
    }

    let mut plan = Plan {
        orders: Vec::new(),
        conflicts: index.conflicts.clone(),
    };

    for group in &index.groups {
        let target = match find_monitoring_group(monitoring, &group.mapped_name) {
            Lookup::Unique(target) => target,
            Lookup::Missing => return Err(group.unresolved()),
            Lookup::Duplicate(conflict) => {
                plan.conflicts.push(conflict);
                continue;
            }
        };

        let wanted: BTreeSet<&Alias> = group.members().map(|m| &m.alias).collect();
        let current = target.alias_set();
        if wanted == current {
            continue;
        }

        let mut add_user_ids = BTreeSet::new();
        let mut ambiguous = None;
        for alias in wanted.difference(&current) {
            let found = ids_by_alias
                .get(*alias)
                .ok_or_else(|| EngineError::UnresolvedUser {
                    alias: (*alias).clone(),
                    group: group.source.clone(),
                })?;
            if found.len() > 1 {
                ambiguous = Some(MappingConflict::DuplicateMonitoringUser {
                    group: target.name.clone(),
                    alias: (*alias).clone(),
                    ids: found.iter().map(|id| (*id).clone()).collect(),
                });
                break;
            }
            add_user_ids.extend(found.iter().map(|id| (*id).clone()));
        }
        if let Some(conflict) = ambiguous {
            plan.conflicts.push(conflict);
            continue;
        }

        let remove_user_ids: BTreeSet<MonitoringId> = target
            .members
            .iter()
            .filter(|m| !wanted.contains(&m.alias))
            .map(|m| m.id.clone())
            .collect();

        plan.orders.push(PendingMembershipUpdate {
            group_id: target.id.clone(),
            group_name: target.name.clone(),
            add_user_ids,
            remove_user_ids,
        });
    }
    Ok(plan)
}

// ---------------------------------------------------------------------------
// Mapping index
// ---------------------------------------------------------------------------

/// A directory group (possibly listed several times) and its mapped name.
struct MappedGroup<'a> {
    source: GroupName,
    mapped_name: GroupName,
    entries: Vec<&'a DirectoryGroup>,
}

impl<'a> MappedGroup<'a> {
    fn members(&self) -> impl Iterator<Item = &'a DirectoryUser> + '_ {
        self.entries.iter().copied().flat_map(|g| g.members.iter())
    }

    fn unresolved(&self) -> EngineError {
        EngineError::UnresolvedGroup {
            directory_group: self.source.clone(),
            mapped_name: self.mapped_name.clone(),
        }
    }
}

/// Directory groups keyed by mapped name, with collisions split out.
struct MappingIndex<'a> {
    groups: Vec<MappedGroup<'a>>,
    conflicts: Vec<MappingConflict>,
}

impl<'a> MappingIndex<'a> {
    fn build(policy: &NameMappingPolicy, directory: &'a [DirectoryGroup]) -> Self {
        struct Slot<'a> {
            mapped_name: GroupName,
            sources: Vec<GroupName>,
            entries: Vec<&'a DirectoryGroup>,
        }

        let mut slots: Vec<Slot<'a>> = Vec::new();
        let mut by_mapped: HashMap<GroupName, usize> = HashMap::new();

        for group in directory {
            let mapped_name = policy.map_to_monitoring_name(&group.name);
            let idx = *by_mapped.entry(mapped_name.clone()).or_insert_with(|| {
                slots.push(Slot {
                    mapped_name,
                    sources: Vec::new(),
                    entries: Vec::new(),
                });
                slots.len() - 1
            });
            if let Some(slot) = slots.get_mut(idx) {
                if !slot.sources.contains(&group.name) {
                    slot.sources.push(group.name.clone());
                }
                slot.entries.push(group);
            }
        }

        let mut groups = Vec::with_capacity(slots.len());
        let mut conflicts = Vec::new();
        for slot in slots {
            match <[GroupName; 1]>::try_from(slot.sources) {
                Ok([source]) => groups.push(MappedGroup {
                    source,
                    mapped_name: slot.mapped_name,
                    entries: slot.entries,
                }),
                Err(sources) => conflicts.push(MappingConflict::DirectoryCollision {
                    mapped_name: slot.mapped_name,
                    sources,
                }),
            }
        }
        Self { groups, conflicts }
    }
}

enum Lookup<'a> {
    Missing,
    Unique(&'a MonitoringGroup),
    Duplicate(MappingConflict),
}

fn find_monitoring_group<'a>(snapshot: &'a MonitoringSnapshot, name: &GroupName) -> Lookup<'a> {
    let matches: Vec<&MonitoringGroup> = snapshot.groups_named(name).collect();
    match matches.as_slice() {
        [] => Lookup::Missing,
        [only] => Lookup::Unique(only),
        many => Lookup::Duplicate(MappingConflict::DuplicateMonitoringGroup {
            mapped_name: name.clone(),
            ids: many.iter().map(|g| g.id.clone()).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupsync_core::MonitoringUser;

    fn policy() -> NameMappingPolicy {
        NameMappingPolicy::new("Monitoring - ", " (AD)")
    }

    fn dir(name: &str, members: &[&str]) -> DirectoryGroup {
        DirectoryGroup::new(
            name,
            members
                .iter()
                .map(|a| DirectoryUser::new(*a, a.to_uppercase()))
                .collect(),
        )
    }

    #[test]
    fn index_keeps_directory_order() {
        let groups = vec![dir("Monitoring - B", &[]), dir("Monitoring - A", &[])];
        let index = MappingIndex::build(&policy(), &groups);
        let names: Vec<&str> = index.groups.iter().map(|g| g.mapped_name.0.as_str()).collect();
        assert_eq!(names, vec!["B (AD)", "A (AD)"]);
        assert!(index.conflicts.is_empty());
    }

    #[test]
    fn index_merges_repeated_directory_group() {
        let groups = vec![dir("Monitoring - A", &["alice"]), dir("Monitoring - A", &["bob"])];
        let index = MappingIndex::build(&policy(), &groups);
        assert_eq!(index.groups.len(), 1);
        let aliases: Vec<&str> = index.groups[0].members().map(|m| m.alias.0.as_str()).collect();
        assert_eq!(aliases, vec!["alice", "bob"]);
    }

    #[test]
    fn index_splits_out_collisions() {
        let groups = vec![dir("Monitoring - A", &[]), dir("A", &[]), dir("Monitoring - B", &[])];
        let index = MappingIndex::build(&policy(), &groups);
        assert_eq!(index.groups.len(), 1);
        assert_eq!(
            index.conflicts,
            vec![MappingConflict::DirectoryCollision {
                mapped_name: GroupName::from("A (AD)"),
                sources: vec![GroupName::from("Monitoring - A"), GroupName::from("A")],
            }]
        );
    }

    #[test]
    fn lookup_flags_duplicate_monitoring_names() {
        let snapshot = MonitoringSnapshot::new(
            vec![
                MonitoringGroup::new("1", "A (AD)", vec![]),
                MonitoringGroup::new("2", "A (AD)", vec![MonitoringUser::new("9", "x")]),
            ],
            vec![],
        );
        match find_monitoring_group(&snapshot, &GroupName::from("A (AD)")) {
            Lookup::Duplicate(MappingConflict::DuplicateMonitoringGroup { ids, .. }) => {
                assert_eq!(ids, vec![MonitoringId::from(1), MonitoringId::from(2)]);
            }
            _ => panic!("expected duplicate"),
        }
    }
}

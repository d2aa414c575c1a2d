//! Dry-run monitoring provider.
//!
//! [`PlanningMonitor`] reads the real monitoring snapshot once and then
//! serves every later read from an in-memory copy. Writes are applied to that
//! copy with placeholder ids and recorded as [`PlannedWrite`]s, so the full
//! staged pipeline can run without changing the monitoring system.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use groupsync_core::{
    Alias, GroupName, MonitoringGroup, MonitoringId, MonitoringProvider, MonitoringSnapshot,
    MonitoringUser, NewUser, ProviderError,
};

/// A write the pipeline would have performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlannedWrite {
    CreateGroup {
        name: GroupName,
    },
    CreateUser {
        alias: Alias,
        display_name: String,
        groups: Vec<GroupName>,
    },
    UpdateMembers {
        group: GroupName,
        added: BTreeSet<Alias>,
        removed: BTreeSet<Alias>,
    },
}

pub struct PlanningMonitor<'a, M: ?Sized> {
    inner: &'a mut M,
    state: Option<MonitoringSnapshot>,
    next_id: u64,
    writes: Vec<PlannedWrite>,
}

impl<'a, M> PlanningMonitor<'a, M>
where
    M: MonitoringProvider + ?Sized,
{
    pub fn new(inner: &'a mut M) -> Self {
        Self {
            inner,
            state: None,
            next_id: 0,
            writes: Vec::new(),
        }
    }

    pub fn writes(&self) -> &[PlannedWrite] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<PlannedWrite> {
        self.writes
    }

    fn state(&mut self) -> Result<&mut MonitoringSnapshot, ProviderError> {
        if self.state.is_none() {
            let snapshot = self.inner.snapshot()?;
            self.state = Some(snapshot);
        }
        Ok(self.state.get_or_insert_with(MonitoringSnapshot::default))
    }

    fn placeholder(&mut self) -> MonitoringId {
        self.next_id += 1;
        MonitoringId(format!("planned-{}", self.next_id))
    }
}

fn group_not_found(id: &MonitoringId) -> ProviderError {
    ProviderError::NotFound {
        kind: "user group",
        name: id.to_string(),
    }
}

impl<M> MonitoringProvider for PlanningMonitor<'_, M>
where
    M: MonitoringProvider + ?Sized,
{
    fn list_users(&mut self) -> Result<Vec<MonitoringUser>, ProviderError> {
        Ok(self.state()?.users.clone())
    }

    fn list_user_groups(
        &mut self,
        include_members: bool,
    ) -> Result<Vec<MonitoringGroup>, ProviderError> {
        let mut groups = self.state()?.groups.clone();
        if !include_members {
            groups.iter_mut().for_each(|g| g.members.clear());
        }
        Ok(groups)
    }

    fn find_user_group(&mut self, name: &GroupName) -> Result<MonitoringId, ProviderError> {
        self.state()?
            .groups_named(name)
            .next()
            .map(|g| g.id.clone())
            .ok_or_else(|| ProviderError::NotFound {
                kind: "user group",
                name: name.to_string(),
            })
    }

    fn create_user_group(&mut self, name: &GroupName) -> Result<MonitoringId, ProviderError> {
        let id = self.placeholder();
        self.state()?
            .groups
            .push(MonitoringGroup::new(id.clone(), name.clone(), Vec::new()));
        self.writes.push(PlannedWrite::CreateGroup { name: name.clone() });
        Ok(id)
    }

    fn create_user(&mut self, user: &NewUser) -> Result<MonitoringId, ProviderError> {
        let id = self.placeholder();
        let entry = MonitoringUser::new(id.clone(), user.alias.clone());
        let state = self.state()?;

        let mut groups = Vec::with_capacity(user.group_ids.len());
        for group_id in &user.group_ids {
            let group = state
                .groups
                .iter_mut()
                .find(|g| &g.id == group_id)
                .ok_or_else(|| group_not_found(group_id))?;
            group.members.push(entry.clone());
            groups.push(group.name.clone());
        }
        state.users.push(entry);

        self.writes.push(PlannedWrite::CreateUser {
            alias: user.alias.clone(),
            display_name: user.display_name.clone(),
            groups,
        });
        Ok(id)
    }

    fn update_user_group_members(
        &mut self,
        group: &MonitoringId,
        members: &BTreeSet<MonitoringId>,
    ) -> Result<(), ProviderError> {
        let state = self.state()?;
        let by_id: HashMap<&MonitoringId, &MonitoringUser> =
            state.all_users().map(|u| (&u.id, u)).collect();

        let mut next = Vec::with_capacity(members.len());
        for id in members {
            let user = by_id.get(id).ok_or_else(|| ProviderError::NotFound {
                kind: "user",
                name: id.to_string(),
            })?;
            next.push((*user).clone());
        }

        let target = state
            .groups
            .iter_mut()
            .find(|g| &g.id == group)
            .ok_or_else(|| group_not_found(group))?;
        let before: BTreeSet<Alias> = target.members.iter().map(|m| m.alias.clone()).collect();
        let after: BTreeSet<Alias> = next.iter().map(|m| m.alias.clone()).collect();
        target.members = next;
        let group_name = target.name.clone();

        self.writes.push(PlannedWrite::UpdateMembers {
            group: group_name,
            added: after.difference(&before).cloned().collect(),
            removed: before.difference(&after).cloned().collect(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Serves one fixed snapshot and fails every write.
    struct ReadOnly {
        snapshot: MonitoringSnapshot,
        reads: usize,
    }

    impl MonitoringProvider for ReadOnly {
        fn list_users(&mut self) -> Result<Vec<MonitoringUser>, ProviderError> {
            self.reads += 1;
            Ok(self.snapshot.users.clone())
        }

        fn list_user_groups(&mut self, _: bool) -> Result<Vec<MonitoringGroup>, ProviderError> {
            Ok(self.snapshot.groups.clone())
        }

        fn find_user_group(&mut self, name: &GroupName) -> Result<MonitoringId, ProviderError> {
            Err(ProviderError::Protocol(format!("unexpected lookup of {name}")))
        }

        fn create_user_group(&mut self, _: &GroupName) -> Result<MonitoringId, ProviderError> {
            Err(ProviderError::Protocol("write during dry run".into()))
        }

        fn create_user(&mut self, _: &NewUser) -> Result<MonitoringId, ProviderError> {
            Err(ProviderError::Protocol("write during dry run".into()))
        }

        fn update_user_group_members(
            &mut self,
            _: &MonitoringId,
            _: &BTreeSet<MonitoringId>,
        ) -> Result<(), ProviderError> {
            Err(ProviderError::Protocol("write during dry run".into()))
        }
    }

    fn inner() -> ReadOnly {
        ReadOnly {
            snapshot: MonitoringSnapshot::new(
                vec![MonitoringGroup::new(
                    "7",
                    "Ops (AD)",
                    vec![MonitoringUser::new("1", "alice")],
                )],
                vec![MonitoringUser::new("1", "alice")],
            ),
            reads: 0,
        }
    }

    #[test]
    fn reads_inner_snapshot_once() {
        let mut inner = inner();
        let mut plan = PlanningMonitor::new(&mut inner);
        plan.snapshot().expect("first");
        plan.snapshot().expect("second");
        drop(plan);
        assert_eq!(inner.reads, 1);
    }

    #[test]
    fn simulated_writes_are_visible_to_later_reads() {
        let mut inner = inner();
        let mut plan = PlanningMonitor::new(&mut inner);

        let gid = plan.create_user_group(&GroupName::from("Dev (AD)")).expect("group");
        assert_eq!(gid, MonitoringId::from("planned-1"));
        assert_eq!(plan.find_user_group(&GroupName::from("Dev (AD)")).expect("find"), gid);

        let uid = plan
            .create_user(&NewUser {
                alias: Alias::from("bob"),
                display_name: "Bob".into(),
                group_ids: vec![gid.clone()],
            })
            .expect("user");

        let snapshot = plan.snapshot().expect("snapshot");
        let dev = snapshot.groups_named(&GroupName::from("Dev (AD)")).next().expect("dev");
        assert_eq!(dev.member_ids(), BTreeSet::from([uid]));
        assert_eq!(snapshot.users.len(), 2);
    }

    #[test]
    fn membership_update_records_alias_delta() {
        let mut inner = inner();
        let mut plan = PlanningMonitor::new(&mut inner);
        let uid = plan
            .create_user(&NewUser {
                alias: Alias::from("bob"),
                display_name: "Bob".into(),
                group_ids: vec![],
            })
            .expect("user");

        plan.update_user_group_members(&MonitoringId::from("7"), &BTreeSet::from([uid]))
            .expect("update");

        assert_eq!(
            plan.writes().last(),
            Some(&PlannedWrite::UpdateMembers {
                group: GroupName::from("Ops (AD)"),
                added: BTreeSet::from([Alias::from("bob")]),
                removed: BTreeSet::from([Alias::from("alice")]),
            })
        );
    }

    #[test]
    fn unknown_group_is_not_found() {
        let mut inner = inner();
        let mut plan = PlanningMonitor::new(&mut inner);
        let err = plan.find_user_group(&GroupName::from("AD Users")).unwrap_err();
        assert!(err.is_not_found());
        let err = plan
            .update_user_group_members(&MonitoringId::from("99"), &BTreeSet::new())
            .unwrap_err();
        assert!(err.is_not_found());
    }
}

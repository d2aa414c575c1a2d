//! Collaborator interfaces consumed by the orchestrator.
//!
//! The engine never holds a provider; the orchestrator owns them and hands
//! the snapshots they produce to the engine.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::types::{
    DirectoryGroup, DirectoryUser, GroupName, MonitoringGroup, MonitoringId, MonitoringSnapshot,
    MonitoringUser, NewUser,
};

/// Which directory groups take part in the sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupFilter {
    /// Exact group names.
    Names(Vec<GroupName>),
    /// Every group whose name starts with this prefix.
    Prefix(String),
}

/// Read access to the directory service.
pub trait DirectoryProvider {
    /// Names of the groups matching `filter`.
    fn list_groups(&mut self, filter: &GroupFilter) -> Result<Vec<GroupName>, ProviderError>;

    /// Enabled member accounts of one group.
    fn list_group_members(&mut self, group: &GroupName)
        -> Result<Vec<DirectoryUser>, ProviderError>;

    /// Every matching group with its members.
    fn snapshot(&mut self, filter: &GroupFilter) -> Result<Vec<DirectoryGroup>, ProviderError> {
        let names = self.list_groups(filter)?;
        let mut groups = Vec::with_capacity(names.len());
        for name in names {
            let members = self.list_group_members(&name)?;
            groups.push(DirectoryGroup { name, members });
        }
        Ok(groups)
    }
}

/// Read/write access to the monitoring platform.
pub trait MonitoringProvider {
    fn list_users(&mut self) -> Result<Vec<MonitoringUser>, ProviderError>;

    fn list_user_groups(
        &mut self,
        include_members: bool,
    ) -> Result<Vec<MonitoringGroup>, ProviderError>;

    /// Id of the user group named `name`; `ProviderError::NotFound` when absent.
    fn find_user_group(&mut self, name: &GroupName) -> Result<MonitoringId, ProviderError>;

    fn create_user_group(&mut self, name: &GroupName) -> Result<MonitoringId, ProviderError>;

    fn create_user(&mut self, user: &NewUser) -> Result<MonitoringId, ProviderError>;

    /// Replace the member list of `group` with `members`.
    fn update_user_group_members(
        &mut self,
        group: &MonitoringId,
        members: &BTreeSet<MonitoringId>,
    ) -> Result<(), ProviderError>;

    fn snapshot(&mut self) -> Result<MonitoringSnapshot, ProviderError> {
        let groups = self.list_user_groups(true)?;
        let users = self.list_users()?;
        Ok(MonitoringSnapshot { groups, users })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Alias;

    struct StaticDirectory;

    impl DirectoryProvider for StaticDirectory {
        fn list_groups(&mut self, filter: &GroupFilter) -> Result<Vec<GroupName>, ProviderError> {
            match filter {
                GroupFilter::Names(names) => Ok(names.clone()),
                GroupFilter::Prefix(prefix) => Ok(vec![GroupName(format!("{prefix}Ops"))]),
            }
        }

        fn list_group_members(
            &mut self,
            group: &GroupName,
        ) -> Result<Vec<DirectoryUser>, ProviderError> {
            if group.0.ends_with("Ops") {
                Ok(vec![DirectoryUser::new("alice", "Alice")])
            } else {
                Err(ProviderError::NotFound {
                    kind: "group",
                    name: group.0.clone(),
                })
            }
        }
    }

    #[test]
    fn snapshot_composes_groups_and_members() {
        let groups = StaticDirectory
            .snapshot(&GroupFilter::Prefix("Monitoring - ".into()))
            .expect("snapshot");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, GroupName::from("Monitoring - Ops"));
        assert_eq!(groups[0].members[0].alias, Alias::from("alice"));
    }

    #[test]
    fn snapshot_propagates_member_errors() {
        let err = StaticDirectory
            .snapshot(&GroupFilter::Names(vec![GroupName::from("Missing")]))
            .unwrap_err();
        assert!(err.is_not_found());
    }
}

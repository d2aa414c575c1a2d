//! Snapshot entities and work orders shared by the engine and its providers.
//!
//! Snapshots are plain values: providers build them, the engine only reads
//! them and derives new work-order values.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A group name, on either side of the sync.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupName(pub String);

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for GroupName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for GroupName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A user login. The join key between the directory and the monitoring side.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Alias(pub String);

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Alias {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Alias {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identifier assigned by the monitoring system (opaque; Zabbix uses decimal strings).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonitoringId(pub String);

impl fmt::Display for MonitoringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for MonitoringId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MonitoringId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<u64> for MonitoringId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

// ---------------------------------------------------------------------------
// Directory side
// ---------------------------------------------------------------------------

/// An enabled directory account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub alias: Alias,
    pub display_name: String,
}

impl DirectoryUser {
    pub fn new(alias: impl Into<Alias>, display_name: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            display_name: display_name.into(),
        }
    }
}

/// A directory group that matched the configured filter, with its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryGroup {
    pub name: GroupName,
    #[serde(default)]
    pub members: Vec<DirectoryUser>,
}

impl DirectoryGroup {
    pub fn new(name: impl Into<GroupName>, members: Vec<DirectoryUser>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }
}

// ---------------------------------------------------------------------------
// Monitoring side
// ---------------------------------------------------------------------------

/// A monitoring user as seen in group member lists and `list_users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringUser {
    pub id: MonitoringId,
    pub alias: Alias,
}

impl MonitoringUser {
    pub fn new(id: impl Into<MonitoringId>, alias: impl Into<Alias>) -> Self {
        Self {
            id: id.into(),
            alias: alias.into(),
        }
    }
}

/// A monitoring user group with its current members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringGroup {
    pub id: MonitoringId,
    pub name: GroupName,
    #[serde(default)]
    pub members: Vec<MonitoringUser>,
}

impl MonitoringGroup {
    pub fn new(
        id: impl Into<MonitoringId>,
        name: impl Into<GroupName>,
        members: Vec<MonitoringUser>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            members,
        }
    }

    pub fn alias_set(&self) -> BTreeSet<&Alias> {
        self.members.iter().map(|m| &m.alias).collect()
    }

    pub fn member_ids(&self) -> BTreeSet<MonitoringId> {
        self.members.iter().map(|m| m.id.clone()).collect()
    }
}

/// One read of the monitoring side: groups with members plus the flat user list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MonitoringSnapshot {
    #[serde(default)]
    pub groups: Vec<MonitoringGroup>,
    #[serde(default)]
    pub users: Vec<MonitoringUser>,
}

impl MonitoringSnapshot {
    pub fn new(groups: Vec<MonitoringGroup>, users: Vec<MonitoringUser>) -> Self {
        Self { groups, users }
    }

    /// Every monitoring group carrying exactly `name`.
    pub fn groups_named<'a, 'n>(
        &'a self,
        name: &'n GroupName,
    ) -> impl Iterator<Item = &'a MonitoringGroup> + 'n
    where
        'a: 'n,
    {
        self.groups.iter().filter(move |g| &g.name == name)
    }

    /// All users known to the snapshot: group members first, then `users`.
    pub fn all_users(&self) -> impl Iterator<Item = &MonitoringUser> {
        self.groups
            .iter()
            .flat_map(|g| g.members.iter())
            .chain(self.users.iter())
    }
}

// ---------------------------------------------------------------------------
// Work orders
// ---------------------------------------------------------------------------

/// A monitoring group that must be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingGroupCreation {
    pub mapped_name: GroupName,
}

/// A directory user absent from the monitoring side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUserCreation {
    pub alias: Alias,
    pub display_name: String,
    /// Every monitoring group the user must join, deduplicated, in first-seen order.
    pub target_group_ids: Vec<MonitoringId>,
}

/// Membership delta for one monitoring group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMembershipUpdate {
    pub group_id: MonitoringId,
    pub group_name: GroupName,
    pub add_user_ids: BTreeSet<MonitoringId>,
    pub remove_user_ids: BTreeSet<MonitoringId>,
}

impl PendingMembershipUpdate {
    /// Full member set after applying this update to `current`.
    pub fn resulting_members(&self, current: &BTreeSet<MonitoringId>) -> BTreeSet<MonitoringId> {
        current
            .iter()
            .chain(self.add_user_ids.iter())
            .filter(|id| !self.remove_user_ids.contains(*id))
            .cloned()
            .collect()
    }
}

/// Input to `MonitoringProvider::create_user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub alias: Alias,
    pub display_name: String,
    pub group_ids: Vec<MonitoringId>,
}

// ---------------------------------------------------------------------------
// Conflicts and plans
// ---------------------------------------------------------------------------

/// A name mapping that is not injective. The affected item is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MappingConflict {
    /// Several distinct directory groups map to the same monitoring name.
    DirectoryCollision {
        mapped_name: GroupName,
        sources: Vec<GroupName>,
    },
    /// Several monitoring groups carry the same mapped name.
    DuplicateMonitoringGroup {
        mapped_name: GroupName,
        ids: Vec<MonitoringId>,
    },
    /// Several monitoring users carry the same alias. The group that would
    /// gain this member is skipped.
    DuplicateMonitoringUser {
        group: GroupName,
        alias: Alias,
        ids: Vec<MonitoringId>,
    },
}

impl MappingConflict {
    pub fn mapped_name(&self) -> &GroupName {
        match self {
            MappingConflict::DirectoryCollision { mapped_name, .. }
            | MappingConflict::DuplicateMonitoringGroup { mapped_name, .. } => mapped_name,
            MappingConflict::DuplicateMonitoringUser { group, .. } => group,
        }
    }
}

impl fmt::Display for MappingConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingConflict::DirectoryCollision {
                mapped_name,
                sources,
            } => {
                let names: Vec<&str> = sources.iter().map(|s| s.0.as_str()).collect();
                write!(
                    f,
                    "directory groups [{}] all map to '{mapped_name}'",
                    names.join(", ")
                )
            }
            MappingConflict::DuplicateMonitoringGroup { mapped_name, ids } => {
                let ids: Vec<&str> = ids.iter().map(|i| i.0.as_str()).collect();
                write!(
                    f,
                    "monitoring groups [{}] share the name '{mapped_name}'",
                    ids.join(", ")
                )
            }
            MappingConflict::DuplicateMonitoringUser { group, alias, ids } => {
                let ids: Vec<&str> = ids.iter().map(|i| i.0.as_str()).collect();
                write!(
                    f,
                    "monitoring users [{}] share the alias '{alias}' needed by '{group}'",
                    ids.join(", ")
                )
            }
        }
    }
}

/// Output of one engine pass: the work orders plus any skipped ambiguities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan<T> {
    pub orders: Vec<T>,
    pub conflicts: Vec<MappingConflict>,
}

impl<T> Plan<T> {
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

impl<T> Default for Plan<T> {
    fn default() -> Self {
        Self {
            orders: Vec::new(),
            conflicts: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Staged run state machine.
//!
//! ```text
//! Start → GroupsResolved → UsersResolved → MembershipResolved → Done
//!   └──────────────┴───────────────┴──────────────────┴──→ Aborted
//! ```
//!
//! Each pass may only run from the stage preceding it. Between passes the
//! caller applies the returned work orders and re-fetches the monitoring
//! snapshot. A precondition failure moves the run to `Aborted`; there is no
//! way back.

use std::fmt;

use serde::{Deserialize, Serialize};

use groupsync_core::{
    DirectoryGroup, MonitoringSnapshot, NameMappingPolicy, PendingGroupCreation,
    PendingMembershipUpdate, PendingUserCreation, Plan,
};

use crate::engine;
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    GroupsResolved,
    UsersResolved,
    MembershipResolved,
    Done,
    Aborted,
}

impl Stage {
    /// The stage that must be current for `self` to be entered.
    fn predecessor(self) -> Option<Stage> {
        match self {
            Stage::Start | Stage::Aborted => None,
            Stage::GroupsResolved => Some(Stage::Start),
            Stage::UsersResolved => Some(Stage::GroupsResolved),
            Stage::MembershipResolved => Some(Stage::UsersResolved),
            Stage::Done => Some(Stage::MembershipResolved),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Aborted)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Start => "start",
            Stage::GroupsResolved => "groups-resolved",
            Stage::UsersResolved => "users-resolved",
            Stage::MembershipResolved => "membership-resolved",
            Stage::Done => "done",
            Stage::Aborted => "aborted",
        };
        f.write_str(label)
    }
}

/// One synchronization run over a fixed directory snapshot.
#[derive(Debug)]
pub struct StagedRun {
    policy: NameMappingPolicy,
    directory: Vec<DirectoryGroup>,
    stage: Stage,
}

impl StagedRun {
    pub fn new(policy: NameMappingPolicy, directory: Vec<DirectoryGroup>) -> Self {
        Self {
            policy,
            directory,
            stage: Stage::Start,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn resolve_groups(
        &mut self,
        monitoring: &MonitoringSnapshot,
    ) -> Result<Plan<PendingGroupCreation>, EngineError> {
        self.enter(Stage::GroupsResolved)?;
        Ok(engine::groups_to_create(
            &self.policy,
            &self.directory,
            monitoring,
        ))
    }

    pub fn resolve_users(
        &mut self,
        monitoring: &MonitoringSnapshot,
    ) -> Result<Plan<PendingUserCreation>, EngineError> {
        self.check(Stage::UsersResolved)?;
        let plan = engine::users_to_create(&self.policy, &self.directory, monitoring);
        self.settle(Stage::UsersResolved, plan)
    }

    pub fn resolve_membership(
        &mut self,
        monitoring: &MonitoringSnapshot,
    ) -> Result<Plan<PendingMembershipUpdate>, EngineError> {
        self.check(Stage::MembershipResolved)?;
        let plan = engine::membership_updates(&self.policy, &self.directory, monitoring);
        self.settle(Stage::MembershipResolved, plan)
    }

    /// Close the run once every pass has been resolved and applied.
    pub fn finish(&mut self) -> Result<(), EngineError> {
        self.enter(Stage::Done)
    }

    /// Abort the run, e.g. after a collaborator failure while applying work.
    pub fn abort(&mut self) {
        self.stage = Stage::Aborted;
    }

    fn check(&self, next: Stage) -> Result<(), EngineError> {
        if next.predecessor() == Some(self.stage) {
            Ok(())
        } else {
            Err(EngineError::OutOfOrder {
                current: self.stage,
                attempted: next,
            })
        }
    }

    fn enter(&mut self, next: Stage) -> Result<(), EngineError> {
        self.check(next)?;
        self.stage = next;
        Ok(())
    }

    fn settle<T>(
        &mut self,
        next: Stage,
        result: Result<Plan<T>, EngineError>,
    ) -> Result<Plan<T>, EngineError> {
        match result {
            Ok(plan) => {
                self.stage = next;
                Ok(plan)
            }
            Err(err) => {
                self.stage = Stage::Aborted;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupsync_core::{DirectoryUser, GroupName, MonitoringGroup};

    fn run() -> StagedRun {
        StagedRun::new(
            NameMappingPolicy::new("Monitoring - ", " (AD)"),
            vec![DirectoryGroup::new(
                "Monitoring - Ops",
                vec![DirectoryUser::new("alice", "Alice")],
            )],
        )
    }

    fn created() -> MonitoringSnapshot {
        MonitoringSnapshot::new(vec![MonitoringGroup::new("42", "Ops (AD)", vec![])], vec![])
    }

    #[test]
    fn passes_run_in_order() {
        let mut run = run();
        let groups = run.resolve_groups(&MonitoringSnapshot::default()).expect("groups");
        assert_eq!(groups.orders[0].mapped_name, GroupName::from("Ops (AD)"));
        assert_eq!(run.stage(), Stage::GroupsResolved);

        run.resolve_users(&created()).expect("users");
        assert_eq!(run.stage(), Stage::UsersResolved);
        run.resolve_membership(&created()).unwrap_err();
        assert_eq!(run.stage(), Stage::Aborted);
    }

    #[test]
    fn skipping_a_pass_is_rejected() {
        let mut run = run();
        let err = run.resolve_membership(&created()).unwrap_err();
        assert_eq!(
            err,
            EngineError::OutOfOrder {
                current: Stage::Start,
                attempted: Stage::MembershipResolved,
            }
        );
        assert_eq!(run.stage(), Stage::Start, "rejected call must not move the run");
    }

    #[test]
    fn repeating_a_pass_is_rejected() {
        let mut run = run();
        run.resolve_groups(&MonitoringSnapshot::default()).expect("groups");
        assert!(run.resolve_groups(&created()).is_err());
    }

    #[test]
    fn unresolved_group_aborts_run() {
        let mut run = run();
        run.resolve_groups(&MonitoringSnapshot::default()).expect("groups");
        let err = run.resolve_users(&MonitoringSnapshot::default()).unwrap_err();
        assert!(matches!(err, EngineError::UnresolvedGroup { .. }));
        assert_eq!(run.stage(), Stage::Aborted);
        assert!(run.finish().is_err());
    }

    #[test]
    fn finish_requires_membership_stage() {
        let mut run = StagedRun::new(NameMappingPolicy::default(), vec![]);
        assert!(run.finish().is_err());
        let empty = MonitoringSnapshot::default();
        run.resolve_groups(&empty).expect("groups");
        run.resolve_users(&empty).expect("users");
        run.resolve_membership(&empty).expect("membership");
        run.finish().expect("finish");
        assert!(run.stage().is_terminal());
    }
}

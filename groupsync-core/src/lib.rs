//! groupsync core library: snapshot types, name mapping, collaborator traits,
//! configuration, errors.
//!
//! - [`types`]: newtypes, snapshot entities, work orders
//! - [`naming`]: [`NameMappingPolicy`] and DN display-name parsing
//! - [`provider`]: [`DirectoryProvider`] / [`MonitoringProvider`]
//! - [`config`]: load / validate / init `~/.groupsync/config.yaml`
//! - [`error`]: [`ConfigError`], [`NamingError`], [`ProviderError`]

pub mod config;
pub mod error;
pub mod naming;
pub mod provider;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, NamingError, ProviderError};
pub use naming::{display_name_from_dn, NameMappingPolicy};
pub use provider::{DirectoryProvider, GroupFilter, MonitoringProvider};
pub use types::{
    Alias, DirectoryGroup, DirectoryUser, GroupName, MappingConflict, MonitoringGroup,
    MonitoringId, MonitoringSnapshot, MonitoringUser, NewUser, PendingGroupCreation,
    PendingMembershipUpdate, PendingUserCreation, Plan,
};

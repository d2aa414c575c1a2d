//! Error types for groupsync-engine.

use std::path::PathBuf;

use thiserror::Error;

use groupsync_core::{Alias, GroupName, ProviderError};

use crate::stage::Stage;

/// Precondition violations raised by the reconciliation passes.
///
/// Each one means the passes were not staged correctly (a write was not
/// applied, or the monitoring snapshot was not re-fetched). They are not
/// recoverable within a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(
        "no monitoring group named '{mapped_name}' for directory group '{directory_group}'; \
         group creation was not applied before this pass"
    )]
    UnresolvedGroup {
        directory_group: GroupName,
        mapped_name: GroupName,
    },

    #[error(
        "user '{alias}' of group '{group}' has no monitoring id; \
         user creation was not applied before this pass"
    )]
    UnresolvedUser { alias: Alias, group: GroupName },

    #[error("cannot resolve {attempted} while the run is at {current}")]
    OutOfOrder { current: Stage, attempted: Stage },
}

/// All errors that can arise from a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A directory or monitoring collaborator failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("reconciliation error: {0}")]
    Engine(#[from] EngineError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (run log).
    #[error("run log JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

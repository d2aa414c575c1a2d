//! Error types for groupsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading, validating, or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (skeleton write path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.groupsync/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    #[error("config not found at {path}; run `groupsync init` first")]
    NotFound { path: PathBuf },

    #[error("invalid config: {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}

/// Errors from name parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    #[error("cannot derive a display name from '{dn}': leading component is escaped or malformed")]
    AmbiguousDisplayName { dn: String },
}

/// Failures reported by directory and monitoring collaborators.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Endpoint unreachable, timed out, or the transport failed.
    #[error("cannot reach {endpoint}: {message}")]
    Connectivity { endpoint: String, message: String },

    /// Credentials were rejected.
    #[error("authentication failed at {endpoint}: {message}")]
    Authentication { endpoint: String, message: String },

    /// A named entity expected on the remote side does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    /// The remote answered, but with an error or a response we cannot use.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ProviderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound { .. })
    }
}

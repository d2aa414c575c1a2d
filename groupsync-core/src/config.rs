//! YAML configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.groupsync/
//!   config.yaml       (mode 0600, written by `groupsync init`)
//!   logs/             (rotated run logs)
//!   runs/last.json    (summary of the last applied run)
//! ```
//!
//! # API pattern
//!
//! Every function touching the filesystem has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Secrets may come from the environment instead of the file; see
//! [`apply_env_overrides`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::naming::NameMappingPolicy;
use crate::provider::GroupFilter;
use crate::types::GroupName;

pub const ENV_DIRECTORY_PASSWORD: &str = "GROUPSYNC_DIRECTORY_PASSWORD";
pub const ENV_MONITORING_PASSWORD: &str = "GROUPSYNC_MONITORING_PASSWORD";
pub const ENV_MONITORING_TOKEN: &str = "GROUPSYNC_MONITORING_TOKEN";

// ---------------------------------------------------------------------------
// 1. Types
// ---------------------------------------------------------------------------

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub naming: NameMappingPolicy,
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Directory (LDAP / Active Directory) connection and search settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// `ldap://host[:port]` or `ldaps://host[:port]`.
    pub url: String,
    pub bind_dn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_password: Option<String>,
    /// Search root for member accounts (subtree).
    pub users_ou: String,
    /// Search root for groups (one level).
    pub groups_ou: String,
    /// Explicit group names. Takes precedence over `group_prefix`.
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_prefix: Option<String>,
    #[serde(default = "default_directory_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub tls_verify: bool,
}

impl std::fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("url", &self.url)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &self.bind_password.as_ref().map(|_| "***"))
            .field("users_ou", &self.users_ou)
            .field("groups_ou", &self.groups_ou)
            .field("groups", &self.groups)
            .field("group_prefix", &self.group_prefix)
            .field("timeout_secs", &self.timeout_secs)
            .field("tls_verify", &self.tls_verify)
            .finish()
    }
}

impl DirectoryConfig {
    /// The filter selecting participating groups; explicit names win over a prefix.
    pub fn group_filter(&self) -> Option<GroupFilter> {
        let names: Vec<GroupName> = self
            .groups
            .iter()
            .map(|g| g.trim())
            .filter(|g| !g.is_empty())
            .map(GroupName::from)
            .collect();
        if !names.is_empty() {
            return Some(GroupFilter::Names(names));
        }
        self.group_prefix
            .as_ref()
            .filter(|p| !p.is_empty())
            .map(|p| GroupFilter::Prefix(p.clone()))
    }
}

/// How the API session token is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// `"auth"` member of the JSON-RPC request body.
    #[default]
    Body,
    /// `Authorization: Bearer` header.
    Header,
}

/// Name of the login field on user objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserField {
    #[default]
    Alias,
    Username,
}

impl UserField {
    pub fn as_str(self) -> &'static str {
        match self {
            UserField::Alias => "alias",
            UserField::Username => "username",
        }
    }
}

/// Per-user settings applied when a user is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDefaults {
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default = "default_refresh")]
    pub refresh: String,
    #[serde(default = "default_rows_per_page")]
    pub rows_per_page: u32,
}

impl Default for UserDefaults {
    fn default() -> Self {
        Self {
            lang: default_lang(),
            refresh: default_refresh(),
            rows_per_page: default_rows_per_page(),
        }
    }
}

/// Monitoring platform (Zabbix API) settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Frontend base URL; `/api_jsonrpc.php` is appended when missing.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Pre-issued API token; when set, no login/logout happens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default)]
    pub auth: AuthMode,
    #[serde(default)]
    pub user_field: UserField,
    /// Group every created user also joins.
    pub default_group: String,
    #[serde(default)]
    pub user_defaults: UserDefaults,
    #[serde(default = "default_monitoring_timeout")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for MonitoringConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoringConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .field("auth", &self.auth)
            .field("user_field", &self.user_field)
            .field("default_group", &self.default_group)
            .field("user_defaults", &self.user_defaults)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file; defaults to `~/.groupsync/logs/groupsync.log`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_directory_timeout() -> u64 {
    10
}
fn default_monitoring_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_lang() -> String {
    "en_US".to_string()
}
fn default_refresh() -> String {
    "60s".to_string()
}
fn default_rows_per_page() -> u32 {
    100
}
fn default_log_level() -> String {
    "info".to_string()
}

// ---------------------------------------------------------------------------
// 2. Validation and overrides
// ---------------------------------------------------------------------------

impl Config {
    /// Reject configurations that cannot drive a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("directory.url", &self.directory.url)?;
        require("directory.bind_dn", &self.directory.bind_dn)?;
        require("directory.users_ou", &self.directory.users_ou)?;
        require("directory.groups_ou", &self.directory.groups_ou)?;
        if self.directory.group_filter().is_none() {
            return Err(ConfigError::Invalid {
                field: "directory.groups",
                reason: "set `groups` or `group_prefix`".to_string(),
            });
        }
        require("monitoring.url", &self.monitoring.url)?;
        require("monitoring.default_group", &self.monitoring.default_group)?;

        let has_token = self
            .monitoring
            .api_token
            .as_deref()
            .is_some_and(|t| !t.is_empty());
        let has_login = self.monitoring.username.as_deref().is_some_and(|u| !u.is_empty())
            && self.monitoring.password.is_some();
        if !has_token && !has_login {
            return Err(ConfigError::Invalid {
                field: "monitoring.username",
                reason: "set `api_token`, or `username` and `password`".to_string(),
            });
        }
        Ok(())
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

/// Replace secrets with values from `lookup` (normally `std::env::var`).
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(pw) = lookup(ENV_DIRECTORY_PASSWORD) {
        config.directory.bind_password = Some(pw);
    }
    if let Some(pw) = lookup(ENV_MONITORING_PASSWORD) {
        config.monitoring.password = Some(pw);
    }
    if let Some(token) = lookup(ENV_MONITORING_TOKEN) {
        config.monitoring.api_token = Some(token);
    }
}

// ---------------------------------------------------------------------------
// 3. Paths
// ---------------------------------------------------------------------------

/// `<home>/.groupsync`
pub fn root_at(home: &Path) -> PathBuf {
    home.join(".groupsync")
}

/// `<home>/.groupsync/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    root_at(home).join("config.yaml")
}

/// `<home>/.groupsync/logs`
pub fn logs_dir_at(home: &Path) -> PathBuf {
    root_at(home).join("logs")
}

/// `<home>/.groupsync/runs`
pub fn runs_dir_at(home: &Path) -> PathBuf {
    root_at(home).join("runs")
}

// ---------------------------------------------------------------------------
// 4. Load
// ---------------------------------------------------------------------------

/// Parse and validate a config file, without environment overrides.
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let config = read(path)?;
    config.validate()?;
    Ok(config)
}

fn read(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let config: Config = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(config)
}

/// Load `<home>/.groupsync/config.yaml` and apply environment overrides.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    load_with_env(&config_path_at(home))
}

/// Load `path` and apply environment overrides.
pub fn load_with_env(path: &Path) -> Result<Config, ConfigError> {
    let mut config = read(path)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, ConfigError> {
    load_at(&home()?)
}

// ---------------------------------------------------------------------------
// 5. Init
// ---------------------------------------------------------------------------

const SKELETON: &str = r#"# groupsync configuration
directory:
  url: ldap://dc.example.com
  bind_dn: CN=svc-groupsync,OU=Service Accounts,DC=example,DC=com
  # or set GROUPSYNC_DIRECTORY_PASSWORD
  bind_password: change-me
  users_ou: OU=Users,DC=example,DC=com
  groups_ou: OU=Groups,DC=example,DC=com
  # explicit group names; remove to use group_prefix instead
  groups:
    - Monitoring - Read Access
  # group_prefix: "Monitoring - "
  timeout_secs: 10
  tls_verify: true

naming:
  strip_prefix: "Monitoring - "
  append_suffix: " (AD)"

monitoring:
  url: https://zabbix.example.com
  username: Admin
  # or set GROUPSYNC_MONITORING_PASSWORD
  password: change-me
  # api_token: set to skip login/logout (or GROUPSYNC_MONITORING_TOKEN)
  auth: body
  # `alias` before Zabbix 5.4, `username` after
  user_field: alias
  default_group: AD Users
  user_defaults:
    lang: en_US
    refresh: 60s
    rows_per_page: 100
  timeout_secs: 30

logging:
  level: info
"#;

/// Write the config skeleton to `<home>/.groupsync/config.yaml`.
///
/// Idempotent: an existing file is left untouched. Returns the path and
/// whether it was created.
pub fn init_at(home: &Path) -> Result<(PathBuf, bool), ConfigError> {
    let root = root_at(home);
    if !root.exists() {
        std::fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
        set_dir_permissions(&root)?;
    }

    let path = config_path_at(home);
    if path.exists() {
        return Ok((path, false));
    }

    let tmp = path.with_file_name("config.yaml.tmp");
    std::fs::write(&tmp, SKELETON).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok((path, true))
}

/// `init_at` convenience wrapper.
pub fn init() -> Result<(PathBuf, bool), ConfigError> {
    init_at(&home()?)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn skeleton() -> Config {
        serde_yaml::from_str(SKELETON).expect("skeleton parses")
    }

    #[test]
    fn skeleton_is_valid() {
        let config = skeleton();
        config.validate().expect("valid");
        assert_eq!(config.naming.strip_prefix, "Monitoring - ");
        assert_eq!(config.monitoring.user_field, UserField::Alias);
        assert_eq!(config.monitoring.auth, AuthMode::Body);
    }

    #[test]
    fn explicit_names_take_precedence_over_prefix() {
        let mut config = skeleton();
        config.directory.group_prefix = Some("Monitoring - ".into());
        assert!(matches!(
            config.directory.group_filter(),
            Some(GroupFilter::Names(_))
        ));

        config.directory.groups = vec!["  ".into()];
        assert_eq!(
            config.directory.group_filter(),
            Some(GroupFilter::Prefix("Monitoring - ".into()))
        );
    }

    #[test]
    fn missing_filter_is_invalid() {
        let mut config = skeleton();
        config.directory.groups.clear();
        config.directory.group_prefix = None;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "directory.groups", .. }));
    }

    #[test]
    fn token_replaces_login() {
        let mut config = skeleton();
        config.monitoring.username = None;
        config.monitoring.password = None;
        assert!(config.validate().is_err());
        config.monitoring.api_token = Some("abc".into());
        config.validate().expect("token alone is enough");
    }

    #[test]
    fn env_overrides_replace_secrets() {
        let mut config = skeleton();
        apply_env_overrides(&mut config, |key| match key {
            ENV_DIRECTORY_PASSWORD => Some("ldap-secret".into()),
            ENV_MONITORING_TOKEN => Some("token".into()),
            _ => None,
        });
        assert_eq!(config.directory.bind_password.as_deref(), Some("ldap-secret"));
        assert_eq!(config.monitoring.password.as_deref(), Some("change-me"));
        assert_eq!(config.monitoring.api_token.as_deref(), Some("token"));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = skeleton();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("change-me"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn init_writes_skeleton_once() {
        let home = TempDir::new().expect("home");
        let (path, created) = init_at(home.path()).expect("init");
        assert!(created);
        assert!(path.ends_with(".groupsync/config.yaml"));

        std::fs::write(&path, "edited").expect("edit");
        let (_, created_again) = init_at(home.path()).expect("init again");
        assert!(!created_again);
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "edited");
    }

    #[cfg(unix)]
    #[test]
    fn init_sets_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let home = TempDir::new().expect("home");
        let (path, _) = init_at(home.path()).expect("init");
        let mode = std::fs::metadata(&path).expect("meta").permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn load_missing_config_returns_not_found() {
        let home = TempDir::new().expect("home");
        let err = load_from(&config_path_at(home.path())).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn load_roundtrips_skeleton() {
        let home = TempDir::new().expect("home");
        let (path, _) = init_at(home.path()).expect("init");
        let config = load_from(&path).expect("load");
        assert_eq!(config, skeleton());
    }
}

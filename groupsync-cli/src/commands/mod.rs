pub mod init;
pub mod plan;
pub mod status;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use groupsync_core::{config, Config, GroupName};
use groupsync_engine::SyncOptions;
use groupsync_ldap::LdapDirectory;
use groupsync_zabbix::ZabbixClient;

pub(crate) fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// Load the config from `--config` or `~/.groupsync/config.yaml`, with
/// environment overrides applied, and start logging.
pub(crate) fn load_config(explicit: Option<&Path>) -> Result<(PathBuf, Config)> {
    let home = home()?;
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config::config_path_at(&home));
    let config = config::load_with_env(&path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    crate::logging::init(&home, &config.logging)?;
    Ok((home, config))
}

pub(crate) fn sync_options(config: &Config) -> Result<SyncOptions> {
    let filter = config
        .directory
        .group_filter()
        .context("config lists no directory groups; set directory.groups or directory.group_prefix")?;
    Ok(SyncOptions {
        policy: config.naming.clone(),
        filter,
        default_group: GroupName::from(config.monitoring.default_group.as_str()),
    })
}

pub(crate) fn connect(config: &Config) -> Result<(LdapDirectory, ZabbixClient)> {
    let directory = LdapDirectory::connect(&config.directory)
        .with_context(|| format!("failed to connect to directory {}", config.directory.url))?;
    let monitoring = ZabbixClient::connect(&config.monitoring)
        .with_context(|| format!("failed to connect to monitoring API {}", config.monitoring.url))?;
    Ok((directory, monitoring))
}

/// Close both sessions; failures here never change the run outcome.
pub(crate) fn disconnect(directory: LdapDirectory, monitoring: ZabbixClient) {
    if let Err(err) = monitoring.close() {
        warn!(error = %err, "monitoring logout failed");
    }
    if let Err(err) = directory.close() {
        warn!(error = %err, "directory unbind failed");
    }
}

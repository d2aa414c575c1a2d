//! Blocking `DirectoryProvider` over an Active Directory LDAP connection.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use ldap3::{LdapConn, LdapConnSettings, Scope, SearchEntry};
use tracing::{debug, info, warn};

use groupsync_core::config::DirectoryConfig;
use groupsync_core::{
    display_name_from_dn, DirectoryProvider, DirectoryUser, GroupFilter, GroupName, ProviderError,
};

use crate::error::LdapError;
use crate::filter;

const LOGIN_ATTR: &str = "sAMAccountName";

pub struct LdapDirectory {
    conn: LdapConn,
    url: String,
    users_ou: String,
    groups_ou: String,
    timeout: Duration,
}

impl std::fmt::Debug for LdapDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapDirectory")
            .field("url", &self.url)
            .field("users_ou", &self.users_ou)
            .field("groups_ou", &self.groups_ou)
            .finish_non_exhaustive()
    }
}

impl LdapDirectory {
    /// Connect and simple-bind with the configured service account.
    pub fn connect(config: &DirectoryConfig) -> Result<Self, ProviderError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let settings = LdapConnSettings::new()
            .set_conn_timeout(timeout)
            .set_no_tls_verify(!config.tls_verify);

        debug!(url = %config.url, "connecting to directory");
        let mut conn = LdapConn::with_settings(settings, &config.url)
            .map_err(|source| {
                LdapError::Connect {
                    url: config.url.clone(),
                    source,
                }
                .into_provider(&config.url)
            })?;

        let password = config.bind_password.as_deref().unwrap_or("");
        let bind = conn
            .with_timeout(timeout)
            .simple_bind(&config.bind_dn, password)
            .map_err(|source| {
                LdapError::Connect {
                    url: config.url.clone(),
                    source,
                }
                .into_provider(&config.url)
            })?;
        if bind.rc != 0 {
            return Err(LdapError::Bind {
                bind_dn: config.bind_dn.clone(),
                rc: bind.rc,
                text: bind.text,
            }
            .into_provider(&config.url));
        }
        info!(url = %config.url, bind_dn = %config.bind_dn, "bound to directory");

        Ok(Self {
            conn,
            url: config.url.clone(),
            users_ou: config.users_ou.clone(),
            groups_ou: config.groups_ou.clone(),
            timeout,
        })
    }

    /// Unbind and drop the connection.
    pub fn close(mut self) -> Result<(), ProviderError> {
        self.conn.unbind().map_err(|source| {
            LdapError::Connect {
                url: self.url.clone(),
                source,
            }
            .into_provider(&self.url)
        })
    }

    fn search(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: Vec<&str>,
    ) -> Result<Vec<SearchEntry>, ProviderError> {
        debug!(%base, %filter, "directory search");
        let search_err = |source: ldap3::LdapError| {
            LdapError::Search {
                base: base.to_string(),
                source,
            }
            .into_provider(&self.url)
        };
        let (entries, _) = self
            .conn
            .with_timeout(self.timeout)
            .search(base, scope, filter, attrs)
            .and_then(|result| result.success())
            .map_err(search_err)?;

        // Continuation references are not chased.
        Ok(entries
            .into_iter()
            .filter(|e| !e.is_ref())
            .map(SearchEntry::construct)
            .collect())
    }
}

impl DirectoryProvider for LdapDirectory {
    fn list_groups(&mut self, filter: &GroupFilter) -> Result<Vec<GroupName>, ProviderError> {
        let base = self.groups_ou.clone();
        let entries = self.search(&base, Scope::OneLevel, &filter::group_filter(filter), vec!["cn"])?;
        let found: BTreeSet<GroupName> = entries
            .iter()
            .filter_map(|e| first_value(&e.attrs, "cn"))
            .map(GroupName::from)
            .collect();
        Ok(order_groups(filter, found))
    }

    fn list_group_members(
        &mut self,
        group: &GroupName,
    ) -> Result<Vec<DirectoryUser>, ProviderError> {
        let base = self.users_ou.clone();
        let member_filter = filter::member_filter(group, &self.groups_ou);
        let entries = self.search(&base, Scope::Subtree, &member_filter, vec![LOGIN_ATTR])?;
        let members: Vec<DirectoryUser> = entries.iter().filter_map(user_from_entry).collect();
        debug!(group = %group, members = members.len(), "loaded group members");
        Ok(members)
    }
}

/// Explicit names keep their configured order; prefix matches sort by name.
fn order_groups(filter: &GroupFilter, found: BTreeSet<GroupName>) -> Vec<GroupName> {
    match filter {
        GroupFilter::Names(names) => {
            let mut ordered = Vec::with_capacity(names.len());
            for name in names {
                let hit = found.iter().find(|f| f.0.eq_ignore_ascii_case(&name.0));
                match hit {
                    Some(hit) => ordered.push(hit.clone()),
                    None => warn!(group = %name, "configured group not found in directory"),
                }
            }
            ordered
        }
        GroupFilter::Prefix(_) => found.into_iter().collect(),
    }
}

/// Attribute lookup ignoring the case the server reports names in.
fn first_value<'a>(attrs: &'a HashMap<String, Vec<String>>, name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(String::as_str)
}

/// A member entry as a directory user; display name from the entry DN.
fn user_from_entry(entry: &SearchEntry) -> Option<DirectoryUser> {
    let Some(alias) = first_value(&entry.attrs, LOGIN_ATTR) else {
        warn!(dn = %entry.dn, "member entry has no {LOGIN_ATTR}; skipped");
        return None;
    };
    let display_name = match display_name_from_dn(&entry.dn) {
        Ok(name) => name,
        Err(err) => {
            warn!(%alias, "{err}; using login as display name");
            alias.to_string()
        }
    };
    Some(DirectoryUser::new(alias, display_name))
}

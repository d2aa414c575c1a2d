//! Error types for groupsync-ldap.

use thiserror::Error;

use groupsync_core::ProviderError;

/// LDAP result code for rejected credentials.
const INVALID_CREDENTIALS: u32 = 49;

#[derive(Debug, Error)]
pub enum LdapError {
    #[error("cannot connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: ldap3::LdapError,
    },

    #[error("bind as {bind_dn} failed (rc={rc}): {text}")]
    Bind { bind_dn: String, rc: u32, text: String },

    #[error("search under {base} failed: {source}")]
    Search {
        base: String,
        #[source]
        source: ldap3::LdapError,
    },
}

impl LdapError {
    pub(crate) fn into_provider(self, endpoint: &str) -> ProviderError {
        match self {
            LdapError::Bind { rc, .. } if rc == INVALID_CREDENTIALS => {
                ProviderError::Authentication {
                    endpoint: endpoint.to_string(),
                    message: self.to_string(),
                }
            }
            LdapError::Connect { .. } | LdapError::Bind { .. } => ProviderError::Connectivity {
                endpoint: endpoint.to_string(),
                message: self.to_string(),
            },
            LdapError::Search { .. } => ProviderError::Protocol(self.to_string()),
        }
    }
}

//! # groupsync-ldap
//!
//! Active Directory implementation of [`groupsync_core::DirectoryProvider`]
//! over the blocking `ldap3` API.

pub mod directory;
pub mod error;
pub mod filter;

pub use directory::LdapDirectory;
pub use error::LdapError;

//! Search filters for Active Directory.
//!
//! Values are filter-escaped per RFC 4515; the group DN embedded in the
//! member filter is additionally DN-escaped per RFC 4514.

use ldap3::{dn_escape, ldap_escape};

use groupsync_core::{GroupFilter, GroupName};

/// Transitive group membership (`LDAP_MATCHING_RULE_IN_CHAIN`).
const IN_CHAIN: &str = "1.2.840.113556.1.4.1941";
/// Bitwise AND on `userAccountControl`.
const BIT_AND: &str = "1.2.840.113556.1.4.803";
/// `ACCOUNTDISABLE` flag.
const ACCOUNT_DISABLED: u32 = 2;

/// Filter for the group search under `groups_ou`.
pub fn group_filter(filter: &GroupFilter) -> String {
    match filter {
        GroupFilter::Names(names) => match names.as_slice() {
            [one] => format!("(cn={})", ldap_escape(one.0.as_str())),
            many => {
                let terms: String = many
                    .iter()
                    .map(|n| format!("(cn={})", ldap_escape(n.0.as_str())))
                    .collect();
                format!("(|{terms})")
            }
        },
        GroupFilter::Prefix(prefix) => format!("(cn={}*)", ldap_escape(prefix.as_str())),
    }
}

/// Distinguished name of a group directly under `groups_ou`.
pub fn group_dn(group: &GroupName, groups_ou: &str) -> String {
    format!("CN={},{groups_ou}", dn_escape(group.0.as_str()))
}

/// Enabled user accounts that are members of `group`, directly or nested.
pub fn member_filter(group: &GroupName, groups_ou: &str) -> String {
    let dn = group_dn(group, groups_ou);
    format!(
        "(&(objectClass=user)(memberOf:{IN_CHAIN}:={})(!(userAccountControl:{BIT_AND}:={ACCOUNT_DISABLED})))",
        ldap_escape(dn.as_str())
    )
}

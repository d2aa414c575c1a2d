//! Directory → monitoring name mapping and DN display-name parsing.

use serde::{Deserialize, Serialize};

use crate::error::NamingError;
use crate::types::GroupName;

/// Forward-only transform from a directory group name to its monitoring name.
///
/// Every occurrence of `strip_prefix` is removed, then `append_suffix` is
/// appended: `"Monitoring - Read Access"` → `"Read Access (AD)"`. The inverse
/// is never computed; matching always maps the directory name forward and
/// compares for equality.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NameMappingPolicy {
    #[serde(default)]
    pub strip_prefix: String,
    #[serde(default)]
    pub append_suffix: String,
}

impl NameMappingPolicy {
    pub fn new(strip_prefix: impl Into<String>, append_suffix: impl Into<String>) -> Self {
        Self {
            strip_prefix: strip_prefix.into(),
            append_suffix: append_suffix.into(),
        }
    }

    pub fn map_to_monitoring_name(&self, directory_name: &GroupName) -> GroupName {
        let stripped = if self.strip_prefix.is_empty() {
            directory_name.0.clone()
        } else {
            directory_name.0.replace(&self.strip_prefix, "")
        };
        GroupName(format!("{stripped}{}", self.append_suffix))
    }
}

/// Value of the leading RDN of a distinguished name.
///
/// `"CN=Jane Doe,OU=IT,DC=corp"` → `"Jane Doe"`. A leading component that
/// carries any backslash escape (e.g. `CN=Doe\, Jane,...`) cannot be split
/// reliably on the first comma and is rejected.
pub fn display_name_from_dn(dn: &str) -> Result<String, NamingError> {
    let ambiguous = || NamingError::AmbiguousDisplayName { dn: dn.to_string() };

    let first = dn.split(',').next().unwrap_or_default();
    if first.contains('\\') {
        return Err(ambiguous());
    }
    let Some((attr, value)) = first.split_once('=') else {
        return Err(ambiguous());
    };
    let value = value.trim();
    if attr.trim().is_empty() || value.is_empty() {
        return Err(ambiguous());
    }
    Ok(value.to_string())
}

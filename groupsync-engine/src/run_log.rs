//! Run log: a JSON summary of the last sync run.
//!
//! Persisted at `<home>/.groupsync/runs/last.json`. Writes use the atomic
//! `.tmp` + rename pattern used for the config file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use groupsync_core::{config, MappingConflict};

use crate::error::{io_err, SyncError};
use crate::pipeline::{SyncCounts, SyncReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    Failed,
}

/// On-disk run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub counts: SyncCounts,
    #[serde(default)]
    pub conflicts: Vec<MappingConflict>,
}

impl RunRecord {
    pub fn from_result(
        started_at: DateTime<Utc>,
        result: &Result<SyncReport, SyncError>,
    ) -> Self {
        let finished_at = Utc::now();
        match result {
            Ok(report) => Self {
                started_at,
                finished_at,
                outcome: Outcome::Succeeded,
                error: None,
                counts: report.counts,
                conflicts: report.conflicts.clone(),
            },
            Err(err) => Self {
                started_at,
                finished_at,
                outcome: Outcome::Failed,
                error: Some(err.to_string()),
                counts: SyncCounts::default(),
                conflicts: Vec::new(),
            },
        }
    }
}

/// `~/.groupsync/runs/last.json`
pub fn store_path_at(home: &Path) -> PathBuf {
    config::runs_dir_at(home).join("last.json")
}

/// Load the last run record; `None` when no run has been recorded yet.
pub fn load_at(home: &Path) -> Result<Option<RunRecord>, SyncError> {
    let path = store_path_at(home);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(Some(serde_json::from_str(&contents)?))
}

pub fn save_at(home: &Path, record: &RunRecord) -> Result<PathBuf, SyncError> {
    let path = store_path_at(home);
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid run log path")));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(record)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupsync_core::{GroupName, ProviderError};
    use tempfile::TempDir;

    fn succeeded() -> RunRecord {
        let report = SyncReport {
            counts: SyncCounts {
                directory_groups: 2,
                groups_created: 1,
                users_created: 3,
                memberships_updated: 1,
            },
            conflicts: vec![MappingConflict::DirectoryCollision {
                mapped_name: GroupName::from("Ops (AD)"),
                sources: vec![GroupName::from("Ops"), GroupName::from("Monitoring - Ops")],
            }],
            ..SyncReport::default()
        };
        RunRecord::from_result(Utc::now(), &Ok(report))
    }

    #[test]
    fn missing_log_is_none() {
        let home = TempDir::new().expect("home");
        assert!(load_at(home.path()).expect("load").is_none());
    }

    #[test]
    fn saved_record_loads_back() {
        let home = TempDir::new().expect("home");
        let record = succeeded();
        let path = save_at(home.path(), &record).expect("save");
        assert!(path.ends_with(".groupsync/runs/last.json"));
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(load_at(home.path()).expect("load"), Some(record));
    }

    #[test]
    fn failed_run_keeps_error_text() {
        let err = SyncError::Provider(ProviderError::Connectivity {
            endpoint: "ldap://dc".into(),
            message: "timed out".into(),
        });
        let record = RunRecord::from_result(Utc::now(), &Err(err));
        assert_eq!(record.outcome, Outcome::Failed);
        assert!(record.error.as_deref().is_some_and(|e| e.contains("timed out")));
        assert_eq!(record.counts, SyncCounts::default());
    }

    #[test]
    fn corrupt_log_is_an_error() {
        let home = TempDir::new().expect("home");
        let path = store_path_at(home.path());
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, "{not json").expect("write");
        assert!(matches!(load_at(home.path()), Err(SyncError::Json(_))));
    }
}

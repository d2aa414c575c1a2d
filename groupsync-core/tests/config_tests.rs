//! Config load error-message, init, and validation integration tests.
//! Storage: ~/.groupsync/config.yaml

use assert_fs::prelude::*;
use groupsync_core::{
    config::{self, AuthMode, UserField},
    provider::GroupFilter,
    ConfigError, GroupName,
};
use predicates::prelude::predicate;
use rstest::rstest;
use std::fs;

const MINIMAL: &str = r#"
directory:
  url: ldap://dc.corp.local
  bind_dn: CN=svc,DC=corp,DC=local
  bind_password: pw
  users_ou: OU=Users,DC=corp,DC=local
  groups_ou: OU=Groups,DC=corp,DC=local
  group_prefix: "Monitoring - "
monitoring:
  url: https://zabbix.corp.local
  username: Admin
  password: zabbix
  default_group: AD Users
"#;

fn write_config(home: &assert_fs::TempDir, body: &str) -> std::path::PathBuf {
    let file = home.child(".groupsync/config.yaml");
    file.write_str(body).expect("write config");
    file.path().to_path_buf()
}

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_missing_config_mentions_init() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = config::load_from(&config::config_path_at(home.path())).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("groupsync init"));
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = write_config(&home, ": : corrupt : yaml : !!!\n  - broken: [unclosed");

    let err = config::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn load_missing_section_returns_parse_error() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = write_config(&home, "naming:\n  strip_prefix: x\n");
    let err = config::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Defaults and validation
// ---------------------------------------------------------------------------

#[test]
fn minimal_config_fills_defaults() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = write_config(&home, MINIMAL);

    let cfg = config::load_from(&path).expect("load");
    assert_eq!(cfg.directory.timeout_secs, 10);
    assert!(cfg.directory.tls_verify);
    assert_eq!(cfg.monitoring.auth, AuthMode::Body);
    assert_eq!(cfg.monitoring.user_field, UserField::Alias);
    assert_eq!(cfg.monitoring.user_defaults.rows_per_page, 100);
    assert_eq!(cfg.logging.level, "info");
    assert_eq!(
        cfg.directory.group_filter(),
        Some(GroupFilter::Prefix("Monitoring - ".into()))
    );
    assert_eq!(
        cfg.naming.map_to_monitoring_name(&GroupName::from("Monitoring - Ops")),
        GroupName::from("Monitoring - Ops"),
        "absent naming section maps names unchanged"
    );
}

#[rstest]
#[case("url: ldap://dc.corp.local", "url: \"\"", "directory.url")]
#[case("users_ou: OU=Users,DC=corp,DC=local", "users_ou: \" \"", "directory.users_ou")]
#[case("default_group: AD Users", "default_group: \"\"", "monitoring.default_group")]
#[case("group_prefix: \"Monitoring - \"", "group_prefix: \"\"", "directory.groups")]
fn invalid_fields_are_named(#[case] from: &str, #[case] to: &str, #[case] field: &str) {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = write_config(&home, &MINIMAL.replacen(from, to, 1));
    let err = config::load_from(&path).unwrap_err();
    assert!(
        matches!(&err, ConfigError::Invalid { field: f, .. } if *f == field),
        "got: {err}"
    );
}

// ---------------------------------------------------------------------------
// 3. Init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_loadable_config() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let (path, created) = config::init_at(home.path()).expect("init");
    assert!(created);
    home.child(".groupsync/config.yaml")
        .assert(predicate::path::exists());
    home.child(".groupsync/config.yaml.tmp")
        .assert(predicate::path::missing());

    let cfg = config::load_from(&path).expect("skeleton loads");
    assert_eq!(cfg.monitoring.default_group, "AD Users");
    assert!(matches!(
        cfg.directory.group_filter(),
        Some(GroupFilter::Names(ref names)) if names == &vec![GroupName::from("Monitoring - Read Access")]
    ));
}

#[test]
fn init_does_not_overwrite_existing_config() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = write_config(&home, MINIMAL);
    let (_, created) = config::init_at(home.path()).expect("init");
    assert!(!created);
    assert_eq!(fs::read_to_string(path).expect("read"), MINIMAL);
}

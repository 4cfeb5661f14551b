use chrono::NaiveDate;
use patchnotes::document::DocumentShape;
use patchnotes::load_config::{load_config, ARCHIVE_DIR_ENV};
use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

const FULL_CONFIG: &str = r#"
index_url: "https://worldofwarcraft.blizzard.com/en-us/search/blog?k=Update%20Notes"
stop_after: "/23885941/"
timeout_secs: 30
archive_dir: ./site
documents:
  - url_contains: "/hotfixes-"
    shape: { kind: hotfixes }
  - url_contains: "/23892227/"
    shape:
      kind: content_update
      version: "10.0.5"
      date: 2023-01-24
      first_heading_id: item3
tags:
  casing:
    "PATCH NOTES": ""
  exclude:
    - "Cataclysm Classic"
"#;

fn config_file(content: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), content).expect("write config");
    file
}

/// A full config file maps onto ScrapeConfig, defaults fill the rest.
#[test]
#[serial]
fn test_load_config_success() {
    env::remove_var(ARCHIVE_DIR_ENV);
    let file = config_file(FULL_CONFIG);

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.stop_after.as_deref(), Some("/23885941/"));
    assert_eq!(config.timeout_secs, 30);
    assert_eq!(config.link_class, "NewsBlog-link");
    assert_eq!(config.container, ".Blog .detail");
    assert_eq!(config.archive_dir, Some(PathBuf::from("./site")));
    assert_eq!(config.documents.len(), 2);
    assert_eq!(
        config.documents[1].shape,
        DocumentShape::ContentUpdate {
            version: "10.0.5".to_string(),
            date: NaiveDate::from_ymd_opt(2023, 1, 24).expect("valid date"),
            first_heading_id: Some("item3".to_string()),
        }
    );
    let rules = config.tag_rules();
    assert!(rules
        .casing_overrides()
        .any(|(upper, canonical)| upper == "PATCH NOTES" && canonical.is_empty()));
}

/// The environment can point the archive elsewhere.
#[test]
#[serial]
fn test_load_config_archive_dir_from_env() {
    env::set_var(ARCHIVE_DIR_ENV, "/var/lib/patchnotes");
    let file = config_file(FULL_CONFIG);

    let config = load_config(file.path()).expect("Config should load");
    env::remove_var(ARCHIVE_DIR_ENV);

    assert_eq!(config.archive_dir, Some(PathBuf::from("/var/lib/patchnotes")));
}

/// If the config file is not valid YAML, load_config errors and reports as such.
#[test]
#[serial]
fn test_load_config_errors_for_invalid_file() {
    let file = config_file("not-yaml: [:::");

    let err = load_config(file.path()).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[test]
#[serial]
fn test_load_config_errors_for_missing_file() {
    let err = load_config("/definitely/not/here.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
#[serial]
fn test_load_config_rejects_unknown_shape_and_zero_timeout() {
    let file = config_file("documents:\n  - url_contains: \"/x/\"\n    shape: { kind: podcast }\n");
    assert!(load_config(file.path()).is_err());

    let file = config_file("timeout_secs: 0\n");
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("timeout_secs"));
}

//! `load_config`: reads the YAML run configuration into a [`ScrapeConfig`].
//!
//! This is the only place where the configuration file is parsed. The
//! `PATCHNOTES_ARCHIVE_DIR` environment variable, if set, replaces
//! `archive_dir`, so the archive location can live in `.env` next to
//! `RUST_LOG`.
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::config::ScrapeConfig;

pub const ARCHIVE_DIR_ENV: &str = "PATCHNOTES_ARCHIVE_DIR";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ScrapeConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    let mut config: ScrapeConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML {:?}: {e}", path_ref));
        }
    };

    if let Ok(dir) = std::env::var(ARCHIVE_DIR_ENV) {
        if !dir.is_empty() {
            info!(archive_dir = %dir, "{} set, overriding archive_dir", ARCHIVE_DIR_ENV);
            config.archive_dir = Some(PathBuf::from(dir));
        }
    }

    if config.timeout_secs == 0 {
        error!(config_path = ?path_ref, "timeout_secs must be positive");
        anyhow::bail!("timeout_secs must be positive");
    }
    if config.container.split_whitespace().next().is_none() {
        error!(config_path = ?path_ref, "container selector is empty");
        anyhow::bail!("container selector is empty");
    }
    if let Some(rule) = config.documents.iter().find(|r| r.url_contains.is_empty()) {
        error!(shape = ?rule.shape, "Document rule with empty url_contains");
        anyhow::bail!("document rule with empty url_contains would match every URL");
    }

    config.trace_loaded();
    Ok(config)
}

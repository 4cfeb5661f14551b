use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::document::{default_rules, DocumentRule, DEFAULT_CONTAINER};
use crate::tags::TagRules;

pub const DEFAULT_LINK_CLASS: &str = "NewsBlog-link";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Run configuration, read from YAML by [`crate::load_config::load_config`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Listing page with links to the change documents. Required by `scrape`.
    #[serde(default)]
    pub index_url: Option<String>,
    #[serde(default = "default_link_class")]
    pub link_class: String,
    #[serde(default)]
    pub stop_after: Option<String>,
    #[serde(default = "default_container")]
    pub container: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Earlier output files, consulted for tag spellings.
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,
    #[serde(default = "default_rules")]
    pub documents: Vec<DocumentRule>,
    #[serde(default)]
    pub tags: TagConfig,
}

/// Additions to the built-in tag tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagConfig {
    #[serde(default)]
    pub aliases: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub casing: BTreeMap<String, String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_link_class() -> String {
    DEFAULT_LINK_CLASS.to_string()
}

fn default_container() -> String {
    DEFAULT_CONTAINER.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            index_url: None,
            link_class: default_link_class(),
            stop_after: None,
            container: default_container(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            archive_dir: None,
            documents: default_rules(),
            tags: TagConfig::default(),
        }
    }
}

impl ScrapeConfig {
    pub fn trace_loaded(&self) {
        info!(
            index_url = self.index_url.as_deref().unwrap_or("<none>"),
            container = %self.container,
            timeout_secs = self.timeout_secs,
            documents = self.documents.len(),
            archive_dir = ?self.archive_dir,
            "Loaded ScrapeConfig"
        );
        debug!(?self, "ScrapeConfig loaded (full debug)");
    }

    /// Built-in tag tables extended with the `tags` section.
    pub fn tag_rules(&self) -> TagRules {
        TagRules::default()
            .with_aliases(self.tags.aliases.clone())
            .with_casing(self.tags.casing.clone())
            .with_exclusions(self.tags.exclude.clone())
    }
}

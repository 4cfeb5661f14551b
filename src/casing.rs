//! Batch-wide tag reconciliation: canonical casing and near-duplicate report.
//!
//! Some pages spell category headings in capitals instead of styling them.
//! Those tags are rewritten to the spelling used elsewhere in the batch or
//! in earlier output files. An ALL-CAPS tag nobody can explain fails the run.

use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::contract::ScrapeError;
use crate::flatten::ChangeRecord;
use crate::tags::TagRules;

/// Upper-cased tag to canonical spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CasingMap {
    canonical: HashMap<String, String>,
}

impl CasingMap {
    /// Collect spellings in order of precedence: configured overrides, then
    /// the batch, then the archive. The first spelling seen for a key wins.
    pub fn build(rules: &TagRules, records: &[ChangeRecord], archive: &[String]) -> Self {
        let mut map = Self::default();
        for (upper, canonical) in rules.casing_overrides() {
            map.insert_spelling(upper.to_string(), canonical.to_string());
        }
        let seen = records.iter().flat_map(|r| r.tags.iter()).chain(archive.iter());
        for tag in seen {
            if !is_all_caps(tag) {
                map.insert_spelling(tag.to_uppercase(), tag.clone());
            }
        }
        map
    }

    fn insert_spelling(&mut self, upper: String, spelling: String) {
        self.canonical.entry(upper).or_insert(spelling);
    }

    /// Canonical spelling of an ALL-CAPS tag. `Some("")` means drop it.
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.canonical.get(tag).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }
}

/// True for tags that contain a letter and are their own upper case.
pub fn is_all_caps(tag: &str) -> bool {
    tag.chars().any(char::is_alphabetic) && tag.to_uppercase() == tag
}

/// Rewrite every tag in place and fail on ALL-CAPS leftovers.
pub fn fix_casing(
    records: &mut [ChangeRecord],
    rules: &TagRules,
    archive: &[String],
) -> Result<(), ScrapeError> {
    let map = CasingMap::build(rules, records, archive);
    debug!(spellings = map.len(), "Built casing map");

    let mut rewritten = 0usize;
    for record in records.iter_mut() {
        let tags = std::mem::take(&mut record.tags);
        for tag in tags {
            match map.get(&tag) {
                Some("") => rewritten += 1,
                Some(canonical) if canonical != tag => {
                    record.tags.push(canonical.to_string());
                    rewritten += 1;
                }
                _ => record.tags.push(tag),
            }
        }
    }

    let residual: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.tags.iter())
        .map(String::as_str)
        .filter(|tag| is_all_caps(tag))
        .collect();

    if !residual.is_empty() {
        for tag in &residual {
            error!(tag = %tag, "Upper case tag has no known spelling");
        }
        return Err(ScrapeError::UppercaseTags {
            tags: residual.into_iter().map(str::to_string).collect(),
        });
    }

    info!(rewritten, "Fixed tag casing");
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
struct ArchiveFile {
    #[serde(rename = "Changes", default)]
    changes: Vec<ArchiveChange>,
}

#[derive(Debug, Default, Deserialize)]
struct ArchiveChange {
    // Older files carry `"Tags": null` for untagged records.
    #[serde(rename = "Tags", default)]
    tags: Option<Vec<String>>,
}

/// Every distinct tag in the `*.json` files directly inside `dir`, sorted.
///
/// A missing directory or an empty file contributes nothing. A file that
/// is not an output envelope is an error.
pub fn read_archive_tags(dir: &Path) -> Result<Vec<String>, ScrapeError> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "No archive directory");
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    let mut tags = BTreeSet::new();
    for path in &files {
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            continue;
        }
        let archive: ArchiveFile = match serde_json::from_str(&content) {
            Ok(a) => a,
            Err(e) => {
                error!(file = %path.display(), error = %e, "Failed to parse archive file");
                return Err(e.into());
            }
        };
        tags.extend(archive.changes.into_iter().flat_map(|c| c.tags.unwrap_or_default()));
    }

    info!(dir = %dir.display(), files = files.len(), tags = tags.len(), "Read archive tags");
    Ok(tags.into_iter().collect())
}

/// Two tags where one is a prefix of the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCollision {
    pub prefix: String,
    pub tag: String,
}

/// Report neighbouring tags in sorted order where the first is a prefix of
/// the second. Never fails.
pub fn check_tags(records: &[ChangeRecord]) -> Vec<TagCollision> {
    let tags: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.tags.iter())
        .map(String::as_str)
        .collect();
    let tags: Vec<&str> = tags.into_iter().collect();

    let mut collisions = Vec::new();
    for pair in tags.windows(2) {
        let (prefix, tag) = (pair[0], pair[1]);
        if tag.starts_with(prefix) {
            warn!(prefix = %prefix, tag = %tag, "Tag is a prefix of another tag");
            collisions.push(TagCollision {
                prefix: prefix.to_string(),
                tag: tag.to_string(),
            });
        }
    }
    collisions
}

//! Coordinating module for the index -> documents -> records pipeline.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

use crate::casing::{check_tags, fix_casing, read_archive_tags, TagCollision};
use crate::config::ScrapeConfig;
use crate::contract::{FetchedPage, PageFetcher, ScrapeError};
use crate::document::{scrape_document, shape_for_url, DocumentShape};
use crate::download::{batch_deadline, discover_links, fetch_before, LinkQuery};
use crate::flatten::ChangeRecord;
use crate::tags::TagRules;

/// Outcome of a run.
#[derive(Debug)]
pub struct HarvestReport {
    pub documents: usize,
    pub changes: Vec<ChangeRecord>,
    /// Tag pairs worth unifying. Informational only.
    pub collisions: Vec<TagCollision>,
}

/// Scrape every document linked from `index_url`.
///
/// All fetches share one deadline of `config.timeout_secs`. Documents are
/// processed in link order and the first error aborts the run.
pub async fn harvest(
    fetcher: &dyn PageFetcher,
    index_url: &str,
    config: &ScrapeConfig,
    rules: &TagRules,
) -> Result<HarvestReport, ScrapeError> {
    let deadline = batch_deadline(Duration::from_secs(config.timeout_secs));
    info!(index = %index_url, timeout_secs = config.timeout_secs, "[HARVEST] Starting");

    let query = LinkQuery {
        index_url,
        link_class: &config.link_class,
        stop_after: config.stop_after.as_deref(),
    };
    let links = discover_links(fetcher, &query, deadline).await?;

    let mut changes = Vec::new();
    for link in &links {
        let shape = match shape_for_url(link, &config.documents) {
            Ok(shape) => shape,
            Err(e) => {
                error!(url = %link, "[HARVEST] No document rule matches");
                return Err(e);
            }
        };
        let page = fetch_before(fetcher, link, deadline).await?;
        let records = scrape_document(&page, shape, &config.container, rules)?;
        changes.extend(records);
    }

    finish(links.len(), changes, config.archive_dir.as_deref(), rules)
}

/// Run the core on saved pages instead of fetched ones.
///
/// `url` stands in for the address the pages were saved from; without it
/// records carry no `URL`.
pub fn extract_files(
    paths: &[PathBuf],
    url: Option<&str>,
    shape: &DocumentShape,
    config: &ScrapeConfig,
    rules: &TagRules,
) -> Result<HarvestReport, ScrapeError> {
    let mut changes = Vec::new();
    for path in paths {
        let page = read_page(path, url)?;
        changes.extend(scrape_document(&page, shape, &config.container, rules)?);
    }
    finish(paths.len(), changes, config.archive_dir.as_deref(), rules)
}

/// Load a saved page. The path names the page when no URL is given.
pub fn read_page(path: &Path, url: Option<&str>) -> Result<FetchedPage, ScrapeError> {
    let body = match fs::read_to_string(path) {
        Ok(body) => body,
        Err(e) => {
            error!(error = ?e, path = %path.display(), "[HARVEST] Failed to read page");
            return Err(e.into());
        }
    };
    Ok(FetchedPage {
        url: url.map_or_else(|| path.display().to_string(), str::to_string),
        body,
    })
}

/// Batch-wide passes: casing reconciliation against the archive, then the
/// tag consistency report.
pub fn finish(
    documents: usize,
    mut changes: Vec<ChangeRecord>,
    archive_dir: Option<&Path>,
    rules: &TagRules,
) -> Result<HarvestReport, ScrapeError> {
    let archive = match archive_dir {
        Some(dir) => read_archive_tags(dir)?,
        None => Vec::new(),
    };
    fix_casing(&mut changes, rules, &archive)?;
    let collisions = check_tags(&changes);

    info!(
        documents,
        changes = changes.len(),
        collisions = collisions.len(),
        "[HARVEST] Complete"
    );
    Ok(HarvestReport {
        documents,
        changes,
        collisions,
    })
}

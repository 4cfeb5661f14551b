//! The `{ "Changes": [...] }` envelope written by `scrape` and `extract`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::contract::ScrapeError;
use crate::flatten::ChangeRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLog {
    #[serde(rename = "Changes", default)]
    pub changes: Vec<ChangeRecord>,
}

/// Pretty-print the envelope to `path`, or to stdout when `path` is `None`.
pub fn write_changes(records: &[ChangeRecord], path: Option<&Path>) -> Result<(), ScrapeError> {
    #[derive(Serialize)]
    struct Envelope<'a> {
        #[serde(rename = "Changes")]
        changes: &'a [ChangeRecord],
    }

    let mut json = serde_json::to_string_pretty(&Envelope { changes: records })?;
    json.push('\n');

    match path {
        Some(path) => {
            fs::write(path, json)?;
            info!(path = %path.display(), records = records.len(), "Wrote changes");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Read an envelope written by [`write_changes`].
pub fn read_changes(path: &Path) -> Result<Vec<ChangeRecord>, ScrapeError> {
    let content = fs::read_to_string(path)?;
    let log: ChangeLog = serde_json::from_str(&content)?;
    Ok(log.changes)
}

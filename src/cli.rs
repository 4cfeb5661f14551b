//! Command line glue for patchnotes.
//!
//! All pipeline logic lives in the library modules; this module only maps
//! arguments onto them, and [`run`] is the entry point shared by `main` and
//! the integration tests.
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::casing::check_tags;
use crate::config::ScrapeConfig;
use crate::document::{document_tree, DocumentShape};
use crate::download::HttpFetcher;
use crate::harvest::{extract_files, harvest, read_page};
use crate::load_config::load_config;
use crate::output::{read_changes, write_changes};

/// CLI for patchnotes: turn changelog pages into tagged change records.
#[derive(Parser)]
#[clap(
    name = "patchnotes",
    version,
    about = "Turn loosely structured changelog pages into normalized, tagged change records"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the index page and every linked document, print the changes as JSON
    Scrape {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Write the JSON here instead of stdout
        #[clap(long)]
        output: Option<PathBuf>,
    },
    /// Run the extraction on saved HTML files
    Extract {
        /// Path to the YAML config file; built-in defaults when omitted
        #[clap(long)]
        config: Option<PathBuf>,
        /// Address the files were saved from, used for the records' URL
        #[clap(long)]
        url: Option<String>,
        #[clap(long, value_enum, default_value_t = ShapeArg::Hotfixes)]
        shape: ShapeArg,
        /// Release version tag of a content update
        #[clap(long = "version", value_name = "V")]
        release: Option<String>,
        /// Date of a content update, YYYY-MM-DD
        #[clap(long)]
        date: Option<NaiveDate>,
        /// Id of the first heading of a content update
        #[clap(long)]
        first_heading: Option<String>,
        /// Print the classified block tree instead of records
        #[clap(long)]
        tree: bool,
        /// Write the JSON here instead of stdout
        #[clap(long)]
        output: Option<PathBuf>,
        #[clap(required = true)]
        files: Vec<PathBuf>,
    },
    /// Report tags that are a prefix of another tag in output files
    CheckTags {
        #[clap(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShapeArg {
    Hotfixes,
    ContentUpdate,
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Scrape { config, output } => {
            let config = load_config(&config)?;
            let Some(index_url) = config.index_url.clone() else {
                tracing::error!(command = "scrape", "index_url missing from config");
                anyhow::bail!("index_url must be set in the config to scrape");
            };
            let rules = config.tag_rules();
            let fetcher = HttpFetcher::new()?;

            tracing::info!(command = "scrape", index_url = %index_url, "Starting scrape");
            let report = match harvest(&fetcher, &index_url, &config, &rules).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(command = "scrape", error = %e, "Scrape failed");
                    return Err(e).context("scrape failed, no output written");
                }
            };
            write_changes(&report.changes, output.as_deref())?;
            tracing::info!(
                command = "scrape",
                documents = report.documents,
                changes = report.changes.len(),
                "Scrape complete"
            );
            Ok(())
        }
        Commands::Extract {
            config,
            url,
            shape,
            release,
            date,
            first_heading,
            tree,
            output,
            files,
        } => {
            let config = match config {
                Some(path) => load_config(path)?,
                None => ScrapeConfig::default(),
            };
            let shape = match shape {
                ShapeArg::Hotfixes => DocumentShape::Hotfixes,
                ShapeArg::ContentUpdate => {
                    let (Some(version), Some(date)) = (release, date) else {
                        anyhow::bail!("--shape content-update needs --version and --date");
                    };
                    DocumentShape::ContentUpdate {
                        version,
                        date,
                        first_heading_id: first_heading,
                    }
                }
            };

            if tree {
                for path in &files {
                    let page = read_page(path, url.as_deref())?;
                    let root = document_tree(&page, &shape, &config.container)
                        .with_context(|| format!("building block tree of {}", path.display()))?;
                    println!("{}", serde_json::to_string_pretty(&root)?);
                }
                return Ok(());
            }

            let rules = config.tag_rules();
            let report = match extract_files(&files, url.as_deref(), &shape, &config, &rules) {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(command = "extract", error = %e, "Extraction failed");
                    return Err(e).context("extraction failed, no output written");
                }
            };
            write_changes(&report.changes, output.as_deref())?;
            tracing::info!(
                command = "extract",
                files = report.documents,
                changes = report.changes.len(),
                "Extraction complete"
            );
            Ok(())
        }
        Commands::CheckTags { files } => {
            let mut changes = Vec::new();
            for path in &files {
                let records = read_changes(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                changes.extend(records);
            }
            for collision in check_tags(&changes) {
                println!("{:?} is a prefix of {:?}", collision.prefix, collision.tag);
            }
            Ok(())
        }
    }
}

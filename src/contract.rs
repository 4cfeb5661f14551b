//! # contract: seams between the extraction core and the outside world
//!
//! The core never performs I/O. Pages reach it through the [`PageFetcher`]
//! trait, so the pipeline can be driven by the real HTTP client in
//! [`crate::download`] or by a `mockall` mock in tests.
//!
//! [`ScrapeError`] is the single error type of the library. Every variant is
//! fatal: the run stops and no partial output is written.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::block::BlockType;

/// A fetched document: the final URL after redirects and the decoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: String,
    pub body: String,
}

/// Source of pages for a scraping run.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a single page by absolute URL.
    async fn fetch(&self, url: &str) -> Result<FetchedPage, ScrapeError>;
}

#[derive(Debug)]
pub enum ScrapeError {
    /// Transport failure or non-success status.
    Fetch { url: String, message: String },
    /// The shared batch deadline expired while fetching `url`.
    Timeout { url: String },
    Io(std::io::Error),
    Json(serde_json::Error),
    /// The detail container (or the configured first heading) is missing.
    MissingContainer { url: String, selector: String },
    /// No document rule matches the URL.
    UnrecognizedUrl { url: String },
    /// A hotfix document without a single dated change set.
    NoChangeSets { url: String },
    /// A dated change set without categories.
    NoCategories { date: NaiveDate },
    /// A category heading that is not followed by a list.
    MissingList { category: String },
    /// A leaf classified as a date that does not parse as one.
    InvalidDate { text: String },
    /// A node type the document grammar does not allow at this position.
    UnexpectedNode { kind: BlockType, text: String },
    /// Tags still ALL-CAPS after casing reconciliation.
    UppercaseTags { tags: Vec<String> },
}

impl fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrapeError::Fetch { url, message } => write!(f, "fetching {url}: {message}"),
            ScrapeError::Timeout { url } => write!(f, "deadline exceeded while fetching {url}"),
            ScrapeError::Io(e) => write!(f, "I/O error: {e}"),
            ScrapeError::Json(e) => write!(f, "JSON error: {e}"),
            ScrapeError::MissingContainer { url, selector } => {
                write!(f, "no element matching {selector:?} in {url}")
            }
            ScrapeError::UnrecognizedUrl { url } => write!(f, "unrecognizable URL: {url}"),
            ScrapeError::NoChangeSets { url } => write!(f, "no change sets in {url}"),
            ScrapeError::NoCategories { date } => {
                write!(f, "no categories in change set {date}")
            }
            ScrapeError::MissingList { category } => {
                write!(f, "no changes in category {category:?}")
            }
            ScrapeError::InvalidDate { text } => write!(f, "not a date: {text:?}"),
            ScrapeError::UnexpectedNode { kind, text } => {
                write!(f, "unexpected {kind} node: {text:?}")
            }
            ScrapeError::UppercaseTags { tags } => {
                write!(f, "upper case tags remain after casing fix: {}", tags.join(", "))
            }
        }
    }
}

impl std::error::Error for ScrapeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScrapeError::Io(e) => Some(e),
            ScrapeError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ScrapeError {
    fn from(e: std::io::Error) -> Self {
        ScrapeError::Io(e)
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(e: serde_json::Error) -> Self {
        ScrapeError::Json(e)
    }
}

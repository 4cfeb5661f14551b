//! Network side of a run: the reqwest fetcher and index page link discovery.

use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info};

use crate::contract::{FetchedPage, PageFetcher, ScrapeError};
use crate::markup::{self, Element};

/// Fetches pages over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ScrapeError::Fetch {
                url: String::new(),
                message: format!("building HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, ScrapeError> {
        info!(url = %url, "Fetching page");

        let response = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                error!(error = ?e, url = %url, "Failed to fetch page");
                return Err(ScrapeError::Fetch {
                    url: url.to_string(),
                    message: e.to_string(),
                });
            }
        };

        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            error!(status = %status, url = %url, "Server returned error status");
            return Err(ScrapeError::Fetch {
                url: url.to_string(),
                message: format!("HTTP status {status}"),
            });
        }

        match response.text().await {
            Ok(body) => {
                debug!(url = %final_url, bytes = body.len(), "Fetched page");
                Ok(FetchedPage {
                    url: final_url,
                    body,
                })
            }
            Err(e) => {
                error!(error = ?e, url = %url, "Failed to read response body");
                Err(ScrapeError::Fetch {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Deadline shared by every fetch of one batch.
pub fn batch_deadline(timeout: Duration) -> Instant {
    Instant::now() + timeout
}

/// Fetch `url`, giving up when the batch deadline passes.
pub async fn fetch_before(
    fetcher: &dyn PageFetcher,
    url: &str,
    deadline: Instant,
) -> Result<FetchedPage, ScrapeError> {
    match timeout_at(deadline, fetcher.fetch(url)).await {
        Ok(result) => result,
        Err(_) => {
            error!(url = %url, "Batch deadline exceeded");
            Err(ScrapeError::Timeout {
                url: url.to_string(),
            })
        }
    }
}

/// Links to change documents on an index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkQuery<'a> {
    pub index_url: &'a str,
    /// Class of the anchors to follow.
    pub link_class: &'a str,
    /// Stop after the first link containing this.
    pub stop_after: Option<&'a str>,
}

/// Fetch the index page and list the document URLs it links to.
pub async fn discover_links(
    fetcher: &dyn PageFetcher,
    query: &LinkQuery<'_>,
    deadline: Instant,
) -> Result<Vec<String>, ScrapeError> {
    let page = fetch_before(fetcher, query.index_url, deadline).await?;
    let links = links_in_page(&page, query.link_class, query.stop_after)?;
    info!(index = %page.url, links = links.len(), "Discovered document links");
    Ok(links)
}

/// Resolve the `href`s of anchors carrying `link_class` against the page URL.
pub fn links_in_page(
    page: &FetchedPage,
    link_class: &str,
    stop_after: Option<&str>,
) -> Result<Vec<String>, ScrapeError> {
    let base = Url::parse(&page.url).map_err(|e| ScrapeError::Fetch {
        url: page.url.clone(),
        message: format!("invalid page URL: {e}"),
    })?;
    let doc = markup::parse(&page.body);

    let mut links: Vec<String> = Vec::new();
    let anchors = doc.find_all(&|el: &Element| el.name == "a" && el.has_class(link_class));
    for anchor in anchors {
        let Some(href) = anchor.attr("href") else {
            continue;
        };
        let resolved = base.join(href).map_err(|e| ScrapeError::Fetch {
            url: page.url.clone(),
            message: format!("invalid link {href:?}: {e}"),
        })?;
        let resolved = resolved.to_string();
        if !links.contains(&resolved) {
            links.push(resolved);
        }
        if stop_after.is_some_and(|stop| href.contains(stop)) {
            debug!(href = %href, "Reached last link");
            break;
        }
    }
    Ok(links)
}

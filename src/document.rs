//! Per-document entry point: page body in, change records out.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::block::{self, Block};
use crate::contract::{FetchedPage, ScrapeError};
use crate::flatten::{collect_records, source_url, ChangeRecord, CollectContext};
use crate::markup::{self, Element, Node};
use crate::tags::TagRules;

/// Class chain of the article body on every supported page.
pub const DEFAULT_CONTAINER: &str = ".Blog .detail";

/// How a document lays out its change sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentShape {
    /// Date headings, each followed by category paragraphs and their lists.
    Hotfixes,
    /// One release: category headings under an implicit date and version.
    ContentUpdate {
        version: String,
        date: NaiveDate,
        /// Id of the first heading to read; everything before it is preamble.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        first_heading_id: Option<String>,
    },
}

/// Maps URLs to document shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRule {
    pub url_contains: String,
    pub shape: DocumentShape,
}

/// Rules for the pages the scraper was written against.
pub fn default_rules() -> Vec<DocumentRule> {
    vec![
        DocumentRule {
            url_contains: "/hotfixes-".to_string(),
            shape: DocumentShape::Hotfixes,
        },
        DocumentRule {
            url_contains: "/23892227/".to_string(),
            shape: DocumentShape::ContentUpdate {
                version: "10.0.5".to_string(),
                date: NaiveDate::from_ymd_opt(2023, 1, 24).unwrap_or_default(),
                first_heading_id: Some("item3".to_string()),
            },
        },
    ]
}

/// The shape of the first rule whose substring occurs in `url`.
pub fn shape_for_url<'a>(url: &str, rules: &'a [DocumentRule]) -> Result<&'a DocumentShape, ScrapeError> {
    rules
        .iter()
        .find(|rule| url.contains(&rule.url_contains))
        .map(|rule| &rule.shape)
        .ok_or_else(|| ScrapeError::UnrecognizedUrl {
            url: url.to_string(),
        })
}

/// Parse a page and build its normalized, classified block tree.
pub fn document_tree(
    page: &FetchedPage,
    shape: &DocumentShape,
    container: &str,
) -> Result<Block, ScrapeError> {
    let doc = markup::parse(&page.body);
    let detail = doc
        .find_by_class_chain(container)
        .ok_or_else(|| ScrapeError::MissingContainer {
            url: page.url.clone(),
            selector: container.to_string(),
        })?;

    let siblings = block::unwrap_wrappers(&detail.children);
    let start = match shape {
        DocumentShape::ContentUpdate {
            first_heading_id: Some(id),
            ..
        } => siblings
            .iter()
            .position(|node| has_id(node, id))
            .ok_or_else(|| ScrapeError::MissingContainer {
                url: page.url.clone(),
                selector: format!("#{id}"),
            })?,
        _ => 0,
    };

    let mut root = Block::group(block::extract_siblings(&siblings[start..]));
    block::normalize(&mut root);
    block::classify_tree(&mut root);
    Ok(root)
}

fn has_id(node: &Node, id: &str) -> bool {
    node.as_element().and_then(Element::id) == Some(id)
}

/// Extract all change records of one page.
pub fn scrape_document(
    page: &FetchedPage,
    shape: &DocumentShape,
    container: &str,
    rules: &TagRules,
) -> Result<Vec<ChangeRecord>, ScrapeError> {
    let root = document_tree(page, shape, container)?;

    let ctx = CollectContext::new(page.url.as_str()).with_source_url(source_url(&page.url));
    let ctx = match shape {
        DocumentShape::Hotfixes => ctx,
        DocumentShape::ContentUpdate { version, date, .. } => {
            ctx.with_date(*date).with_base_tags(vec![version.clone()])
        }
    };

    let records = collect_records(&root, &ctx, rules)?;
    info!(url = %page.url, records = records.len(), "Scraped document");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> FetchedPage {
        FetchedPage {
            url: "https://example.com/en-us/news/23892227/dragonflight-10-0-5".to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = default_rules();
        assert_eq!(
            shape_for_url("https://example.com/news/1/hotfixes-march-7", &rules).expect("shape"),
            &DocumentShape::Hotfixes
        );
        assert!(matches!(
            shape_for_url("https://example.com/news/23892227/notes", &rules),
            Ok(DocumentShape::ContentUpdate { version, .. }) if version == "10.0.5"
        ));
        assert!(matches!(
            shape_for_url("https://example.com/news/1/other", &rules),
            Err(ScrapeError::UnrecognizedUrl { .. })
        ));
    }

    #[test]
    fn content_update_skips_the_preamble() {
        let body = r#"<html><body><div class="Blog"><div class="detail">
            <p>Welcome to the patch.</p>
            <div><h4 id="item2">Preamble</h4><ul><li>Skipped.</li></ul></div>
            <h4 id="item3">Mythic+</h4>
            <ul><li>Players entering a dungeon now receive a buff.</li></ul>
        </div></div></body></html>"#;
        let shape = DocumentShape::ContentUpdate {
            version: "10.0.5".to_string(),
            date: NaiveDate::from_ymd_opt(2023, 1, 24).expect("valid date"),
            first_heading_id: Some("item3".to_string()),
        };

        let records =
            scrape_document(&page(body), &shape, DEFAULT_CONTAINER, &TagRules::default()).expect("records");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tags, vec!["10.0.5", "Mythic+"]);
        assert_eq!(records[0].weekday, "Tuesday");
        assert_eq!(
            records[0].url.as_deref(),
            Some("https://example.com/en-us/news/23892227")
        );
    }

    #[test]
    fn missing_container_and_heading() {
        let shape = DocumentShape::ContentUpdate {
            version: "10.0.5".to_string(),
            date: NaiveDate::from_ymd_opt(2023, 1, 24).expect("valid date"),
            first_heading_id: Some("item3".to_string()),
        };
        assert!(matches!(
            scrape_document(&page("<p>nothing</p>"), &shape, DEFAULT_CONTAINER, &TagRules::default()),
            Err(ScrapeError::MissingContainer { selector, .. }) if selector == DEFAULT_CONTAINER
        ));
        assert!(matches!(
            scrape_document(
                &page(r#"<div class="Blog"><div class="detail"><h4>Mythic+</h4></div></div>"#),
                &shape,
                DEFAULT_CONTAINER,
                &TagRules::default()
            ),
            Err(ScrapeError::MissingContainer { selector, .. }) if selector == "#item3"
        ));
    }

    #[test]
    fn shapes_deserialize_from_tagged_yaml() {
        let rules: Vec<DocumentRule> = serde_yaml::from_str(
            r#"
- url_contains: "/hotfixes-"
  shape: { kind: hotfixes }
- url_contains: "/24000000/"
  shape:
    kind: content_update
    version: "10.1.0"
    date: 2023-05-02
"#,
        )
        .expect("rules");
        assert_eq!(rules[0].shape, DocumentShape::Hotfixes);
        assert_eq!(
            rules[1].shape,
            DocumentShape::ContentUpdate {
                version: "10.1.0".to_string(),
                date: NaiveDate::from_ymd_opt(2023, 5, 2).expect("valid date"),
                first_heading_id: None,
            }
        );
    }
}

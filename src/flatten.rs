//! Record collection: turns a classified block tree into change records.

use chrono::{Datelike, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::block::{parse_long_date, Block, BlockType};
use crate::contract::ScrapeError;
use crate::tags::{clean_tag, Tag, TagRules};

static LEADING_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]+").expect("valid regex"));
static REPEATED_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
static REPEATED_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\n+").expect("valid regex"));

/// One change statement with its date and category path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    #[serde(rename = "URL", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Weekday")]
    pub weekday: String,
    #[serde(rename = "Tags", default)]
    pub tags: Vec<String>,
    #[serde(rename = "Text")]
    pub text: String,
}

impl ChangeRecord {
    /// Build a record from the tag stack in effect at a change leaf.
    ///
    /// Text prefixes are moved from the tags to the front of the text.
    pub fn new(stamp: &Stamp, tags: &[Tag], text: &str) -> Self {
        let mut body = String::new();
        let mut categories = Vec::with_capacity(tags.len());
        for tag in tags {
            match tag {
                Tag::Category(name) => categories.push(name.clone()),
                Tag::TextPrefix(prefix) => {
                    body.push_str(prefix);
                    body.push(' ');
                }
            }
        }
        body.push_str(&normalize_text(text));

        Self {
            url: stamp.url.clone(),
            date: stamp.date,
            weekday: weekday_name(stamp.date.weekday()).to_string(),
            tags: categories,
            text: body,
        }
    }
}

/// Date and source shared by every record of one change group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    pub date: NaiveDate,
    pub url: Option<String>,
}

/// Caller-supplied inputs of [`collect_records`].
#[derive(Debug, Clone, Default)]
pub struct CollectContext {
    /// Names the document in diagnostics.
    pub document: String,
    /// Written to every record, see [`source_url`].
    pub source_url: Option<String>,
    /// Implicit date of documents without date headings.
    pub date: Option<NaiveDate>,
    /// Tags prepended to every category, e.g. the release version.
    pub base_tags: Vec<String>,
}

impl CollectContext {
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            ..Default::default()
        }
    }

    pub fn with_source_url(mut self, url: Option<String>) -> Self {
        self.source_url = url;
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_base_tags(mut self, tags: Vec<String>) -> Self {
        self.base_tags = tags;
        self
    }
}

/// Where the current change set's date came from.
#[derive(Debug, Clone, Copy)]
struct ActiveDate {
    date: NaiveDate,
    from_heading: bool,
    groups: usize,
}

/// Walk the top-level nodes under `root` and collect every change record.
///
/// A date heading opens a change set, a tag heading names the category of
/// the node that follows it, and that node is flattened as one change group.
pub fn collect_records(
    root: &Block,
    ctx: &CollectContext,
    rules: &TagRules,
) -> Result<Vec<ChangeRecord>, ScrapeError> {
    let mut records = Vec::new();
    let mut active = ctx.date.map(|date| ActiveDate {
        date,
        from_heading: false,
        groups: 0,
    });
    let mut pending: Option<&str> = None;

    for node in &root.children {
        if let Some(category) = pending.take() {
            if matches!(node.kind, BlockType::Date | BlockType::Tag) {
                return Err(ScrapeError::MissingList {
                    category: category.to_string(),
                });
            }
            // A category is only ever pending while a date is active.
            if let Some(active) = active.as_mut() {
                let mut tags: Vec<Tag> = ctx.base_tags.iter().cloned().map(Tag::Category).collect();
                tags.extend(clean_tag(category, rules));
                let stamp = Stamp {
                    date: active.date,
                    url: ctx.source_url.clone(),
                };
                let before = records.len();
                flatten_changes(std::slice::from_ref(node), tags, &stamp, rules, &mut records)?;
                debug!(
                    category = %category,
                    date = %active.date,
                    records = records.len() - before,
                    "Collected change group"
                );
                active.groups += 1;
            }
            continue;
        }

        match node.kind {
            BlockType::Date => {
                finish_change_set(active)?;
                let date = parse_long_date(&node.text).ok_or_else(|| ScrapeError::InvalidDate {
                    text: node.text.clone(),
                })?;
                active = Some(ActiveDate {
                    date,
                    from_heading: true,
                    groups: 0,
                });
            }
            BlockType::Tag if active.is_some() => pending = Some(node.text.as_str()),
            kind => {
                debug!(kind = %kind, text = %node.text, "Skipping node outside of a change set");
            }
        }
    }

    if let Some(category) = pending {
        return Err(ScrapeError::MissingList {
            category: category.to_string(),
        });
    }
    finish_change_set(active)?;

    if active.is_none() {
        return Err(ScrapeError::NoChangeSets {
            url: ctx.document.clone(),
        });
    }

    Ok(records)
}

fn finish_change_set(active: Option<ActiveDate>) -> Result<(), ScrapeError> {
    match active {
        Some(set) if set.from_heading && set.groups == 0 => {
            Err(ScrapeError::NoCategories { date: set.date })
        }
        _ => Ok(()),
    }
}

/// Depth-first walk of a change group.
///
/// Tag nodes extend the tag stack for their later siblings, group nodes
/// recurse with a copy of the stack and change nodes emit a record. A
/// subtree whose tag stack hits the exclusion list contributes nothing.
pub fn flatten_changes(
    nodes: &[Block],
    mut tags: Vec<Tag>,
    stamp: &Stamp,
    rules: &TagRules,
    out: &mut Vec<ChangeRecord>,
) -> Result<(), ScrapeError> {
    if rules.is_excluded(&tags) {
        debug!(tags = ?tags, "Skipping excluded subtree");
        return Ok(());
    }

    for node in nodes {
        match node.kind {
            BlockType::Tag => {
                tags.extend(clean_tag(&node.text, rules));
                if rules.is_excluded(&tags) {
                    debug!(tags = ?tags, "Skipping excluded subtree");
                    return Ok(());
                }
            }
            BlockType::Unclassified => {
                flatten_changes(&node.children, tags.clone(), stamp, rules, out)?;
            }
            BlockType::Change => out.push(ChangeRecord::new(stamp, &tags, &node.text)),
            BlockType::Date => {
                return Err(ScrapeError::UnexpectedNode {
                    kind: node.kind,
                    text: node.text.clone(),
                })
            }
        }
    }

    Ok(())
}

/// The document URL with its last path segment removed.
pub fn source_url(document_url: &str) -> Option<String> {
    let mut url = Url::parse(document_url).ok()?;
    let dir = match url.path().rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => url.path()[..idx].to_string(),
    };
    url.set_path(&dir);
    Some(url.to_string())
}

/// Collapse runs of blanks and blank lines.
pub fn normalize_text(text: &str) -> String {
    let text = LEADING_SPACE.replace_all(text.trim(), "\n");
    let text = REPEATED_SPACE.replace_all(&text, " ");
    REPEATED_NEWLINE.replace_all(&text, "\n\n").into_owned()
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn tag(text: &str) -> Block {
        Block::typed(BlockType::Tag, text)
    }

    fn change(text: &str) -> Block {
        Block::typed(BlockType::Change, text)
    }

    fn heading(text: &str) -> Block {
        Block::typed(BlockType::Date, text)
    }

    fn group(children: Vec<Block>) -> Block {
        Block::group(children)
    }

    fn tags_of(records: &[ChangeRecord]) -> Vec<Vec<&str>> {
        records
            .iter()
            .map(|r| r.tags.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn content_update_category_with_base_tag() {
        let root = group(vec![
            tag("Mythic+"),
            group(vec![change("Players entering a dungeon now receive a buff.")]),
        ]);
        let ctx = CollectContext::new("10.0.5")
            .with_date(date(2023, 1, 24))
            .with_base_tags(vec!["10.0.5".to_string()]);

        let records = collect_records(&root, &ctx, &TagRules::default()).expect("records");

        assert_eq!(
            records,
            vec![ChangeRecord {
                url: None,
                date: date(2023, 1, 24),
                weekday: "Tuesday".to_string(),
                tags: vec!["10.0.5".to_string(), "Mythic+".to_string()],
                text: "Players entering a dungeon now receive a buff.".to_string(),
            }]
        );
    }

    #[test]
    fn nested_tags_follow_document_order() {
        let root = group(vec![
            heading("March 7, 2023"),
            tag("Classes"),
            group(vec![
                group(vec![tag("Mage"), group(vec![change("Blizzard hits harder.")])]),
                group(vec![tag("Priest"), tag("Discipline, Shadow"), change("Fixed a bug.")]),
                change("All classes were adjusted."),
            ]),
        ]);
        let ctx = CollectContext::new("hotfixes");

        let records = collect_records(&root, &ctx, &TagRules::default()).expect("records");

        assert_eq!(
            tags_of(&records),
            vec![
                vec!["Classes", "Mage"],
                vec!["Classes", "Priest", "Discipline", "Shadow"],
                vec!["Classes"],
            ]
        );
        assert!(records.iter().all(|r| r.weekday == "Tuesday"));
    }

    #[test]
    fn excluded_subtrees_emit_nothing() {
        let root = group(vec![
            heading("March 7, 2023"),
            tag("Dungeons"),
            group(vec![
                group(vec![tag("Wrath of the Lich King Classic"), group(vec![change("Gone.")])]),
                change("Kept."),
            ]),
            tag("Season of Discovery"),
            group(vec![change("Also gone.")]),
        ]);
        let ctx = CollectContext::new("hotfixes");

        let records = collect_records(&root, &ctx, &TagRules::default()).expect("records");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "Kept.");
        assert_eq!(records[0].tags, vec!["Dungeons and Raids"]);
    }

    #[test]
    fn text_prefix_moves_into_the_text() {
        let root = group(vec![
            heading("March 7, 2023"),
            tag("Raids [with weekly restarts]"),
            group(vec![change("Loot   was\n   improved.")]),
        ]);
        let ctx = CollectContext::new("hotfixes");

        let records = collect_records(&root, &ctx, &TagRules::default()).expect("records");

        assert_eq!(records[0].tags, vec!["Raids"]);
        assert_eq!(records[0].text, "[with weekly restarts] Loot was\nimproved.");
    }

    #[test]
    fn structural_errors() {
        let rules = TagRules::default();
        let ctx = CollectContext::new("hotfixes");

        let dangling = group(vec![heading("March 7, 2023"), tag("Classes")]);
        assert!(matches!(
            collect_records(&dangling, &ctx, &rules),
            Err(ScrapeError::MissingList { category }) if category == "Classes"
        ));

        let followed_by_date = group(vec![heading("March 7, 2023"), tag("Classes"), heading("March 8, 2023")]);
        assert!(matches!(
            collect_records(&followed_by_date, &ctx, &rules),
            Err(ScrapeError::MissingList { .. })
        ));

        let followed_by_tag = group(vec![
            heading("March 7, 2023"),
            tag("Classes"),
            tag("Mage"),
            group(vec![change("Blizzard hits harder."), change("Frost Nova is faster.")]),
        ]);
        assert!(matches!(
            collect_records(&followed_by_tag, &ctx, &rules),
            Err(ScrapeError::MissingList { category }) if category == "Classes"
        ));

        let empty_set = group(vec![heading("March 7, 2023"), heading("March 8, 2023")]);
        assert!(matches!(
            collect_records(&empty_set, &ctx, &rules),
            Err(ScrapeError::NoCategories { date: d }) if d == date(2023, 3, 7)
        ));

        let undated = group(vec![tag("Classes"), group(vec![change("Fixed.")])]);
        assert!(matches!(
            collect_records(&undated, &ctx, &rules),
            Err(ScrapeError::NoChangeSets { .. })
        ));

        let bad_date = group(vec![heading("Smarch 7, 2023")]);
        assert!(matches!(
            collect_records(&bad_date, &ctx, &rules),
            Err(ScrapeError::InvalidDate { .. })
        ));

        let nested_date = group(vec![
            heading("March 7, 2023"),
            tag("Classes"),
            group(vec![heading("March 8, 2023")]),
        ]);
        assert!(matches!(
            collect_records(&nested_date, &ctx, &rules),
            Err(ScrapeError::UnexpectedNode { kind: BlockType::Date, .. })
        ));
    }

    #[test]
    fn source_url_drops_the_last_segment() {
        assert_eq!(
            source_url("https://example.com/en-us/news/23892230/hotfixes-march-7-2023").as_deref(),
            Some("https://example.com/en-us/news/23892230")
        );
        assert_eq!(
            source_url("https://example.com/page").as_deref(),
            Some("https://example.com/")
        );
        assert_eq!(source_url("not a url"), None);
    }

    #[test]
    fn records_serialize_with_capitalized_keys() {
        let record = ChangeRecord::new(
            &Stamp {
                date: date(2023, 1, 24),
                url: Some("https://example.com/news".to_string()),
            },
            &[Tag::Category("PvP".to_string())],
            "Fixed.",
        );
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "URL": "https://example.com/news",
                "Date": "2023-01-24",
                "Weekday": "Tuesday",
                "Tags": ["PvP"],
                "Text": "Fixed."
            })
        );
    }
}

//! Generic block tree: extraction from markup, pruning and classification.
//!
//! The extractor turns the children of a markup element into a tree of
//! untyped text blocks. Inline runs are merged into one text leaf, block
//! elements become nested groups. The pruner then removes the structural
//! noise and the classifier tags every leaf as a date, a tag or a change.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::markup::Node;

/// Grouping wrapper whose children are spliced into the parent's sibling list.
pub const WRAPPER_ELEMENT: &str = "div";

/// Elements rendered as part of the surrounding text run.
pub const INLINE_ELEMENTS: &[&str] = &["em", "strong", "small", "a", "b", "i", "tt", "code"];

/// Dates and tags are always shorter than this many bytes.
pub const CHANGE_MIN_LEN: usize = 50;

/// Tags never contain these, change statements almost always do.
pub const CHANGE_PUNCTUATION: &[char] = &['.', '%'];

/// A leaf ending in this introduces a nested list of changes.
pub const CHANGE_SUFFIX: char = ':';

/// Chat command mentioned in ping system changes.
pub const PING_COMMAND: &str = "/ping";

/// Long-form date, e.g. "January 2, 2006".
pub const LONG_DATE_FORMAT: &str = "%B %d, %Y";

const MONTH_NAMES: &[&str] = &[
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    #[default]
    Unclassified,
    Date,
    Tag,
    Change,
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockType::Unclassified => "unclassified",
            BlockType::Date => "date",
            BlockType::Tag => "tag",
            BlockType::Change => "change",
        };
        f.write_str(name)
    }
}

/// A node of the block tree. Text lives on leaves only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Block {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(rename = "type")]
    pub kind: BlockType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Block>,
}

impl Block {
    pub fn leaf(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn group(children: Vec<Block>) -> Self {
        Self {
            children,
            ..Default::default()
        }
    }

    /// Leaf with a preset type, for building classified trees by hand.
    pub fn typed(kind: BlockType, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// One pruning pass over the children of `self`.
    ///
    /// A child wrapping exactly one block collapses into it. With `join_text`
    /// this only happens when the grandchild carries no text, so that sibling
    /// block elements never have their text glued together; the second pass
    /// unwraps the rest. Empty children are dropped. With `join_text` a text
    /// leaf separated from the previous text leaf only by dropped blocks (a
    /// `<br>`, say) is appended to it.
    pub fn prune(&mut self, join_text: bool) {
        let mut kept: Vec<Block> = Vec::with_capacity(self.children.len());
        let mut gap = false;

        for mut child in std::mem::take(&mut self.children) {
            child.prune(join_text);

            if child.children.len() == 1 && (!join_text || child.children[0].text.is_empty()) {
                if let Some(only) = child.children.pop() {
                    child = only;
                }
            }

            if child.text.is_empty() && child.children.is_empty() {
                gap = true;
                continue;
            }

            if join_text && gap && !child.text.is_empty() {
                if let Some(prev) = kept.last_mut().filter(|prev| !prev.text.is_empty()) {
                    prev.text.push_str(&child.text);
                    gap = false;
                    continue;
                }
            }

            gap = false;
            kept.push(child);
        }

        self.children = kept;
    }

    fn trim_text(&mut self) {
        let trimmed = self.text.trim();
        if trimmed.len() != self.text.len() {
            self.text = trimmed.to_string();
        }
        for child in &mut self.children {
            child.trim_text();
        }
    }
}

/// Extract blocks from a sibling list, unwrapping grouping wrappers first.
pub fn extract(nodes: &[Node]) -> Vec<Block> {
    extract_siblings(&unwrap_wrappers(nodes))
}

/// Splice the children of every wrapper element into its parent's sibling
/// list, recursively, without touching the input tree.
pub fn unwrap_wrappers(nodes: &[Node]) -> Vec<&Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Element(el) if el.name == WRAPPER_ELEMENT => {
                out.extend(unwrap_wrappers(&el.children));
            }
            _ => out.push(node),
        }
    }
    out
}

/// Extract blocks from an already unwrapped sibling list.
pub fn extract_siblings(nodes: &[&Node]) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut run = String::new();

    for node in nodes {
        match node {
            Node::Element(el) if !INLINE_ELEMENTS.contains(&el.name.as_str()) => {
                if !run.is_empty() {
                    blocks.push(Block::leaf(std::mem::take(&mut run)));
                }
                blocks.push(Block::group(extract(&el.children)));
            }
            inline => run.push_str(&inline.text()),
        }
    }
    if !run.is_empty() {
        blocks.push(Block::leaf(run));
    }

    blocks
}

/// Prune with text joining, trim every text, then prune again without joining.
pub fn normalize(root: &mut Block) {
    root.prune(true);
    root.trim_text();
    root.prune(false);
}

/// Classify a single block by looking at its own text and children only.
///
/// The order of the checks is load-bearing: it was tuned against archived
/// pages and must not be rearranged.
pub fn classify(block: &Block) -> BlockType {
    if !block.is_leaf() {
        return BlockType::Unclassified;
    }

    let text = block.text.as_str();
    if text.len() >= CHANGE_MIN_LEN {
        return BlockType::Change;
    }
    if text.contains(CHANGE_PUNCTUATION) {
        return BlockType::Change;
    }
    if text.ends_with(CHANGE_SUFFIX) {
        return BlockType::Change;
    }
    if text.contains(PING_COMMAND) {
        return BlockType::Change;
    }
    if parse_long_date(text).is_some() {
        return BlockType::Date;
    }

    BlockType::Tag
}

/// Set the type of every node in the tree.
pub fn classify_tree(root: &mut Block) {
    root.kind = classify(root);
    for child in &mut root.children {
        classify_tree(child);
    }
}

/// Parse "January 2, 2006". The month must be spelled out in full and the
/// year must have four digits.
pub fn parse_long_date(text: &str) -> Option<NaiveDate> {
    let (month, _) = text.split_once(' ')?;
    if !MONTH_NAMES.iter().any(|m| m.eq_ignore_ascii_case(month)) {
        return None;
    }
    let (_, year) = text.rsplit_once(", ")?;
    let year = year.trim_start();
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(text, LONG_DATE_FORMAT).ok()
}

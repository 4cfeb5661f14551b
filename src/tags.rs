//! Tag cleaning and the read-only tables that drive it.
//!
//! [`TagRules`] bundles the alias dictionary, the casing overrides and the
//! exclusion list. It is built once at startup (defaults merged with the
//! `tags` section of the config file) and passed by reference to every stage.

use std::collections::HashMap;

/// A cleaned tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    /// A real category label.
    Category(String),
    /// Not a category: text to prepend to the body of every change below it.
    TextPrefix(String),
}

impl Tag {
    pub fn category(&self) -> Option<&str> {
        match self {
            Tag::Category(name) => Some(name),
            Tag::TextPrefix(_) => None,
        }
    }
}

/// Trailing qualifiers that describe when a change applies, not what it is about.
pub const META_SUFFIXES: &[&str] = &[
    "[with weekly restarts]",
    "[with weekly maintenance]",
    "[with weekly realm maintenance]",
    "[with weekly maintenance in each region]",
];

/// Difficulty and mode qualifiers dropped from raid and dungeon names.
pub const MODE_SUFFIXES: &[&str] = &[" (Raidfinder)", " (Normal)", " (Heroic)", " (Mythic)"];

const ARTICLES: &[&str] = &["The ", "THE "];

const SPLIT_WORDS: &[&str] = &[" and ", " AND "];

/// Misspelled name stems and the letter they lost.
const TRUNCATED_STEMS: &[(&str, &str)] = &[("Tuskar", "r")];

/// Mis-encoded right single quote.
const MOJIBAKE_APOSTROPHE: &str = "\u{e2}\u{20ac}\u{2122}";

const DEFAULT_ALIASES: &[(&str, &[&str])] = &[
    ("Aberrus the Shadowed Crucible", &["Aberrus"]),
    ("Aberrus, the Shadowed Crucible", &["Aberrus"]),
    ("Alegeth'ar Academy", &["Algeth'ar Academy"]),
    ("Alegeth'ar Acadmey", &["Algeth'ar Academy"]),
    ("Amirdrassil the Dreams Hope", &["Amirdrassil"]),
    ("Amirdrassil, the Dreams Hope", &["Amirdrassil"]),
    ("Asaad, Caliph of Zephyrs", &["Asaad"]),
    ("Azure Vaults", &["Azure Vault"]),
    ("Brakenhide Hollow", &["Brackenhide Hollow"]),
    ("Chargath", &["Chargath, Bane of Scales"]),
    ("Class", &["Classes"]),
    ("Discipline, Shadow", &["Discipline", "Shadow"]),
    ("Dungeons", &["Dungeons and Raids"]),
    ("Dungeons and Raids", &["Dungeons and Raids"]),
    ("Enhancement, Elemental", &["Enhancement", "Elemental"]),
    ("Erkheart Stormvein", &["Erkhart Stormvein"]),
    ("Hackclaw's War-Band", &["Hackclaw's Warband"]),
    ("Kassara", &["Kazzara"]),
    ("Mining/Herbalism", &["Mining", "Herbalism"]),
    ("Ner'Zul", &["Ner'zhul"]),
    ("Player versus Player", &["PvP"]),
    ("Rashok", &["Rashok, the Elder"]),
    ("Sentinel Talondrus", &["Sentinel Talondras"]),
    ("Thaldrazsus", &["Thaldraszus"]),
    ("Uldaman, Legacy of Tyr", &["Uldaman: Legacy of Tyr"]),
    ("Wrath of the Lich King", &["WotLK"]),
];

const DEFAULT_CASING: &[(&str, &str)] = &[
    ("A SINGLE WING", "A Single Wing"),
    ("ACCESSIBILITY", "Accessibility"),
    ("AMIRDRASSIL THE DREAMS HOPE", "Amirdrassil"),
    ("AMIRDRASSIL, THE DREAMS HOPE", "Amirdrassil"),
    ("AMIRDRASSIL, THE DREAMS HOPE RAID REWARDS", "Amirdrassil"),
    ("BLACKSMITHING", "Blacksmithing"),
    ("CHALLENGE COURSE", "Challenge Course"),
    ("CHROMIE TIME", "Chromie Time"),
    ("COOKING", "Cooking"),
    ("CROSS-REALM TRADING", "Cross-Realm Trading"),
    ("DRAGONFLIGHT EPILOGUE QUESTS", "Quests"),
    ("EDIT MODE", "Edit Mode"),
    ("FREEHOLD", "Freehold"),
    ("GREAT VAULT", "Great Vault"),
    ("MACROS", "Macros"),
    ("MISFIT DRAGONS", "Misfit Dragons"),
    ("NEW CAMPAIGN CHAPTERS", "Campaign"),
    ("NEW RECIPES", "New Recipes"),
    ("NO LIMITS", "No Limits"),
    ("OPTIONS", "Options"),
    ("PING SYSTEM", "Ping System"),
    ("PLAYER VERSUS PLAYER", "PvP"),
    ("PUBLIC OBJECTIVES", "Public Objectives"),
    ("RATED SOLO SHUFFLE", "Solo Shuffle"),
    ("REAL TIME CHAT MODERATION", "Real Time Chat Moderation"),
    ("REFORGING TYR PART 3", "Reforging Tyr Part 3"),
    ("REFORGING TYR PART 4", "Reforging Tyr"),
    ("RESEARCHERS UNDER FIRE PUBLIC EVENT", "Researchers Under Fire"),
    ("REVIVAL CATALYST", "Revival Catalyst"),
    ("SNIFFENSEEKING", "Sniffenseeking"),
    ("TAILORING", "Tailoring"),
    ("TALENTS UI", "Talents UI"),
    ("TRACKING APPEARANCES", "Tracking Appearances"),
    ("ULDAMAN", "Uldaman"),
    ("UPGRADE SYSTEM", "Upgrade System"),
    ("USER INTERFACE", "User Interface"),
    ("VORTEX PINNACLE", "Vortex Pinnacle"),
];

/// Content for game flavors this changelog does not cover.
const DEFAULT_EXCLUSIONS: &[&str] = &[
    "WotLK",
    "Classic",
    "Plunderstorm",
    "Hardcore",
    "Season of Discovery",
    "Season of Mastery",
    "Remix",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRules {
    /// Upper-cased raw heading -> canonical tags. An empty list drops the heading.
    aliases: HashMap<String, Vec<String>>,
    /// Upper-cased tag -> canonical spelling. An empty spelling drops the tag.
    casing: Vec<(String, String)>,
    /// A category containing any of these excludes its whole subtree.
    exclusions: Vec<String>,
}

impl Default for TagRules {
    fn default() -> Self {
        let aliases = DEFAULT_ALIASES
            .iter()
            .map(|(raw, tags)| {
                (
                    raw.to_uppercase(),
                    tags.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect();
        let casing = DEFAULT_CASING
            .iter()
            .map(|(upper, canonical)| (upper.to_string(), canonical.to_string()))
            .collect();
        let exclusions = DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect();

        Self {
            aliases,
            casing,
            exclusions,
        }
    }
}

impl TagRules {
    /// Rules with no aliases, overrides or exclusions.
    pub fn empty() -> Self {
        Self {
            aliases: HashMap::new(),
            casing: Vec::new(),
            exclusions: Vec::new(),
        }
    }

    /// Add or replace alias entries. Keys are matched case-insensitively.
    pub fn with_aliases<I>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        for (raw, tags) in aliases {
            self.aliases.insert(raw.trim().to_uppercase(), tags);
        }
        self
    }

    /// Add casing overrides. Later entries win over built-in ones.
    pub fn with_casing<I>(mut self, casing: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (tag, canonical) in casing {
            let key = tag.to_uppercase();
            self.casing.retain(|(k, _)| *k != key);
            self.casing.push((key, canonical));
        }
        self
    }

    /// Add substrings to the exclusion list.
    pub fn with_exclusions<I>(mut self, exclusions: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        for ex in exclusions {
            if !ex.is_empty() && !self.exclusions.contains(&ex) {
                self.exclusions.push(ex);
            }
        }
        self
    }

    pub fn alias(&self, text: &str) -> Option<&[String]> {
        self.aliases.get(&text.to_uppercase()).map(Vec::as_slice)
    }

    pub fn casing_overrides(&self) -> impl Iterator<Item = (&str, &str)> {
        self.casing.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn exclusions(&self) -> &[String] {
        &self.exclusions
    }

    /// True when any category in `tags` contains an excluded substring.
    pub fn is_excluded(&self, tags: &[Tag]) -> bool {
        tags.iter()
            .filter_map(Tag::category)
            .any(|tag| self.exclusions.iter().any(|ex| tag.contains(ex.as_str())))
    }
}

/// Clean the raw text of a category heading into zero or more tags.
///
/// Meta qualifiers come back as [`Tag::TextPrefix`] values before the
/// categories, in the order they were stripped.
pub fn clean_tag(raw: &str, rules: &TagRules) -> Vec<Tag> {
    let mut text = raw.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let mut tags = Vec::new();
    for suffix in META_SUFFIXES {
        if let Some(rest) = strip_suffix_ignore_case(text, suffix) {
            tags.push(Tag::TextPrefix(text[rest.len()..].to_string()));
            text = rest.trim_end();
        }
    }

    let mut text = text.to_string();
    for (stem, missing) in TRUNCATED_STEMS {
        if text.ends_with(stem) {
            text.push_str(missing);
        }
    }

    for article in ARTICLES {
        if let Some(rest) = text.strip_prefix(article) {
            text = rest.to_string();
        }
    }

    for suffix in MODE_SUFFIXES {
        if let Some(rest) = text.strip_suffix(suffix) {
            text = rest.to_string();
        }
    }

    let text = text.replace(MOJIBAKE_APOSTROPHE, "'");

    if let Some(canonical) = rules.alias(&text) {
        tags.extend(canonical.iter().cloned().map(Tag::Category));
        return tags;
    }

    for word in SPLIT_WORDS {
        if let Some((first, second)) = text.split_once(word) {
            tags.push(Tag::Category(first.to_string()));
            tags.push(Tag::Category(second.to_string()));
            return tags;
        }
    }

    if !text.is_empty() {
        tags.push(Tag::Category(text));
    }
    tags
}

fn strip_suffix_ignore_case<'a>(text: &'a str, suffix: &str) -> Option<&'a str> {
    let cut = text.len().checked_sub(suffix.len())?;
    if !text.is_char_boundary(cut) {
        return None;
    }
    let (rest, tail) = text.split_at(cut);
    tail.eq_ignore_ascii_case(suffix).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories(raw: &str) -> Vec<Tag> {
        clean_tag(raw, &TagRules::default())
    }

    fn cat(name: &str) -> Tag {
        Tag::Category(name.to_string())
    }

    #[test]
    fn article_mode_and_alias_are_applied_in_order() {
        assert_eq!(categories("The Azure Vaults (Heroic)"), vec![cat("Azure Vault")]);
    }

    #[test]
    fn alias_split_beats_the_and_split() {
        assert_eq!(
            categories("Discipline, Shadow"),
            vec![cat("Discipline"), cat("Shadow")]
        );
        assert_eq!(categories("Dungeons and Raids"), vec![cat("Dungeons and Raids")]);
        assert_eq!(categories("dungeons"), vec![cat("Dungeons and Raids")]);
    }

    #[test]
    fn and_splits_once() {
        assert_eq!(
            categories("Items and Rewards and More"),
            vec![cat("Items"), cat("Rewards and More")]
        );
        assert_eq!(
            categories("QUESTS AND ACHIEVEMENTS"),
            vec![cat("QUESTS"), cat("ACHIEVEMENTS")]
        );
    }

    #[test]
    fn empty_and_whitespace_yield_nothing() {
        assert!(categories("").is_empty());
        assert!(categories("  \n ").is_empty());
    }

    #[test]
    fn meta_qualifiers_become_text_prefixes() {
        assert_eq!(
            categories("Mage [With Weekly Restarts]"),
            vec![Tag::TextPrefix("[With Weekly Restarts]".to_string()), cat("Mage")]
        );
        assert_eq!(
            categories("Vault [with weekly maintenance] [with weekly restarts]"),
            vec![
                Tag::TextPrefix("[with weekly restarts]".to_string()),
                Tag::TextPrefix("[with weekly maintenance]".to_string()),
                cat("Vault"),
            ]
        );
        assert_eq!(
            categories("[with weekly restarts]"),
            vec![Tag::TextPrefix("[with weekly restarts]".to_string())]
        );
    }

    #[test]
    fn typo_repair_and_mojibake() {
        assert_eq!(categories("Gutshot Tuskar"), vec![cat("Gutshot Tuskarr")]);
        assert_eq!(
            categories("Hackclaw\u{e2}\u{20ac}\u{2122}s War-Band"),
            vec![cat("Hackclaw's Warband")]
        );
    }

    #[test]
    fn configured_aliases_and_exclusions() {
        let rules = TagRules::empty()
            .with_aliases([("Patch Notes".to_string(), Vec::new())])
            .with_exclusions(vec!["Classic".to_string()]);
        assert!(clean_tag("patch notes", &rules).is_empty());
        assert!(rules.is_excluded(&[cat("Hardcore Classic")]));
        assert!(!rules.is_excluded(&[cat("classic")]));
        assert!(!rules.is_excluded(&[Tag::TextPrefix("Classic".to_string())]));
    }

    #[test]
    fn casing_overrides_replace_builtins() {
        let rules = TagRules::default().with_casing([("ulDaman".to_string(), "ULDAMAN!".to_string())]);
        let found: Vec<_> = rules
            .casing_overrides()
            .filter(|(k, _)| *k == "ULDAMAN")
            .collect();
        assert_eq!(found, vec![("ULDAMAN", "ULDAMAN!")]);
    }
}

//! Tolerant HTML reader.
//!
//! Turns a page into an owned, immutable tree of [`Node`]s. This is not a
//! conforming HTML5 parser: it understands exactly as much structure as the
//! changelog pages use (nested block/inline elements, attributes, entities)
//! and recovers from sloppy markup by closing elements the way browsers
//! usually do for `p` and `li`.

/// Elements that never have children.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose content is raw text we never want.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Elements that implicitly close an open `<p>`.
const CLOSES_PARAGRAPH: &[&str] = &[
    "address", "article", "aside", "blockquote", "div", "dl", "fieldset", "figure", "footer",
    "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "nav", "ol", "p", "pre",
    "section", "table", "ul",
];

/// Phrasing elements that may sit between a `<p>` and the element closing it.
const PHRASING: &[&str] = &[
    "a", "abbr", "b", "cite", "code", "em", "i", "mark", "q", "s", "small", "span", "strong",
    "sub", "sup", "tt", "u",
];

/// Name of the synthetic root returned by [`parse`].
pub const DOCUMENT: &str = "#document";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Element(Element),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    /// Concatenated text of this node and all of its descendants.
    pub fn text(&self) -> String {
        let mut buf = String::new();
        self.collect_text(&mut buf);
        buf
    }

    fn collect_text(&self, buf: &mut String) {
        match self {
            Node::Text(t) => buf.push_str(t),
            Node::Element(el) => {
                for child in &el.children {
                    child.collect_text(buf);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|v| v.split_ascii_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn text(&self) -> String {
        let mut buf = String::new();
        for child in &self.children {
            child.collect_text(&mut buf);
        }
        buf
    }

    /// Direct element children, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Every descendant matching `pred`, in document order.
    pub fn find_all(&self, pred: &dyn Fn(&Element) -> bool) -> Vec<&Element> {
        let mut out = Vec::new();
        self.collect_matching(pred, &mut out);
        out
    }

    fn collect_matching<'a>(&'a self, pred: &dyn Fn(&Element) -> bool, out: &mut Vec<&'a Element>) {
        for child in self.elements() {
            if pred(child) {
                out.push(child);
            }
            child.collect_matching(pred, out);
        }
    }

    /// Resolve a descendant chain of class selectors such as `".Blog .detail"`.
    pub fn find_by_class_chain(&self, chain: &str) -> Option<&Element> {
        let classes: Vec<&str> = chain
            .split_ascii_whitespace()
            .map(|c| c.trim_start_matches('.'))
            .filter(|c| !c.is_empty())
            .collect();
        if classes.is_empty() {
            return None;
        }
        self.find_class_path(&classes)
    }

    fn find_class_path(&self, classes: &[&str]) -> Option<&Element> {
        let (first, rest) = classes.split_first()?;
        for candidate in self.find_all(&|el: &Element| el.has_class(first)) {
            if rest.is_empty() {
                return Some(candidate);
            }
            if let Some(found) = candidate.find_class_path(rest) {
                return Some(found);
            }
        }
        None
    }
}

/// Parse a document or fragment. The returned element is a synthetic root
/// named [`DOCUMENT`] holding the top-level nodes.
pub fn parse(html: &str) -> Element {
    let mut stack: Vec<Element> = vec![Element::new(DOCUMENT)];
    let mut reader = Reader::new(html);

    while let Some(token) = reader.next_token() {
        match token {
            Token::Text(raw) => {
                let text = decode_entities(raw);
                if !text.is_empty() {
                    if let Some(top) = stack.last_mut() {
                        top.children.push(Node::Text(text));
                    }
                }
            }
            Token::Start {
                name,
                attrs,
                self_closing,
            } => {
                if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                    if !self_closing {
                        reader.skip_raw_text(&name);
                    }
                    continue;
                }
                implicit_close(&mut stack, &name);
                let el = Element {
                    name,
                    attrs,
                    children: Vec::new(),
                };
                if self_closing || VOID_ELEMENTS.contains(&el.name.as_str()) {
                    if let Some(top) = stack.last_mut() {
                        top.children.push(Node::Element(el));
                    }
                } else {
                    stack.push(el);
                }
            }
            Token::End(name) => {
                if let Some(idx) = stack.iter().rposition(|el| el.name == name) {
                    if idx > 0 {
                        close_to(&mut stack, idx);
                    }
                }
            }
        }
    }

    close_to(&mut stack, 1);
    stack.pop().unwrap_or_else(|| Element::new(DOCUMENT))
}

/// Pop elements until `stack.len() == depth`, attaching each to its parent.
fn close_to(stack: &mut Vec<Element>, depth: usize) {
    while stack.len() > depth.max(1) {
        if let Some(el) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                parent.children.push(Node::Element(el));
            }
        }
    }
}

fn implicit_close(stack: &mut Vec<Element>, opening: &str) {
    if opening == "li" {
        // A new item closes the previous one unless a nested list sits in between.
        let open_item = stack
            .iter()
            .rposition(|el| matches!(el.name.as_str(), "li" | "ul" | "ol"));
        if let Some(idx) = open_item {
            if stack[idx].name == "li" && idx > 0 {
                close_to(stack, idx);
            }
        }
    }

    if CLOSES_PARAGRAPH.contains(&opening) {
        let mut idx = stack.len();
        while idx > 1 {
            idx -= 1;
            let name = stack[idx].name.as_str();
            if name == "p" {
                close_to(stack, idx);
                break;
            }
            if !PHRASING.contains(&name) {
                break;
            }
        }
    }
}

#[derive(Debug)]
enum Token<'a> {
    Text(&'a str),
    Start {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    End(String),
}

struct Reader<'a> {
    s: &'a str,
    b: &'a [u8],
    i: usize,
}

impl<'a> Reader<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            s,
            b: s.as_bytes(),
            i: 0,
        }
    }

    fn next_token(&mut self) -> Option<Token<'a>> {
        loop {
            if self.i >= self.b.len() {
                return None;
            }
            let src = self.s;
            if self.b[self.i] != b'<' {
                let start = self.i;
                self.i = self.find_byte(b'<', start + 1).unwrap_or(self.b.len());
                return Some(Token::Text(&src[start..self.i]));
            }

            let rest = &self.b[self.i..];
            if rest.starts_with(b"<!--") {
                self.i = match self.s[self.i + 4..].find("-->") {
                    Some(rel) => self.i + 4 + rel + 3,
                    None => self.b.len(),
                };
                continue;
            }
            match rest.get(1) {
                Some(b'!') | Some(b'?') => {
                    self.i = self.find_byte(b'>', self.i).map_or(self.b.len(), |e| e + 1);
                    continue;
                }
                Some(b'/') => {
                    let name_start = self.i + 2;
                    let name_end = self.scan_name(name_start);
                    let end = self.find_byte(b'>', name_end).map_or(self.b.len(), |e| e + 1);
                    let name = self.s[name_start..name_end].to_ascii_lowercase();
                    self.i = end;
                    if name.is_empty() {
                        continue;
                    }
                    return Some(Token::End(name));
                }
                Some(c) if c.is_ascii_alphabetic() => return Some(self.start_tag()),
                _ => {
                    // A stray '<' is plain text.
                    let start = self.i;
                    self.i = self.find_byte(b'<', start + 1).unwrap_or(self.b.len());
                    return Some(Token::Text(&src[start..self.i]));
                }
            }
        }
    }

    fn start_tag(&mut self) -> Token<'a> {
        let name_start = self.i + 1;
        let name_end = self.scan_name(name_start);
        let name = self.s[name_start..name_end].to_ascii_lowercase();
        self.i = name_end;

        let mut attrs = Vec::new();
        let mut self_closing = false;
        loop {
            self.skip_ws();
            match self.b.get(self.i) {
                None => break,
                Some(b'>') => {
                    self.i += 1;
                    break;
                }
                Some(b'/') => {
                    self.i += 1;
                    if self.b.get(self.i) == Some(&b'>') {
                        self.i += 1;
                        self_closing = true;
                        break;
                    }
                }
                Some(_) => {
                    let key_start = self.i;
                    while let Some(&c) = self.b.get(self.i) {
                        if c.is_ascii_whitespace() || matches!(c, b'=' | b'>' | b'/') {
                            break;
                        }
                        self.i += 1;
                    }
                    let key = self.s[key_start..self.i].to_ascii_lowercase();
                    self.skip_ws();
                    let value = if self.b.get(self.i) == Some(&b'=') {
                        self.i += 1;
                        self.skip_ws();
                        self.attr_value()
                    } else {
                        String::new()
                    };
                    if !key.is_empty() {
                        attrs.push((key, value));
                    } else {
                        self.i += 1;
                    }
                }
            }
        }

        Token::Start {
            name,
            attrs,
            self_closing,
        }
    }

    fn attr_value(&mut self) -> String {
        match self.b.get(self.i) {
            Some(&q) if q == b'"' || q == b'\'' => {
                let start = self.i + 1;
                let end = self.find_byte(q, start).unwrap_or(self.b.len());
                self.i = (end + 1).min(self.b.len());
                decode_entities(&self.s[start..end])
            }
            _ => {
                let start = self.i;
                while let Some(&c) = self.b.get(self.i) {
                    if c.is_ascii_whitespace() || c == b'>' {
                        break;
                    }
                    self.i += 1;
                }
                decode_entities(&self.s[start..self.i])
            }
        }
    }

    /// Skip everything up to and including `</name>`.
    fn skip_raw_text(&mut self, name: &str) {
        let closing = format!("</{name}");
        let lower = self.s[self.i..].to_ascii_lowercase();
        match lower.find(&closing) {
            Some(rel) => {
                let after = self.i + rel + closing.len();
                self.i = self.find_byte(b'>', after).map_or(self.b.len(), |e| e + 1);
            }
            None => self.i = self.b.len(),
        }
    }

    fn scan_name(&self, from: usize) -> usize {
        let mut i = from;
        while let Some(&c) = self.b.get(i) {
            if c.is_ascii_alphanumeric() || matches!(c, b'-' | b'_' | b':') {
                i += 1;
            } else {
                break;
            }
        }
        i
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.b.get(self.i) {
            if !c.is_ascii_whitespace() {
                break;
            }
            self.i += 1;
        }
    }

    fn find_byte(&self, needle: u8, from: usize) -> Option<usize> {
        self.b
            .get(from..)?
            .iter()
            .position(|&c| c == needle)
            .map(|p| p + from)
    }
}

const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("amp", "&"),
    ("lt", "<"),
    ("gt", ">"),
    ("quot", "\""),
    ("apos", "'"),
    ("nbsp", "\u{a0}"),
    ("rsquo", "\u{2019}"),
    ("lsquo", "\u{2018}"),
    ("rdquo", "\u{201d}"),
    ("ldquo", "\u{201c}"),
    ("ndash", "\u{2013}"),
    ("mdash", "\u{2014}"),
    ("hellip", "\u{2026}"),
    ("bull", "\u{2022}"),
    ("middot", "\u{b7}"),
    ("times", "\u{d7}"),
    ("copy", "\u{a9}"),
    ("reg", "\u{ae}"),
    ("trade", "\u{2122}"),
    ("eacute", "\u{e9}"),
];

/// Decode character references. Unknown or malformed references are kept verbatim.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let decoded = tail
            .find(';')
            .filter(|&semi| semi > 0 && semi <= 10)
            .and_then(|semi| decode_reference(&tail[..semi]).map(|ch| (ch, semi)));
        match decoded {
            Some((replacement, semi)) => {
                out.push_str(&replacement);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    NAMED_ENTITIES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v.to_string())
}

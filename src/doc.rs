//! Linear document model
//!
//! A [`Document`] is a flat, ordered list of [`Item`]s: text runs and tag
//! markers. Nesting is implied by the order of open and close markers rather
//! than by a tree, which keeps the model cheap to slice into sentences and to
//! rebuild after translation.
//!
//! # Example
//!
//! ```ignore
//! use lineardoc::parse;
//!
//! let doc = parse("<p>Hello <b>world</b></p>")?;
//! assert_eq!(doc.to_markup()?, "<p>Hello <b>world</b></p>");
//! ```

use crate::error::{DocError, DocResult};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TAG_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier shared by an open marker and its close marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TagId(u64);

impl TagId {
    /// Allocate a fresh id. Ids increase monotonically for the lifetime of the process.
    pub fn next() -> Self {
        TagId(NEXT_TAG_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How an element takes part in segmentation and translation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Delimits blocks; never crossed by a segment
    Block,
    /// Annotates text inside a block; relocated by reconstruction
    Inline,
    /// Empty inline element such as `<br/>` or `<img/>`
    Void,
    /// Atomic element kept verbatim; never tokenized or translated
    Opaque,
}

/// An element with its attributes in source order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub class: Classification,
    /// Whether text directly inside this element may be cut into sentences
    pub segmentable: bool,
    /// Written as `<name/>` in the source
    pub self_closing: bool,
}

impl Tag {
    pub fn new(name: impl Into<String>, class: Classification) -> Self {
        Tag {
            id: TagId::next(),
            name: name.into(),
            attributes: Vec::new(),
            class,
            segmentable: true,
            self_closing: false,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Same element with a freshly allocated id, used when a tag is reopened in a new place.
    pub fn reissue(&self) -> Self {
        Tag {
            id: TagId::next(),
            ..self.clone()
        }
    }

    pub fn is_block(&self) -> bool {
        self.class == Classification::Block
    }

    fn open_markup(&self, out: &mut String, self_close: bool) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape_attribute(value));
            out.push('"');
        }
        if self_close {
            out.push('/');
        }
        out.push('>');
    }

    fn close_markup(&self, out: &mut String) {
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// One entry of the linear document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Text(String),
    Open(Tag),
    Close(TagId),
    Void(Tag),
    Opaque { tag: Tag, content: String },
}

impl Item {
    pub fn text(text: impl Into<String>) -> Self {
        Item::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Item::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The tag carried by this item, if any. Close markers carry only an id.
    pub fn tag(&self) -> Option<&Tag> {
        match self {
            Item::Open(tag) | Item::Void(tag) => Some(tag),
            Item::Opaque { tag, .. } => Some(tag),
            Item::Text(_) | Item::Close(_) => None,
        }
    }

    /// Void and opaque items: moved only as a whole
    pub fn is_atom(&self) -> bool {
        matches!(self, Item::Void(_) | Item::Opaque { .. })
    }
}

/// A maximal stretch of items between two block-level markers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRun {
    pub range: Range<usize>,
    /// Taken from the innermost enclosing block element
    pub segmentable: bool,
}

/// An ordered sequence of items whose open and close markers nest properly
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    items: Vec<Item>,
}

impl Document {
    pub fn new() -> Self {
        Document { items: Vec::new() }
    }

    pub fn from_items(items: Vec<Item>) -> Self {
        Document { items }
    }

    pub fn append(&mut self, item: Item) {
        self.items.push(item);
    }

    /// Append text, merging it into a preceding text item.
    pub fn append_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.items.last_mut() {
            Some(Item::Text(previous)) => previous.push_str(text),
            _ => self.items.push(Item::Text(text.to_string())),
        }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Concatenated text of all text items, ignoring markup
    pub fn plain_text(&self) -> String {
        self.items.iter().filter_map(Item::as_text).collect()
    }

    /// Split the document into the non-empty runs of items separated by
    /// block-level open and close markers.
    pub fn block_runs(&self) -> Vec<BlockRun> {
        let mut runs = Vec::new();
        // Open tags with `Some(segmentable)` for blocks and `None` for inline tags.
        let mut open: Vec<(TagId, Option<bool>)> = Vec::new();
        let mut start = 0;

        for (index, item) in self.items.iter().enumerate() {
            let closing = match item {
                Item::Close(id) => open.iter().rposition(|(open_id, _)| open_id == id),
                _ => None,
            };
            let is_block_marker = match item {
                Item::Open(tag) => tag.is_block(),
                Item::Close(_) => closing.is_some_and(|position| open[position].1.is_some()),
                _ => false,
            };
            if is_block_marker {
                if start < index {
                    let segmentable = open.iter().rev().find_map(|(_, entry)| *entry).unwrap_or(false);
                    runs.push(BlockRun {
                        range: start..index,
                        segmentable,
                    });
                }
                start = index + 1;
            }
            match item {
                Item::Open(tag) => open.push((tag.id, tag.is_block().then_some(tag.segmentable))),
                Item::Close(_) => {
                    if let Some(position) = closing {
                        open.truncate(position);
                    }
                }
                _ => {}
            }
        }
        if start < self.items.len() {
            runs.push(BlockRun {
                range: start..self.items.len(),
                segmentable: false,
            });
        }
        runs
    }

    /// Serialize back to markup.
    ///
    /// Attribute order, the `<x/>` form of empty elements and opaque content
    /// are reproduced as parsed. Text is escaped for `&`, `<` and `>`;
    /// attribute values additionally for `"`.
    ///
    /// # Errors
    ///
    /// [`DocError::Structure`] when a close marker does not match the
    /// innermost open tag, or tags are left open at the end.
    pub fn to_markup(&self) -> DocResult<String> {
        let mut out = String::new();
        let mut stack: Vec<&Tag> = Vec::new();

        for (index, item) in self.items.iter().enumerate() {
            match item {
                Item::Text(text) => out.push_str(&escape_text(text)),
                Item::Open(tag) => {
                    // An empty self-closing element is written back in the same form.
                    let empty_pair = tag.self_closing
                        && matches!(self.items.get(index + 1), Some(Item::Close(id)) if *id == tag.id);
                    if !empty_pair {
                        tag.open_markup(&mut out, false);
                    }
                    stack.push(tag);
                }
                Item::Close(id) => {
                    let tag = stack.pop().ok_or_else(|| {
                        DocError::Structure(format!("close marker {} at item {} has no open tag", id, index))
                    })?;
                    if tag.id != *id {
                        return Err(DocError::Structure(format!(
                            "close marker {} at item {} does not match open <{}> ({})",
                            id, index, tag.name, tag.id
                        )));
                    }
                    let empty_pair = tag.self_closing
                        && matches!(index.checked_sub(1).and_then(|i| self.items.get(i)), Some(Item::Open(open)) if open.id == *id);
                    if empty_pair {
                        tag.open_markup(&mut out, true);
                    } else {
                        tag.close_markup(&mut out);
                    }
                }
                Item::Void(tag) => {
                    if tag.self_closing {
                        tag.open_markup(&mut out, true);
                    } else {
                        tag.open_markup(&mut out, false);
                        tag.close_markup(&mut out);
                    }
                }
                Item::Opaque { tag, content } => {
                    if tag.self_closing && content.is_empty() {
                        tag.open_markup(&mut out, true);
                    } else {
                        tag.open_markup(&mut out, false);
                        out.push_str(content);
                        tag.close_markup(&mut out);
                    }
                }
            }
        }

        if let Some(tag) = stack.last() {
            return Err(DocError::Structure(format!(
                "{} tag(s) left open, innermost <{}> ({})",
                stack.len(),
                tag.name,
                tag.id
            )));
        }
        Ok(out)
    }

    /// Lossless debug dump: one JSON object per item.
    ///
    /// Tag ids are renumbered from 1 in order of first appearance, so two
    /// parses of the same fragment dump identically.
    pub fn dump_canonical(&self) -> String {
        let mut ids: HashMap<TagId, u64> = HashMap::new();
        let mut renumber = |id: TagId| {
            let next = ids.len() as u64 + 1;
            *ids.entry(id).or_insert(next)
        };

        let mut lines = Vec::with_capacity(self.items.len());
        for item in &self.items {
            let entry = match item {
                Item::Text(text) => CanonicalItem::Text { text },
                Item::Open(tag) => CanonicalItem::Open(CanonicalTag::new(tag, renumber(tag.id))),
                Item::Close(id) => CanonicalItem::Close { id: renumber(*id) },
                Item::Void(tag) => CanonicalItem::Void(CanonicalTag::new(tag, renumber(tag.id))),
                Item::Opaque { tag, content } => CanonicalItem::Opaque {
                    tag: CanonicalTag::new(tag, renumber(tag.id)),
                    content,
                },
            };
            // Serializing plain strings and integers cannot fail.
            lines.push(serde_json::to_string(&entry).unwrap_or_default());
        }
        lines.join("\n")
    }
}

#[derive(Serialize)]
#[serde(tag = "item", rename_all = "lowercase")]
enum CanonicalItem<'a> {
    Text { text: &'a str },
    Open(CanonicalTag<'a>),
    Close { id: u64 },
    Void(CanonicalTag<'a>),
    Opaque {
        tag: CanonicalTag<'a>,
        content: &'a str,
    },
}

#[derive(Serialize)]
struct CanonicalTag<'a> {
    id: u64,
    name: &'a str,
    attributes: &'a [(String, String)],
    class: Classification,
    segmentable: bool,
    #[serde(skip_serializing_if = "is_false")]
    self_closing: bool,
}

impl<'a> CanonicalTag<'a> {
    fn new(tag: &'a Tag, id: u64) -> Self {
        CanonicalTag {
            id,
            name: &tag.name,
            attributes: &tag.attributes,
            class: tag.class,
            segmentable: tag.segmentable,
            self_closing: tag.self_closing,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !value
}

/// Escape text content: `&`, `<` and `>`
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape an attribute value: `&`, `<`, `>` and `"`
pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(children: Vec<Item>) -> Document {
        let p = Tag::new("p", Classification::Block);
        let id = p.id;
        let mut doc = Document::new();
        doc.append(Item::Open(p));
        for child in children {
            doc.append(child);
        }
        doc.append(Item::Close(id));
        doc
    }

    #[test]
    fn test_tag_ids_are_monotonic() {
        let a = TagId::next();
        let b = TagId::next();
        assert!(b > a);
    }

    #[test]
    fn test_to_markup_preserves_attribute_order() {
        let a = Tag::new("a", Classification::Inline)
            .with_attribute("title", "T")
            .with_attribute("href", "./X");
        let id = a.id;
        let doc = paragraph(vec![Item::Open(a), Item::text("x"), Item::Close(id)]);
        assert_eq!(
            doc.to_markup().unwrap(),
            "<p><a title=\"T\" href=\"./X\">x</a></p>"
        );
    }

    #[test]
    fn test_to_markup_escapes_text_and_attributes() {
        let span = Tag::new("span", Classification::Inline).with_attribute("data-x", "a\"b<c");
        let id = span.id;
        let doc = paragraph(vec![
            Item::Open(span),
            Item::text("1 < 2 & 3 > \"0\""),
            Item::Close(id),
        ]);
        assert_eq!(
            doc.to_markup().unwrap(),
            "<p><span data-x=\"a&quot;b&lt;c\">1 &lt; 2 &amp; 3 &gt; \"0\"</span></p>"
        );
    }

    #[test]
    fn test_to_markup_void_forms() {
        let mut br = Tag::new("br", Classification::Void);
        br.self_closing = true;
        let img = Tag::new("img", Classification::Void).with_attribute("src", "x.png");
        let doc = paragraph(vec![Item::Void(br), Item::Void(img)]);
        assert_eq!(
            doc.to_markup().unwrap(),
            "<p><br/><img src=\"x.png\"></img></p>"
        );
    }

    #[test]
    fn test_to_markup_empty_self_closing_pair() {
        let mut span = Tag::new("span", Classification::Inline);
        span.self_closing = true;
        let id = span.id;
        let doc = paragraph(vec![Item::Open(span), Item::Close(id)]);
        assert_eq!(doc.to_markup().unwrap(), "<p><span/></p>");
    }

    #[test]
    fn test_to_markup_opaque_is_verbatim() {
        let sup = Tag::new("sup", Classification::Opaque).with_attribute("typeof", "mw:Extension/ref");
        let doc = paragraph(vec![
            Item::text("gas."),
            Item::Opaque {
                tag: sup,
                content: "<a href=\"#cite_note-1\">[1]</a>".to_string(),
            },
        ]);
        assert_eq!(
            doc.to_markup().unwrap(),
            "<p>gas.<sup typeof=\"mw:Extension/ref\"><a href=\"#cite_note-1\">[1]</a></sup></p>"
        );
    }

    #[test]
    fn test_to_markup_rejects_mismatched_close() {
        let b = Tag::new("b", Classification::Inline);
        let i = Tag::new("i", Classification::Inline);
        let b_id = b.id;
        let i_id = i.id;
        let doc = paragraph(vec![
            Item::Open(b),
            Item::Open(i),
            Item::Close(b_id),
            Item::Close(i_id),
        ]);
        assert!(matches!(doc.to_markup(), Err(DocError::Structure(_))));
    }

    #[test]
    fn test_to_markup_rejects_unclosed() {
        let mut doc = Document::new();
        doc.append(Item::Open(Tag::new("p", Classification::Block)));
        doc.append(Item::text("x"));
        assert!(matches!(doc.to_markup(), Err(DocError::Structure(_))));
    }

    #[test]
    fn test_to_markup_rejects_stray_close() {
        let doc = Document::from_items(vec![Item::Close(TagId::next())]);
        assert!(matches!(doc.to_markup(), Err(DocError::Structure(_))));
    }

    #[test]
    fn test_dump_canonical_renumbers_ids() {
        let first = paragraph(vec![Item::text("x")]);
        let second = paragraph(vec![Item::text("x")]);
        assert_eq!(first.dump_canonical(), second.dump_canonical());

        let dump = first.dump_canonical();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("\"item\":\"open\""));
        assert!(lines[0].contains("\"id\":1"));
        assert!(lines[0].contains("\"class\":\"block\""));
        assert_eq!(lines[1], "{\"item\":\"text\",\"text\":\"x\"}");
        assert_eq!(lines[2], "{\"item\":\"close\",\"id\":1}");
    }

    #[test]
    fn test_plain_text_ignores_markup() {
        let b = Tag::new("b", Classification::Inline);
        let id = b.id;
        let doc = paragraph(vec![
            Item::text("The "),
            Item::Open(b),
            Item::text("big"),
            Item::Close(id),
            Item::text(" dog"),
        ]);
        assert_eq!(doc.plain_text(), "The big dog");
    }

    #[test]
    fn test_block_runs_split_at_block_markers() {
        let mut div_only = Tag::new("div", Classification::Block);
        div_only.segmentable = false;
        let p = Tag::new("p", Classification::Block);
        let b = Tag::new("b", Classification::Inline);
        let (div_id, p_id, b_id) = (div_only.id, p.id, b.id);
        let doc = Document::from_items(vec![
            Item::Open(div_only),
            Item::text("intro"),
            Item::Open(p),
            Item::text("a "),
            Item::Open(b),
            Item::text("b"),
            Item::Close(b_id),
            Item::Close(p_id),
            Item::Close(div_id),
        ]);
        let runs = doc.block_runs();
        assert_eq!(
            runs,
            vec![
                BlockRun { range: 1..2, segmentable: false },
                BlockRun { range: 3..7, segmentable: true },
            ]
        );
    }

    #[test]
    fn test_reissue_keeps_name_and_attributes() {
        let a = Tag::new("a", Classification::Inline).with_attribute("href", "x");
        let again = a.reissue();
        assert_ne!(a.id, again.id);
        assert_eq!(again.name, "a");
        assert_eq!(again.attribute("href"), Some("x"));
    }
}

//! Element classification strategies
//!
//! The parser asks a [`Contextualizer`] how to treat every element it opens:
//! as a block boundary, an inline annotation, an empty inline element, or an
//! opaque unit that must survive translation untouched. The contextualizer
//! also decides where sentence segmentation is allowed.
//!
//! Two strategies are provided:
//!
//! - [`DefaultContextualizer`] knows plain HTML.
//! - [`MwContextualizer`] additionally understands the RDFa annotations of
//!   wiki-rendered HTML (references, math, transclusions).

use crate::doc::{Classification, Tag};

/// Attribute list in source order
pub type Attributes = [(String, String)];

/// Pluggable element classifier used by the parser.
///
/// `ancestors` holds the currently open elements, outermost first, already
/// classified.
pub trait Contextualizer: Send + Sync {
    fn classify(&self, name: &str, attributes: &Attributes, ancestors: &[Tag]) -> Classification;

    /// Whether text directly inside this element may be cut into sentences
    fn segmentable(&self, _name: &str, _attributes: &Attributes, _ancestors: &[Tag]) -> bool {
        true
    }
}

const BLOCK_TAGS: &[&str] = &[
    "html", "head", "body", "title", "noscript", "base",
    "audio", "data", "datagrid", "datalist", "dialog", "eventsource", "form",
    "iframe", "main", "menu", "menuitem", "optgroup", "option",
    "div", "p",
    "table", "tbody", "thead", "tfoot", "caption", "th", "tr", "td",
    "ul", "ol", "li", "dl", "dt", "dd",
    "h1", "h2", "h3", "h4", "h5", "h6", "hgroup",
    "article", "aside", "nav", "section", "footer", "header", "figure",
    "figcaption", "fieldset", "details", "blockquote",
    "hr", "button", "canvas", "center", "col", "colgroup", "embed",
    "map", "object", "pre", "progress", "video",
];

const VOID_TAGS: &[&str] = &["br", "img", "source", "track", "link", "meta", "wbr"];

const OPAQUE_TAGS: &[&str] = &["script", "style", "svg", "math"];

const CONTENT_BRANCH_TAGS: &[&str] = &["blockquote", "h1", "h2", "h3", "h4", "h5", "h6", "p", "pre"];

fn attribute<'a>(attributes: &'a Attributes, name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn has_token(value: Option<&str>, token: &str) -> bool {
    value.is_some_and(|value| value.split_whitespace().any(|t| t == token))
}

fn has_token_prefix(value: Option<&str>, prefix: &str) -> bool {
    value.is_some_and(|value| value.split_whitespace().any(|t| t.starts_with(prefix)))
}

/// Classification by tag name alone
fn classify_by_name(name: &str) -> Classification {
    if VOID_TAGS.contains(&name) {
        Classification::Void
    } else if OPAQUE_TAGS.contains(&name) {
        Classification::Opaque
    } else if BLOCK_TAGS.contains(&name) {
        Classification::Block
    } else {
        Classification::Inline
    }
}

/// Plain HTML rules
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultContextualizer;

impl Contextualizer for DefaultContextualizer {
    fn classify(&self, name: &str, _attributes: &Attributes, _ancestors: &[Tag]) -> Classification {
        classify_by_name(name)
    }

    fn segmentable(&self, name: &str, _attributes: &Attributes, ancestors: &[Tag]) -> bool {
        match name {
            "figure" => false,
            "figcaption" => true,
            _ => ancestors.last().is_none_or(|parent| parent.segmentable),
        }
    }
}

/// Rules for HTML rendered from wikitext.
///
/// References, math, reference lists and template output are opaque whatever
/// their tag. Sentences are only cut inside content branches (paragraphs,
/// headings, quotes, preformatted text and figure captions).
#[derive(Debug, Clone, Copy, Default)]
pub struct MwContextualizer;

impl MwContextualizer {
    pub fn is_reference(name: &str, attributes: &Attributes) -> bool {
        let type_of = attribute(attributes, "typeof");
        ((name == "span" || name == "sup") && has_token(type_of, "mw:Extension/ref"))
            || (name == "sup" && has_token(attribute(attributes, "class"), "reference"))
    }

    pub fn is_math(attributes: &Attributes) -> bool {
        has_token(attribute(attributes, "typeof"), "mw:Extension/math")
    }

    pub fn is_reference_list(attributes: &Attributes) -> bool {
        has_token(attribute(attributes, "typeof"), "mw:Extension/references")
    }

    /// Template output or a placeholder for content that cannot be edited
    pub fn is_transclusion(attributes: &Attributes) -> bool {
        ["typeof", "rel"].iter().any(|key| {
            let value = attribute(attributes, key);
            has_token_prefix(value, "mw:Transclusion") || has_token_prefix(value, "mw:Placeholder")
        })
    }
}

impl Contextualizer for MwContextualizer {
    fn classify(&self, name: &str, attributes: &Attributes, _ancestors: &[Tag]) -> Classification {
        if Self::is_reference(name, attributes)
            || Self::is_math(attributes)
            || Self::is_reference_list(attributes)
            || Self::is_transclusion(attributes)
        {
            return Classification::Opaque;
        }
        classify_by_name(name)
    }

    fn segmentable(&self, name: &str, _attributes: &Attributes, ancestors: &[Tag]) -> bool {
        let inside_content_branch = ancestors.last().is_some_and(|parent| parent.segmentable);
        if inside_content_branch {
            return true;
        }
        let in_figure = ancestors.iter().any(|tag| tag.name == "figure");
        if in_figure {
            name == "figcaption" && ancestors.last().is_some_and(|parent| parent.name == "figure")
        } else {
            CONTENT_BRANCH_TAGS.contains(&name)
        }
    }
}

use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::contextualizer::{Contextualizer, DefaultContextualizer};
use crate::doc::{Classification, Document, Item, Tag, TagId};
use crate::error::{DocError, DocResult};

/// Limits applied before and during parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParseOptions {
    /// Fragments longer than this many bytes are rejected without being read
    pub max_input_bytes: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            max_input_bytes: 1024 * 1024,
        }
    }
}

/// Named entities accepted in addition to the five XML ones
fn html_entity(name: &str) -> Option<&'static str> {
    match name {
        "nbsp" => Some("\u{a0}"),
        "ndash" => Some("\u{2013}"),
        "mdash" => Some("\u{2014}"),
        "hellip" => Some("\u{2026}"),
        "laquo" => Some("\u{ab}"),
        "raquo" => Some("\u{bb}"),
        "copy" => Some("\u{a9}"),
        _ => None,
    }
}

/// The five XML entities, then the HTML ones above
fn resolve_entity(name: &str) -> Option<&'static str> {
    resolve_predefined_entity(name).or_else(|| html_entity(name))
}

/// A parser turning an XHTML fragment into a linear [`Document`].
///
/// The fragment must be well-formed and wrapped in exactly one top-level
/// block element. Each element is classified once by the contextualizer;
/// opaque elements are captured with their raw inner markup and never
/// descended into.
pub struct Parser<'a> {
    input: &'a str,
    contextualizer: &'a dyn Contextualizer,
    options: ParseOptions,
    stack: Vec<Tag>,
    doc: Document,
    pending_void: Option<Tag>,
    seen_root: bool,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str, contextualizer: &'a dyn Contextualizer) -> Self {
        Parser {
            input,
            contextualizer,
            options: ParseOptions::default(),
            stack: Vec::new(),
            doc: Document::new(),
            pending_void: None,
            seen_root: false,
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    /// Consume the fragment and build the document.
    ///
    /// # Errors
    ///
    /// * [`DocError::InputTooLarge`] - checked before reading anything
    /// * [`DocError::Parse`] - malformed markup, unbalanced or stray tags,
    ///   unknown entities, content inside a void element, or anything other
    ///   than one top-level block element
    pub fn parse(mut self) -> DocResult<Document> {
        if self.input.len() > self.options.max_input_bytes {
            return Err(DocError::InputTooLarge {
                size: self.input.len(),
                limit: self.options.max_input_bytes,
            });
        }

        let input = self.input;
        let mut reader = Reader::from_str(input);
        reader.config_mut().trim_text(false);
        reader.config_mut().check_end_names = false;

        loop {
            let position = reader.buffer_position() as usize;
            let event = reader
                .read_event()
                .map_err(|e| DocError::parse(e.to_string(), input, reader.buffer_position() as usize))?;

            match event {
                Event::Start(e) => {
                    let tag = self.open_element(&e, false, position)?;
                    if tag.class == Classification::Opaque {
                        let span = reader
                            .read_to_end(e.name())
                            .map_err(|err| DocError::parse(err.to_string(), input, position))?;
                        let content = input[span.start as usize..span.end as usize].to_string();
                        self.doc.append(Item::Opaque { tag, content });
                    } else {
                        self.place(tag);
                    }
                }
                Event::Empty(e) => {
                    let tag = self.open_element(&e, true, position)?;
                    self.place(tag);
                }
                Event::End(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
                    self.close_element(&name, position)?;
                }
                Event::Text(e) => {
                    let text = e
                        .unescape_with(resolve_entity)
                        .map_err(|err| DocError::parse(err.to_string(), input, position))?;
                    self.push_text(&text, position)?;
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    self.push_text(&text, position)?;
                }
                Event::Comment(_) => debug!("Dropping comment at byte {}", position),
                Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {
                    debug!("Dropping declaration at byte {}", position)
                }
                Event::Eof => break,
            }
        }

        if let Some(tag) = self.pending_void {
            return Err(DocError::parse(
                format!("void element <{}> is never closed", tag.name),
                input,
                input.len(),
            ));
        }
        if let Some(tag) = self.stack.last() {
            return Err(DocError::parse(
                format!("unclosed element <{}>", tag.name),
                input,
                input.len(),
            ));
        }
        if !self.seen_root {
            return Err(DocError::parse(
                "fragment has no top-level block element",
                input,
                0,
            ));
        }
        Ok(self.doc)
    }

    fn open_element(&mut self, e: &BytesStart, self_closing: bool, position: usize) -> DocResult<Tag> {
        let name = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
        if let Some(void) = &self.pending_void {
            return Err(DocError::parse(
                format!("<{}> inside void element <{}>", name, void.name),
                self.input,
                position,
            ));
        }

        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| DocError::parse(err.to_string(), self.input, position))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_lowercase();
            let value = attr
                .unescape_value_with(resolve_entity)
                .map_err(|err| DocError::parse(err.to_string(), self.input, position))?;
            attributes.push((key, value.into_owned()));
        }

        let mut class = self.contextualizer.classify(&name, &attributes, &self.stack);
        if self.stack.is_empty() {
            if self.seen_root {
                return Err(DocError::parse(
                    format!("second top-level element <{}>", name),
                    self.input,
                    position,
                ));
            }
            if class != Classification::Block {
                return Err(DocError::parse(
                    format!("fragment must be wrapped in a block element, found <{}>", name),
                    self.input,
                    position,
                ));
            }
            self.seen_root = true;
        } else if class == Classification::Block
            && self.stack.iter().any(|tag| tag.class == Classification::Inline)
        {
            debug!("Treating <{}> inside inline content as inline", name);
            class = Classification::Inline;
        }

        let segmentable = self.contextualizer.segmentable(&name, &attributes, &self.stack);
        Ok(Tag {
            id: TagId::next(),
            name,
            attributes,
            class,
            segmentable,
            self_closing,
        })
    }

    /// Record a classified, non-opaque element
    fn place(&mut self, tag: Tag) {
        match tag.class {
            Classification::Void if tag.self_closing => self.doc.append(Item::Void(tag)),
            Classification::Void => self.pending_void = Some(tag),
            Classification::Opaque => self.doc.append(Item::Opaque {
                tag,
                content: String::new(),
            }),
            Classification::Block | Classification::Inline => {
                let id = tag.id;
                let self_closing = tag.self_closing;
                self.doc.append(Item::Open(tag.clone()));
                if self_closing {
                    self.doc.append(Item::Close(id));
                } else {
                    self.stack.push(tag);
                }
            }
        }
    }

    fn close_element(&mut self, name: &str, position: usize) -> DocResult<()> {
        if let Some(void) = self.pending_void.take() {
            if void.name != name {
                return Err(DocError::parse(
                    format!("</{}> inside void element <{}>", name, void.name),
                    self.input,
                    position,
                ));
            }
            self.doc.append(Item::Void(void));
            return Ok(());
        }

        let open = self.stack.pop().ok_or_else(|| {
            DocError::parse(format!("unexpected close tag </{}>", name), self.input, position)
        })?;
        if open.name != name {
            return Err(DocError::parse(
                format!("mismatched close tag </{}>, expected </{}>", name, open.name),
                self.input,
                position,
            ));
        }
        self.doc.append(Item::Close(open.id));
        Ok(())
    }

    fn push_text(&mut self, text: &str, position: usize) -> DocResult<()> {
        if text.is_empty() {
            return Ok(());
        }
        if let Some(void) = &self.pending_void {
            return Err(DocError::parse(
                format!("text inside void element <{}>", void.name),
                self.input,
                position,
            ));
        }
        if self.stack.is_empty() {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(DocError::parse(
                "text outside the top-level element",
                self.input,
                position,
            ));
        }
        self.doc.append_text(text);
        Ok(())
    }
}

/// Parse a fragment with the [`DefaultContextualizer`] and default limits.
pub fn parse(fragment: &str) -> DocResult<Document> {
    Parser::new(fragment, &DefaultContextualizer).parse()
}

/// Parse a fragment with the given contextualizer and default limits.
pub fn parse_with(fragment: &str, contextualizer: &dyn Contextualizer) -> DocResult<Document> {
    Parser::new(fragment, contextualizer).parse()
}

//! Sentinel tokens standing in for inline markup
//!
//! Plain-text engines only see text, so every inline tag of a line is replaced
//! by a pair of short tokens and every atom (void element, opaque element or
//! empty inline element) by a single token:
//!
//! ```ignore
//! Source:  The <b>big <i>red</i></b> dog<br/>
//! Line:    The ⟦1⟧big ⟦2⟧red⟦/2⟧⟦/1⟧ dog⟦3/⟧
//! ```
//!
//! Slots are numbered from 1 in source order. The [`SentinelMap`] built for a
//! line lives only for one round trip through the engine.

use lineardoc::{Item, Tag};
use regex::Regex;
use std::sync::LazyLock;

/// Tolerates whitespace an engine may insert inside a token.
static SENTINEL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"⟦\s*(/?)\s*(\d+)\s*(/?)\s*⟧").expect("Invalid sentinel regex")
});

/// Which token of a slot was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Open,
    Close,
    Atom,
}

/// A token located in a translated line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub slot: usize,
    pub kind: MarkerKind,
    /// Byte offset in the text with all tokens removed
    pub position: usize,
}

pub fn open_token(slot: usize) -> String {
    format!("⟦{}⟧", slot)
}

pub fn close_token(slot: usize) -> String {
    format!("⟦/{}⟧", slot)
}

pub fn atom_token(slot: usize) -> String {
    format!("⟦{}/⟧", slot)
}

/// Remove every sentinel token from `text`.
///
/// # Returns
///
/// The remaining text and the tokens found, in order of appearance, with
/// positions expressed in the remaining text.
///
/// # Example
///
/// ```ignore
/// let (clean, markers) = strip_sentinels("el ⟦1⟧perro⟦/1⟧");
/// assert_eq!(clean, "el perro");
/// assert_eq!(markers[0].position, 3);
/// assert_eq!(markers[1].position, 8);
/// ```
pub fn strip_sentinels(text: &str) -> (String, Vec<Marker>) {
    let mut clean = String::with_capacity(text.len());
    let mut markers = Vec::new();
    let mut last = 0;

    for captures in SENTINEL_PATTERN.captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        // Digits that overflow usize are not one of our tokens.
        let Some(slot) = captures.get(2).and_then(|m| m.as_str().parse::<usize>().ok()) else {
            continue;
        };
        let leading = captures.get(1).is_some_and(|m| !m.as_str().is_empty());
        let trailing = captures.get(3).is_some_and(|m| !m.as_str().is_empty());
        let kind = match (leading, trailing) {
            (true, false) => MarkerKind::Close,
            (false, true) => MarkerKind::Atom,
            (false, false) => MarkerKind::Open,
            (true, true) => continue,
        };

        clean.push_str(&text[last..whole.start()]);
        markers.push(Marker {
            slot,
            kind,
            position: clean.len(),
        });
        last = whole.end();
    }
    clean.push_str(&text[last..]);
    (clean, markers)
}

/// What a slot stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotEntry {
    /// An inline element wrapping text
    Tag(Tag),
    /// Items moved as a whole, with the slots of the tags enclosing them in the source
    Atom { items: Vec<Item>, enclosing: Vec<usize> },
}

/// Per-line table from slot number to the markup it replaces
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentinelMap {
    entries: Vec<SlotEntry>,
}

impl SentinelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an inline tag and return its slot.
    pub fn insert_tag(&mut self, tag: Tag) -> usize {
        self.entries.push(SlotEntry::Tag(tag));
        self.entries.len()
    }

    /// Register an atom and return its slot.
    pub fn insert_atom(&mut self, items: Vec<Item>, enclosing: Vec<usize>) -> usize {
        self.entries.push(SlotEntry::Atom { items, enclosing });
        self.entries.len()
    }

    pub fn get(&self, slot: usize) -> Option<&SlotEntry> {
        slot.checked_sub(1).and_then(|index| self.entries.get(index))
    }

    pub fn tag(&self, slot: usize) -> Option<&Tag> {
        match self.get(slot) {
            Some(SlotEntry::Tag(tag)) => Some(tag),
            _ => None,
        }
    }

    /// All slots with their entries, in source order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &SlotEntry)> {
        self.entries.iter().enumerate().map(|(index, entry)| (index + 1, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

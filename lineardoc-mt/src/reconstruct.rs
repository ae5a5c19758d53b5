//! Putting inline markup back into a translated line
//!
//! Each tag of the source line is placed in the translation, in source order:
//!
//! 1. Both sentinel tokens survived, in order: the tag wraps what lies between them.
//! 2. One token survived: the tag wraps the word next to it.
//! 3. No token survived: a tag enclosing the whole source line wraps the whole
//!    translation; any other tag wraps wherever the translations of its
//!    chunks are found.
//! 4. Nothing found: the tag is dropped. Its text stays.
//!
//! Atoms go where their token is, or after the text that preceded them.
//! Everything short of case 1 is reported as a [`ReconstructionAnomaly`].
//!
//! Because tags are placed by source order, two adjacent `<a>` elements that
//! swap places in the translation keep their own attributes.

use crate::casing::{recase, uppercase_ranges};
use crate::config::TranslationOptions;
use crate::flatten::Line;
use crate::matcher::{SubsequenceMatcher, word_ranges};
use crate::sentinel::{Marker, MarkerKind, SlotEntry, strip_sentinels};
use lineardoc::{Document, Item, TagId};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::ops::Range;

/// A tag or word that could not be placed exactly
///
/// Anomalies never abort a translation; each is logged and returned with the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconstructionAnomaly {
    /// Only one of the tag's tokens survived; the tag went to the adjacent word
    PartialSentinel { tag: String },
    /// No token survived; the tag was placed from the translations of its chunks
    SubsequenceFallback { tag: String },
    /// Nowhere to put the tag; its text was kept untagged
    TagDropped { tag: String },
    /// An atom's token was lost; the atom went after the preceding text
    AtomRelocated { tag: String },
    /// An upper-case word could not be found in the translation
    CasingUnaligned { word: String },
}

impl fmt::Display for ReconstructionAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconstructionAnomaly::PartialSentinel { tag } => {
                write!(f, "<{}> kept one sentinel, attached to the adjacent word", tag)
            }
            ReconstructionAnomaly::SubsequenceFallback { tag } => {
                write!(f, "<{}> lost its sentinels, placed by subsequence match", tag)
            }
            ReconstructionAnomaly::TagDropped { tag } => {
                write!(f, "<{}> could not be placed and was dropped", tag)
            }
            ReconstructionAnomaly::AtomRelocated { tag } => {
                write!(f, "<{}> lost its sentinel and was moved", tag)
            }
            ReconstructionAnomaly::CasingUnaligned { word } => {
                write!(f, "casing of {} could not be reapplied", word)
            }
        }
    }
}

/// Where the tags and atoms of a line ended up in its translation
#[derive(Debug, Default)]
struct Placement {
    tags: Vec<(usize, Vec<Range<usize>>)>,
    atoms: Vec<(usize, usize)>,
}

/// Rebuild the items of one translated line.
///
/// # Arguments
///
/// * `line` - The flattened source line
/// * `responses` - Engine output for [`Line::requests`], same length and order
/// * `options` - Fuzzy match and casing settings
/// * `anomalies` - Receives everything that could not be placed exactly
pub fn rebuild_line(
    line: &Line,
    responses: &[String],
    options: &TranslationOptions,
    anomalies: &mut Vec<ReconstructionAnomaly>,
) -> Vec<Item> {
    let subsequence_count = line.subsequences.len();
    let (sentinel_line, rest) = match responses.split_first() {
        Some((first, rest)) => (first.as_str(), rest),
        None => ("", responses),
    };
    let (subsequences, words) = rest.split_at(subsequence_count.min(rest.len()));

    let (clean, mut markers) = strip_sentinels(sentinel_line.trim());
    // A token at either end can leave a space behind once stripped.
    let body = clean.trim_start();
    let cut = clean.len() - body.len();
    let body = body.trim_end();
    let text = format!("{}{}{}", line.leading, body, line.trailing);
    for marker in &mut markers {
        marker.position = marker.position.saturating_sub(cut).min(body.len()) + line.leading.len();
    }

    let placement = place(line, &text, &markers, subsequences, options, anomalies);

    let recasing = recase(&text, &line.casing, words, options.fuzzy_max_distance);
    anomalies.extend(
        recasing
            .unaligned
            .into_iter()
            .map(|word| ReconstructionAnomaly::CasingUnaligned { word }),
    );

    emit(line, &text, &placement, &recasing.ranges)
}

fn place(
    line: &Line,
    text: &str,
    markers: &[Marker],
    subsequences: &[String],
    options: &TranslationOptions,
    anomalies: &mut Vec<ReconstructionAnomaly>,
) -> Placement {
    let content = trimmed_range(text);
    let words = word_ranges(text);
    let mut chunks = ChunkLocator {
        line,
        subsequences,
        matcher: SubsequenceMatcher::new(text, options.fuzzy_max_distance),
        located: HashMap::new(),
    };

    let mut placement = Placement::default();
    for (slot, entry) in line.sentinels.iter() {
        match entry {
            SlotEntry::Tag(tag) => {
                let open = find_marker(markers, slot, MarkerKind::Open, 0);
                let close = find_marker(markers, slot, MarkerKind::Close, open.unwrap_or(0));

                let exact = match (open, close) {
                    (Some(start), Some(end)) if start < end => Some(start..end),
                    _ => None,
                };
                if let Some(range) = exact {
                    placement.tags.push((slot, vec![range]));
                    continue;
                }

                // The word the marker points at, else the one on its other side.
                let adjacent = match (open, close) {
                    (Some(start), _) => words
                        .iter()
                        .find(|word| word.end > start)
                        .or_else(|| words.iter().rev().find(|word| word.start < start))
                        .cloned(),
                    (None, Some(end)) => words
                        .iter()
                        .rev()
                        .find(|word| word.start < end)
                        .or_else(|| words.iter().find(|word| word.end > end))
                        .cloned(),
                    (None, None) => None,
                };
                if let Some(range) = adjacent {
                    anomalies.push(ReconstructionAnomaly::PartialSentinel { tag: tag.name.clone() });
                    placement.tags.push((slot, vec![range]));
                    continue;
                }

                if line.common.contains(&slot) {
                    if !content.is_empty() {
                        placement.tags.push((slot, vec![content.clone()]));
                    }
                    continue;
                }

                let ranges: Vec<Range<usize>> = line
                    .chunks
                    .iter()
                    .enumerate()
                    .filter(|(_, chunk)| chunk.stack.contains(&slot))
                    .filter_map(|(index, _)| chunks.locate(index))
                    .collect();
                if ranges.is_empty() {
                    anomalies.push(ReconstructionAnomaly::TagDropped { tag: tag.name.clone() });
                } else {
                    anomalies.push(ReconstructionAnomaly::SubsequenceFallback { tag: tag.name.clone() });
                    placement.tags.push((slot, ranges));
                }
            }
            SlotEntry::Atom { items, .. } => {
                if let Some(position) = find_marker(markers, slot, MarkerKind::Atom, 0) {
                    placement.atoms.push((slot, position));
                    continue;
                }
                let position = line
                    .chunk_before_atom(slot)
                    .and_then(|chunk| chunks.locate(chunk))
                    .map_or(content.end, |range| range.end);
                let name = items
                    .first()
                    .and_then(Item::tag)
                    .map_or_else(String::new, |tag| tag.name.clone());
                anomalies.push(ReconstructionAnomaly::AtomRelocated { tag: name });
                placement.atoms.push((slot, position));
            }
        }
    }
    placement
}

/// Finds chunk translations in the line, each chunk at most once
struct ChunkLocator<'a> {
    line: &'a Line,
    subsequences: &'a [String],
    matcher: SubsequenceMatcher<'a>,
    located: HashMap<usize, Option<Range<usize>>>,
}

impl ChunkLocator<'_> {
    fn locate(&mut self, chunk: usize) -> Option<Range<usize>> {
        if let Some(found) = self.located.get(&chunk) {
            return found.clone();
        }
        let found = self.line.chunks[chunk]
            .subsequence
            .and_then(|index| self.subsequences.get(index))
            .and_then(|translation| self.matcher.locate(translation));
        self.located.insert(chunk, found.clone());
        found
    }
}

fn find_marker(markers: &[Marker], slot: usize, kind: MarkerKind, from: usize) -> Option<usize> {
    markers
        .iter()
        .find(|marker| marker.slot == slot && marker.kind == kind && marker.position >= from)
        .map(|marker| marker.position)
}

/// `text` without its outer whitespace, as a range
fn trimmed_range(text: &str) -> Range<usize> {
    let start = text.len() - text.trim_start().len();
    let end = text.trim_end().len().max(start);
    start..end
}

fn emit(line: &Line, text: &str, placement: &Placement, uppercase: &[Range<usize>]) -> Vec<Item> {
    let mut boundaries: BTreeSet<usize> = BTreeSet::from([0, text.len()]);
    for (_, ranges) in &placement.tags {
        for range in ranges {
            boundaries.insert(range.start);
            boundaries.insert(range.end);
        }
    }
    let mut atoms = placement.atoms.clone();
    atoms.sort_by_key(|&(slot, position)| (position, slot));
    boundaries.extend(atoms.iter().map(|(_, position)| *position));
    let points: Vec<usize> = boundaries.into_iter().collect();

    let mut doc = Document::new();
    let mut open: Vec<(usize, TagId)> = Vec::new();
    let mut pending = atoms.iter().peekable();

    for window in points.windows(2) {
        let (start, end) = (window[0], window[1]);
        while let Some(&(slot, _)) = pending.next_if(|(_, position)| *position <= start) {
            emit_atom(line, placement, slot, start, &mut doc, &mut open);
        }
        if start < end {
            let wanted: Vec<usize> = placement
                .tags
                .iter()
                .filter(|(_, ranges)| ranges.iter().any(|r| r.start <= start && end <= r.end))
                .map(|(slot, _)| *slot)
                .collect();
            transition(line, &wanted, &mut doc, &mut open);
            doc.append_text(&uppercase_ranges(&text[start..end], start, uppercase));
        }
    }
    for &(slot, position) in pending {
        emit_atom(line, placement, slot, position, &mut doc, &mut open);
    }
    transition(line, &[], &mut doc, &mut open);
    doc.into_items()
}

fn emit_atom(
    line: &Line,
    placement: &Placement,
    slot: usize,
    position: usize,
    doc: &mut Document,
    open: &mut Vec<(usize, TagId)>,
) {
    let Some(SlotEntry::Atom { items, enclosing }) = line.sentinels.get(slot) else {
        return;
    };
    // Inside a tag that spans the position, or touches it and enclosed the atom in the source.
    let wanted: Vec<usize> = placement
        .tags
        .iter()
        .filter(|(tag_slot, ranges)| {
            ranges.iter().any(|r| {
                (r.start < position && position < r.end)
                    || (enclosing.contains(tag_slot) && r.start <= position && position <= r.end)
            })
        })
        .map(|(tag_slot, _)| *tag_slot)
        .collect();
    transition(line, &wanted, doc, open);
    for item in reissue(items) {
        doc.append(item);
    }
}

/// Close and open tags so that exactly `wanted` (ascending slots) are open.
/// Every opened tag is a fresh copy of the source tag.
fn transition(line: &Line, wanted: &[usize], doc: &mut Document, open: &mut Vec<(usize, TagId)>) {
    let keep = open
        .iter()
        .zip(wanted)
        .take_while(|((slot, _), wanted)| slot == *wanted)
        .count();
    while open.len() > keep {
        if let Some((_, id)) = open.pop() {
            doc.append(Item::Close(id));
        }
    }
    for &slot in &wanted[keep..] {
        if let Some(tag) = line.sentinels.tag(slot) {
            let fresh = tag.reissue();
            open.push((slot, fresh.id));
            doc.append(Item::Open(fresh));
        }
    }
}

/// Copy items, giving every tag in them a fresh id.
pub fn reissue(items: &[Item]) -> Vec<Item> {
    let mut ids: HashMap<TagId, TagId> = HashMap::new();
    items
        .iter()
        .map(|item| match item {
            Item::Text(text) => Item::Text(text.clone()),
            Item::Open(tag) => {
                let fresh = tag.reissue();
                ids.insert(tag.id, fresh.id);
                Item::Open(fresh)
            }
            Item::Close(id) => Item::Close(ids.get(id).copied().unwrap_or(*id)),
            Item::Void(tag) => Item::Void(tag.reissue()),
            Item::Opaque { tag, content } => Item::Opaque {
                tag: tag.reissue(),
                content: content.clone(),
            },
        })
        .collect()
}

//! Flattening a block run into lines for the engine
//!
//! One run of inline content becomes one [`Line`]: the text with sentinel
//! tokens in place of markup, plus the extra lines that help place tags when
//! the engine loses the tokens.
//!
//! ```ignore
//! Source:        <p>The <b>big <i>red</i></b> dog</p>
//! Sentinel line: the ⟦1⟧big ⟦2⟧red⟦/2⟧⟦/1⟧ dog
//! Subsequences:  big
//!                red
//! ```

use crate::casing::{CaseNormalizer, CasingRecord};
use crate::config::TranslationOptions;
use crate::matcher::has_word;
use crate::sentinel::{SentinelMap, atom_token, close_token, open_token};
use lineardoc::{DocError, DocResult, Item, TagId};

/// A stretch of text with the slots of the tags enclosing it, outermost first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Case-normalised text
    pub text: String,
    pub stack: Vec<usize>,
    /// Index into [`Line::subsequences`] when the chunk is translated on its own
    pub subsequence: Option<usize>,
}

/// The line in source order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece {
    /// Index into [`Line::chunks`]
    Text(usize),
    Open(usize),
    Close(usize),
    Atom(usize),
}

/// One block run prepared for translation
#[derive(Debug, Clone)]
pub struct Line {
    pub sentinels: SentinelMap,
    pub pieces: Vec<Piece>,
    pub chunks: Vec<Chunk>,
    /// Slots of the tags enclosing every chunk that has words
    pub common: Vec<usize>,
    pub casing: CasingRecord,
    /// The sentinel line without its outer whitespace
    pub outgoing: String,
    pub leading: String,
    pub trailing: String,
    /// Trimmed text of the chunks carrying tags that are not common
    pub subsequences: Vec<String>,
}

impl Line {
    /// Flatten the items of one block run.
    ///
    /// # Errors
    ///
    /// [`DocError::Structure`] if the items contain a block marker or their
    /// inline markers do not nest.
    pub fn build(items: &[Item], options: &TranslationOptions) -> DocResult<Line> {
        let mut sentinels = SentinelMap::new();
        let mut pieces = Vec::new();
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut normalizer = CaseNormalizer::new(options.acronym_max_len);
        let mut stack: Vec<(TagId, usize)> = Vec::new();
        let slots = |stack: &[(TagId, usize)]| stack.iter().map(|(_, slot)| *slot).collect::<Vec<_>>();

        let mut index = 0;
        while index < items.len() {
            match &items[index] {
                Item::Text(text) => {
                    if !text.is_empty() {
                        chunks.push(Chunk {
                            text: normalizer.normalize(text),
                            stack: slots(&stack),
                            subsequence: None,
                        });
                        pieces.push(Piece::Text(chunks.len() - 1));
                    }
                }
                Item::Open(tag) if tag.is_block() => {
                    return Err(DocError::Structure(format!(
                        "block <{}> ({}) inside an inline run",
                        tag.name, tag.id
                    )));
                }
                Item::Open(tag) => {
                    let end = matching_close(items, index)?;
                    let empty = items[index + 1..end]
                        .iter()
                        .all(|item| item.as_text().is_none_or(|text| text.trim().is_empty()));
                    if empty {
                        let slot = sentinels.insert_atom(items[index..=end].to_vec(), slots(&stack));
                        pieces.push(Piece::Atom(slot));
                        index = end + 1;
                        continue;
                    }
                    let slot = sentinels.insert_tag(tag.clone());
                    stack.push((tag.id, slot));
                    pieces.push(Piece::Open(slot));
                }
                Item::Close(id) => match stack.pop() {
                    Some((open, slot)) if open == *id => pieces.push(Piece::Close(slot)),
                    _ => {
                        return Err(DocError::Structure(format!(
                            "close marker {} at item {} does not match an open inline tag",
                            id, index
                        )));
                    }
                },
                item @ (Item::Void(_) | Item::Opaque { .. }) => {
                    let slot = sentinels.insert_atom(vec![item.clone()], slots(&stack));
                    pieces.push(Piece::Atom(slot));
                }
            }
            index += 1;
        }
        if let Some((id, _)) = stack.last() {
            return Err(DocError::Structure(format!(
                "inline tag {} left open at the end of the run",
                id
            )));
        }

        let common = common_slots(&chunks);
        let mut subsequences = Vec::new();
        for chunk in &mut chunks {
            let tagged = chunk.stack.iter().any(|slot| !common.contains(slot));
            if tagged && has_word(&chunk.text) {
                chunk.subsequence = Some(subsequences.len());
                subsequences.push(chunk.text.trim().to_string());
            }
        }

        let mut line = String::new();
        for piece in &pieces {
            match *piece {
                Piece::Text(chunk) => line.push_str(&chunks[chunk].text),
                Piece::Open(slot) => line.push_str(&open_token(slot)),
                Piece::Close(slot) => line.push_str(&close_token(slot)),
                Piece::Atom(slot) => line.push_str(&atom_token(slot)),
            }
        }
        let trimmed_start = line.trim_start();
        let leading = line[..line.len() - trimmed_start.len()].to_string();
        let outgoing = trimmed_start.trim_end().to_string();
        let trailing = trimmed_start[outgoing.len()..].to_string();

        Ok(Line {
            sentinels,
            pieces,
            chunks,
            common,
            casing: normalizer.finish(),
            outgoing,
            leading,
            trailing,
            subsequences,
        })
    }

    /// Whether there is anything for the engine to translate
    pub fn is_translatable(&self) -> bool {
        self.chunks.iter().any(|chunk| has_word(&chunk.text))
    }

    /// Lines to send, in order: the sentinel line, the subsequences, then one
    /// line per upper-case word.
    pub fn requests(&self) -> Vec<String> {
        let mut requests = Vec::with_capacity(self.request_count());
        requests.push(self.outgoing.clone());
        requests.extend(self.subsequences.iter().cloned());
        requests.extend(self.casing.upper.iter().map(|word| word.lowered.clone()));
        requests
    }

    pub fn request_count(&self) -> usize {
        1 + self.subsequences.len() + self.casing.upper.len()
    }

    /// The chunk written just before `slot`'s atom token
    pub fn chunk_before_atom(&self, slot: usize) -> Option<usize> {
        let position = self.pieces.iter().position(|piece| *piece == Piece::Atom(slot))?;
        self.pieces[..position].iter().rev().find_map(|piece| match piece {
            Piece::Text(chunk) => Some(*chunk),
            _ => None,
        })
    }
}

fn matching_close(items: &[Item], open: usize) -> DocResult<usize> {
    let id = match &items[open] {
        Item::Open(tag) => tag.id,
        _ => return Err(DocError::Structure(format!("item {} is not an open tag", open))),
    };
    items[open + 1..]
        .iter()
        .position(|item| matches!(item, Item::Close(close) if *close == id))
        .map(|offset| open + 1 + offset)
        .ok_or_else(|| DocError::Structure(format!("open tag {} at item {} is never closed", id, open)))
}

fn common_slots(chunks: &[Chunk]) -> Vec<usize> {
    let mut worded = chunks.iter().filter(|chunk| has_word(&chunk.text));
    let Some(first) = worded.next() else {
        return Vec::new();
    };
    let mut common = first.stack.clone();
    for chunk in worded {
        common.retain(|slot| chunk.stack.contains(slot));
    }
    common
}

//! Sentence segmentation over linear documents
//!
//! The [`Segmenter`] walks every segmentable block run of a [`Document`] and
//! cuts it into sentences with a deferred-boundary state machine. A terminator
//! only marks a *candidate* boundary; the boundary is committed once the next
//! sentence visibly starts, so a citation marker right after a full stop stays
//! with the sentence it annotates. Boundaries are only ever placed where no
//! inline tag is open.
//!
//! # Example
//!
//! ```ignore
//! use lineardoc::{MwContextualizer, Segmenter, parse_with};
//!
//! let doc = parse_with("<p>One sentence. Another one.</p>", &MwContextualizer)?;
//! let segmented = Segmenter::for_language("en").segment(&doc)?;
//! assert_eq!(segmented.segments().len(), 2);
//! println!("{}", segmented.render()?);
//! ```

pub mod rules;

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use crate::doc::{Classification, Document, Item, Tag, TagId};
use crate::error::{DocError, DocResult};
pub use rules::LanguageRule;

/// Class of the inline element wrapping each rendered sentence
pub const SEGMENT_CLASS: &str = "cx-segment";

/// Attribute carrying the segment id in rendered markup
pub const SEGMENT_ID_ATTRIBUTE: &str = "data-segmentid";

/// A sentence: a half-open range of item indices in a [`SegmentedDocument`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub id: usize,
    pub start: usize,
    pub end: usize,
    pub language: String,
}

impl Segment {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// A copy of the source document whose text items are split at sentence
/// boundaries, together with the sentences found in it
#[derive(Debug, Clone)]
pub struct SegmentedDocument {
    document: Document,
    segments: Vec<Segment>,
}

impl SegmentedDocument {
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn into_parts(self) -> (Document, Vec<Segment>) {
        (self.document, self.segments)
    }

    /// Plain text of one segment
    pub fn segment_text(&self, segment: &Segment) -> String {
        self.document.items()[segment.range()]
            .iter()
            .filter_map(Item::as_text)
            .collect()
    }

    /// Serialize with every segment wrapped in
    /// `<span class="cx-segment" data-segmentid="N">`.
    pub fn render(&self) -> DocResult<String> {
        let mut items = Vec::with_capacity(self.document.len() + 2 * self.segments.len());
        let mut segments = self.segments.iter().peekable();
        let mut open: Option<(usize, TagId)> = None;

        for (index, item) in self.document.items().iter().enumerate() {
            if let Some((end, id)) = open {
                if end == index {
                    items.push(Item::Close(id));
                    open = None;
                }
            }
            if let Some(segment) = segments.next_if(|segment| segment.start == index) {
                let wrapper = Tag::new("span", Classification::Inline)
                    .with_attribute("class", SEGMENT_CLASS)
                    .with_attribute(SEGMENT_ID_ATTRIBUTE, segment.id.to_string());
                open = Some((segment.end, wrapper.id));
                items.push(Item::Open(wrapper));
            }
            items.push(item.clone());
        }
        if let Some((_, id)) = open {
            items.push(Item::Close(id));
        }
        Document::from_items(items).to_markup()
    }
}

/// A position between characters: byte `offset` into item `item`.
/// Non-text items only have offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Cut {
    item: usize,
    offset: usize,
}

impl Cut {
    fn before(item: usize) -> Self {
        Cut { item, offset: 0 }
    }
}

/// A candidate boundary waiting for evidence that a new sentence starts
#[derive(Debug, Clone, Copy)]
struct Pending {
    cut: Cut,
    /// Inline depth at the cut; only depth 0 can be committed
    depth: usize,
    /// Whitespace and atoms directly after the cut still belong to the ending sentence
    extending: bool,
    /// Non-whitespace text was seen after the cut
    seen_text: bool,
    /// A new sentence started inside an open inline tag; commit once it closes
    deferred: bool,
}

impl Pending {
    fn new(cut: Cut, depth: usize, deferred: bool) -> Self {
        Pending {
            cut,
            depth,
            extending: true,
            seen_text: false,
            deferred,
        }
    }

    /// Move the cut past a closing marker or atom at `depth`
    fn absorb(&mut self, cut: Cut, depth: usize) {
        self.cut = cut;
        self.depth = depth;
        self.extending = true;
    }
}

/// Splits documents into sentences with one language rule
#[derive(Debug, Clone)]
pub struct Segmenter {
    rule: &'static LanguageRule,
    language: String,
}

impl Segmenter {
    pub fn new(rule: &'static LanguageRule, language: impl Into<String>) -> Self {
        Segmenter {
            rule,
            language: language.into(),
        }
    }

    /// Segmenter for a BCP 47 language tag, using the rule registered for it
    pub fn for_language(language: &str) -> Self {
        Segmenter::new(rules::for_language(language), language)
    }

    pub fn rule(&self) -> &LanguageRule {
        self.rule
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Find the sentences of every segmentable block run.
    ///
    /// The source document is not modified; the result holds a copy with text
    /// items split at the boundaries.
    ///
    /// # Errors
    ///
    /// [`DocError::Segmentation`] when a block run ends with an inline tag
    /// still open.
    pub fn segment(&self, doc: &Document) -> DocResult<SegmentedDocument> {
        let items = doc.items();
        let mut pieces: Vec<(Cut, Cut)> = Vec::new();

        for run in doc.block_runs() {
            if !run.segmentable {
                continue;
            }
            let mut points = vec![Cut::before(run.range.start)];
            for cut in self.boundaries(items, run.range.clone())? {
                points.push(normalize(items, cut));
            }
            points.push(Cut::before(run.range.end));
            points.dedup();

            for pair in points.windows(2) {
                if has_content(items, pair[0], pair[1]) {
                    pieces.push((pair[0], pair[1]));
                }
            }
        }

        let (document, positions) = split_text_items(items, &pieces);
        let segments = pieces
            .iter()
            .enumerate()
            .map(|(id, (start, end))| Segment {
                id,
                start: positions[start],
                end: positions[end],
                language: self.language.clone(),
            })
            .collect();

        Ok(SegmentedDocument { document, segments })
    }

    /// Committed boundaries inside one block run
    fn boundaries(&self, items: &[Item], run: Range<usize>) -> DocResult<Vec<Cut>> {
        let mut cuts = Vec::new();
        let mut depth = 0usize;
        let mut pending: Option<Pending> = None;

        for index in run.clone() {
            match &items[index] {
                Item::Open(_) => {
                    depth += 1;
                    if let Some(p) = pending.as_mut() {
                        p.extending = false;
                    }
                }
                Item::Close(id) => {
                    depth = depth.checked_sub(1).ok_or_else(|| {
                        DocError::Segmentation(format!(
                            "close marker {} at item {} closes a tag opened outside its block",
                            id, index
                        ))
                    })?;
                    if let Some(p) = pending.as_mut() {
                        if p.deferred && depth < p.depth {
                            p.absorb(Cut::before(index + 1), depth);
                            if depth == 0 {
                                p.deferred = false;
                                p.seen_text = false;
                            }
                        } else if !p.seen_text && depth <= p.depth {
                            p.absorb(Cut::before(index + 1), depth);
                        }
                    }
                }
                Item::Void(_) | Item::Opaque { .. } => {
                    if let Some(p) = pending.as_mut() {
                        if !p.seen_text && depth <= p.depth {
                            p.absorb(Cut::before(index + 1), depth);
                        }
                    }
                }
                Item::Text(text) => {
                    self.scan_text(text, index, depth, &mut pending, &mut cuts);
                }
            }
        }

        if depth != 0 {
            return Err(DocError::Segmentation(format!(
                "{} inline tag(s) still open at the end of the block ending at item {}",
                depth, run.end
            )));
        }
        Ok(cuts)
    }

    fn scan_text(
        &self,
        text: &str,
        index: usize,
        depth: usize,
        pending: &mut Option<Pending>,
        cuts: &mut Vec<Cut>,
    ) {
        let rule = self.rule;
        let mut pos = 0;

        while let Some(c) = text[pos..].chars().next() {
            let next = pos + c.len_utf8();

            if let Some(p) = pending.as_mut() {
                if c.is_whitespace() {
                    if p.extending && depth == p.depth {
                        p.cut = Cut { item: index, offset: next };
                    }
                    pos = next;
                    continue;
                }
                if p.deferred && !rule.is_terminator(c) {
                    pos = next;
                    continue;
                }
                if c.is_alphanumeric() {
                    if !(rule.is_word_char)(c) {
                        *pending = None;
                    } else if p.depth == 0 {
                        cuts.push(p.cut);
                        *pending = None;
                    } else {
                        p.deferred = true;
                        p.seen_text = true;
                        p.extending = false;
                    }
                    pos = next;
                    continue;
                }
                if !rule.is_terminator(c) {
                    p.seen_text = true;
                    p.extending = false;
                    pos = next;
                    continue;
                }
            }

            if !rule.is_terminator(c) {
                pos = next;
                continue;
            }

            // Terminator: take the whole run of terminators and closing quotes.
            let mut end = next;
            let mut quoted = false;
            while let Some(following) = text[end..].chars().next() {
                if rule.is_terminator(following) {
                    end += following.len_utf8();
                } else if rule.is_closer(following) {
                    quoted = true;
                    end += following.len_utf8();
                } else {
                    break;
                }
            }
            // A closing quote directly followed by text continues the sentence.
            let candidate = match text[end..].chars().next() {
                None => true,
                Some(following) if following.is_whitespace() => true,
                Some(_) => !rule.requires_space && !quoted,
            } && !(rule.abbreviations && c == '.' && is_abbreviation(&text[..pos]));

            if candidate {
                let deferred = pending.is_some_and(|p| p.deferred);
                *pending = Some(Pending::new(Cut { item: index, offset: end }, depth, deferred));
            } else if let Some(p) = pending.as_mut() {
                p.seen_text = true;
                p.extending = false;
            }
            pos = end;
        }
    }
}

/// Whether the word before a full stop looks like an initial or a short
/// title such as "J" or "Dr"
fn is_abbreviation(before: &str) -> bool {
    let word = before.rsplit(char::is_whitespace).next().unwrap_or("");
    let mut chars = word.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(first), None, None) => first.is_ascii_uppercase(),
        (Some(first), Some(second), None) => first.is_ascii_uppercase() && second.is_ascii_lowercase(),
        _ => false,
    }
}

/// A cut at the very end of a text item is the same place as the start of the next item.
fn normalize(items: &[Item], cut: Cut) -> Cut {
    match items.get(cut.item) {
        Some(Item::Text(text)) if cut.offset >= text.len() => Cut::before(cut.item + 1),
        _ => cut,
    }
}

/// Whether the stretch between two cuts holds visible text or an atom
fn has_content(items: &[Item], start: Cut, end: Cut) -> bool {
    (start.item..=end.item.min(items.len().saturating_sub(1))).any(|index| {
        match &items[index] {
            Item::Text(text) => {
                let from = if index == start.item { start.offset } else { 0 };
                let to = if index == end.item { end.offset } else { text.len() };
                from < to && !text[from..to].trim().is_empty()
            }
            item => item.is_atom() && index < end.item,
        }
    })
}

/// Copy `items`, splitting text items at every inner cut of `pieces`.
///
/// Returns the new document and the new item index of every cut.
fn split_text_items(items: &[Item], pieces: &[(Cut, Cut)]) -> (Document, HashMap<Cut, usize>) {
    let mut offsets: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (start, end) in pieces {
        for cut in [start, end] {
            if cut.offset > 0 {
                offsets.entry(cut.item).or_default().push(cut.offset);
            }
        }
    }

    let mut positions = HashMap::new();
    let mut out = Vec::with_capacity(items.len() + offsets.len());
    for (index, item) in items.iter().enumerate() {
        positions.insert(Cut::before(index), out.len());
        match (item, offsets.get_mut(&index)) {
            (Item::Text(text), Some(splits)) => {
                splits.sort_unstable();
                splits.dedup();
                let mut from = 0;
                for &offset in splits.iter() {
                    out.push(Item::Text(text[from..offset].to_string()));
                    positions.insert(Cut { item: index, offset }, out.len());
                    from = offset;
                }
                out.push(Item::Text(text[from..].to_string()));
            }
            _ => out.push(item.clone()),
        }
    }
    positions.insert(Cut::before(items.len()), out.len());
    (Document::from_items(out), positions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contextualizer::MwContextualizer;
    use crate::doc::{escape_attribute, escape_text};
    use crate::parser::{parse, parse_with};
    use proptest::prelude::*;

    fn sentences(markup: &str, language: &str) -> Vec<String> {
        let doc = parse_with(markup, &MwContextualizer).unwrap();
        let segmented = Segmenter::for_language(language).segment(&doc).unwrap();
        segmented
            .segments()
            .iter()
            .map(|segment| segmented.segment_text(segment))
            .collect()
    }

    // ========== Default Rule Tests ==========

    #[test]
    fn test_two_plain_sentences() {
        assert_eq!(
            sentences("<p>This is one. This is two.</p>", "en"),
            vec!["This is one. ", "This is two."]
        );
    }

    #[test]
    fn test_lowercase_continuation_is_not_a_boundary() {
        assert_eq!(
            sentences("<p>Use e.g. this one. And that.</p>", "en"),
            vec!["Use e.g. this one. ", "And that."]
        );
        assert_eq!(sentences("<p>It costs 3.50 dollars.</p>", "en").len(), 1);
    }

    #[test]
    fn test_abbreviations_are_not_boundaries() {
        assert_eq!(
            sentences("<p>Ask Dr. Smith about J. Doe. He knows.</p>", "en"),
            vec!["Ask Dr. Smith about J. Doe. ", "He knows."]
        );
    }

    #[test]
    fn test_closing_quotes_stay_with_sentence() {
        assert_eq!(
            sentences("<p>He said \u{201c}Stop.\u{201d} Then he left.</p>", "en"),
            vec!["He said \u{201c}Stop.\u{201d} ", "Then he left."]
        );
    }

    #[test]
    fn test_citation_after_full_stop_stays_with_sentence() {
        let markup = "<p>Hydrogen is a gas.<sup typeof=\"mw:Extension/ref\"><a href=\"#n1\">[1]</a></sup> It is an element.</p>";
        let doc = parse_with(markup, &MwContextualizer).unwrap();
        let segmented = Segmenter::for_language("en").segment(&doc).unwrap();
        let segments = segmented.segments();
        assert_eq!(segments.len(), 2);

        let first = &segmented.document().items()[segments[0].range()];
        assert!(first.iter().any(Item::is_atom));
        assert_eq!(segmented.segment_text(&segments[0]), "Hydrogen is a gas. ");
        assert_eq!(segmented.segment_text(&segments[1]), "It is an element.");
    }

    #[test]
    fn test_boundary_inside_inline_tag_is_deferred() {
        assert_eq!(
            sentences("<p><b>Hello.</b> World.</p>", "en"),
            vec!["Hello. ", "World."]
        );
        assert_eq!(
            sentences("<p><b>Hello. World</b> More text.</p>", "en"),
            vec!["Hello. World ", "More text."]
        );
    }

    #[test]
    fn test_sentence_starting_in_tag() {
        assert_eq!(
            sentences("<p>First one. <a href=\"x\">Second</a> one.</p>", "en"),
            vec!["First one. ", "Second one."]
        );
    }

    // ========== Block Tests ==========

    #[test]
    fn test_empty_block_has_no_segments() {
        assert!(sentences("<p></p>", "en").is_empty());
        assert!(sentences("<p>  \n </p>", "en").is_empty());
    }

    #[test]
    fn test_opaque_only_block_is_one_segment() {
        let markup = "<p><span typeof=\"mw:Transclusion\" data-mw=\"{}\">Template text. More.</span></p>";
        let doc = parse_with(markup, &MwContextualizer).unwrap();
        let segmented = Segmenter::for_language("en").segment(&doc).unwrap();
        assert_eq!(segmented.segments().len(), 1);
        assert_eq!(segmented.segments()[0].range(), 1..2);
    }

    #[test]
    fn test_non_content_blocks_are_not_segmented() {
        let markup = "<section><div>Not here. Really.</div><p>Here. Yes.</p></section>";
        assert_eq!(sentences(markup, "en"), vec!["Here. ", "Yes."]);
    }

    #[test]
    fn test_segment_ids_are_sequential_across_blocks() {
        let doc = parse("<div><p>One. Two.</p><p>Three.</p></div>").unwrap();
        let segmented = Segmenter::for_language("en").segment(&doc).unwrap();
        let ids: Vec<usize> = segmented.segments().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(segmented.segments().iter().all(|s| s.language == "en"));
    }

    #[test]
    fn test_source_document_is_unchanged() {
        let doc = parse("<p>One. Two.</p>").unwrap();
        let before = doc.clone();
        let segmented = Segmenter::for_language("en").segment(&doc).unwrap();
        assert_eq!(doc, before);
        assert_eq!(segmented.document().len(), doc.len() + 1);
        assert_eq!(segmented.document().to_markup().unwrap(), doc.to_markup().unwrap());
    }

    #[test]
    fn test_unbalanced_block_is_a_segmentation_error() {
        let b = Tag::new("b", Classification::Inline);
        let p = Tag::new("p", Classification::Block);
        let p_id = p.id;
        let doc = Document::from_items(vec![
            Item::Open(p),
            Item::Open(b),
            Item::text("Open. Never closed."),
            Item::Close(p_id),
        ]);
        let result = Segmenter::for_language("en").segment(&doc);
        assert!(matches!(result, Err(DocError::Segmentation(_))));
    }

    // ========== Rendering ==========

    #[test]
    fn test_render_wraps_segments() {
        let doc = parse("<p>One <b>two</b>. Three.</p>").unwrap();
        let segmented = Segmenter::for_language("en").segment(&doc).unwrap();
        assert_eq!(
            segmented.render().unwrap(),
            "<p><span class=\"cx-segment\" data-segmentid=\"0\">One <b>two</b>. </span>\
             <span class=\"cx-segment\" data-segmentid=\"1\">Three.</span></p>"
        );
    }

    // ========== Other Scripts ==========

    #[test]
    fn test_chinese_without_spaces() {
        assert_eq!(
            sentences("<p>我喜欢猫。它们很可爱！你呢？</p>", "zh"),
            vec!["我喜欢猫。", "它们很可爱！", "你呢？"]
        );
    }

    #[test]
    fn test_japanese_closing_bracket() {
        assert_eq!(
            sentences("<p>彼は「はい。」と言った。次の文です。</p>", "ja"),
            vec!["彼は「はい。」と言った。", "次の文です。"]
        );
    }

    #[test]
    fn test_hindi_danda() {
        assert_eq!(
            sentences("<p>यह पहला वाक्य है। यह दूसरा है।</p>", "hi"),
            vec!["यह पहला वाक्य है। ", "यह दूसरा है।"]
        );
    }

    #[test]
    fn test_armenian_full_stop() {
        assert_eq!(
            sentences("<p>Սա առաջինն է։ Սա երկրորդն է։</p>", "hy"),
            vec!["Սա առաջինն է։ ", "Սա երկրորդն է։"]
        );
    }

    #[test]
    fn test_amharic_full_stop() {
        assert_eq!(
            sentences("<p>ይህ የመጀመሪያው ነው። ይህ ሁለተኛው ነው።</p>", "am"),
            vec!["ይህ የመጀመሪያው ነው። ", "ይህ ሁለተኛው ነው።"]
        );
    }

    // ========== Properties ==========

    fn inline_body() -> impl Strategy<Value = String> {
        let leaf = "[A-Za-z .!?&<>\"]{0,16}".prop_map(|text| escape_text(&text));
        leaf.prop_recursive(3, 24, 3, |inner| {
            (
                prop::sample::select(vec!["b", "i", "a"]),
                prop::option::of("[A-Za-z .&<>\"]{0,8}"),
                prop::collection::vec(inner, 0..3),
            )
                .prop_map(|(name, title, children)| match title {
                    Some(title) => format!(
                        "<{0} title=\"{1}\">{2}</{0}>",
                        name,
                        escape_attribute(&title),
                        children.concat()
                    ),
                    None => format!("<{0}>{1}</{0}>", name, children.concat()),
                })
        })
    }

    proptest! {
        #[test]
        fn prop_boundaries_never_inside_tags(body in prop::collection::vec(inline_body(), 1..5)) {
            let markup = format!("<p>{}</p>", body.concat());
            let doc = parse(&markup).unwrap();
            let segmented = Segmenter::for_language("en").segment(&doc).unwrap();
            let items = segmented.document().items();
            let mut depth_at = Vec::with_capacity(items.len() + 1);
            let mut depth = 0i32;
            for item in items {
                depth_at.push(depth);
                match item {
                    Item::Open(_) => depth += 1,
                    Item::Close(_) => depth -= 1,
                    _ => {}
                }
            }
            depth_at.push(depth);
            for segment in segmented.segments() {
                // Depth 1 is the paragraph itself.
                prop_assert_eq!(depth_at[segment.start], 1);
                prop_assert_eq!(depth_at[segment.end], 1);
            }
            prop_assert_eq!(segmented.document().to_markup().unwrap(), markup);
        }
    }
}

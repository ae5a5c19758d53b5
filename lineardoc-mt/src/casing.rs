//! Case normalisation around the engine
//!
//! Engines translate all-caps text poorly, so long upper-case words are
//! lowercased before sending and re-cased afterwards:
//!
//! ```ignore
//! Source:   A JAPANESE BBC article
//! Sent:     a japanese BBC article      (+ word line "japanese")
//! Engine:   Un artículo de BBC japonés  (+ "japonés")
//! Result:   Un artículo de BBC JAPONÉS
//! ```
//!
//! Short all-caps words are taken for acronyms and left alone. A title-case
//! first word is lowercased and the first word of the translation is
//! capitalised in its place.

use crate::matcher::{SubsequenceMatcher, word_ranges};
use std::ops::Range;

/// Letter case of one word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasingPattern {
    /// Every letter upper case: `JAPANESE`
    Upper,
    /// First letter upper case, the rest lower case: `Japanese`. A lone capital is title case.
    Title,
    /// No upper-case letter
    Lower,
    Mixed,
}

impl CasingPattern {
    pub fn of(word: &str) -> Self {
        let cased: Vec<char> = word
            .chars()
            .filter(|c| c.is_uppercase() || c.is_lowercase())
            .collect();
        let upper = cased.iter().filter(|c| c.is_uppercase()).count();

        match cased.first() {
            _ if upper == 0 => CasingPattern::Lower,
            Some(first) if first.is_uppercase() && upper == 1 => CasingPattern::Title,
            _ if upper == cased.len() => CasingPattern::Upper,
            _ => CasingPattern::Mixed,
        }
    }

    pub fn apply(self, word: &str) -> String {
        match self {
            CasingPattern::Upper => word.to_uppercase(),
            CasingPattern::Title => {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
            CasingPattern::Lower | CasingPattern::Mixed => word.to_string(),
        }
    }
}

/// An upper-case word lowercased before sending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpperWord {
    /// The lowercased form, sent on its own word line
    pub lowered: String,
    /// Position of the word among the words of the line
    pub index: usize,
}

/// Casing removed from one line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CasingRecord {
    /// The first word of the line was title case
    pub title: bool,
    pub upper: Vec<UpperWord>,
    /// Number of words in the line
    pub word_count: usize,
}

/// Lowercases the text pieces of one line in order, recording what it changed
#[derive(Debug, Clone)]
pub struct CaseNormalizer {
    acronym_max_len: usize,
    record: CasingRecord,
}

impl CaseNormalizer {
    pub fn new(acronym_max_len: usize) -> Self {
        CaseNormalizer {
            acronym_max_len,
            record: CasingRecord::default(),
        }
    }

    /// Normalise the next piece of text of the line.
    pub fn normalize(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for range in word_ranges(text) {
            out.push_str(&text[last..range.start]);
            let word = &text[range.clone()];
            let first = self.record.word_count == 0;
            let letters = word.chars().filter(|c| c.is_alphabetic()).count();

            match CasingPattern::of(word) {
                CasingPattern::Title if first => {
                    self.record.title = true;
                    out.push_str(&word.to_lowercase());
                }
                CasingPattern::Upper if letters > self.acronym_max_len => {
                    let lowered = word.to_lowercase();
                    out.push_str(&lowered);
                    self.record.upper.push(UpperWord {
                        lowered,
                        index: self.record.word_count,
                    });
                }
                _ => out.push_str(word),
            }
            self.record.word_count += 1;
            last = range.end;
        }
        out.push_str(&text[last..]);
        out
    }

    pub fn finish(self) -> CasingRecord {
        self.record
    }
}

/// Result of putting the recorded casing back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recasing {
    /// Byte ranges of the translated text to upper-case
    pub ranges: Vec<Range<usize>>,
    /// Upper-case words that could not be placed
    pub unaligned: Vec<String>,
}

/// Find where the recorded casing goes in a translated text.
///
/// # Arguments
///
/// * `text` - The translated line, tokens already removed
/// * `record` - Casing removed from the source line
/// * `translations` - Engine output for each word line, same order as `record.upper`
/// * `max_distance` - Fuzzy match tolerance
///
/// An upper-case word is placed at the word found for its translation, or at
/// the same word position when both lines have the same number of words.
pub fn recase(text: &str, record: &CasingRecord, translations: &[String], max_distance: usize) -> Recasing {
    let mut recasing = Recasing::default();
    let words = word_ranges(text);

    if record.title {
        if let Some(first) = words.first() {
            if let Some(c) = text[first.clone()].chars().next() {
                recasing.ranges.push(first.start..first.start + c.len_utf8());
            }
        }
    }

    let mut matcher = SubsequenceMatcher::new(text, max_distance);
    for (upper, translation) in record.upper.iter().zip(translations) {
        let located = matcher.locate(translation).or_else(|| {
            (words.len() == record.word_count)
                .then(|| words.get(upper.index).cloned())
                .flatten()
                .filter(|range| matcher.is_free(range))
        });
        match located {
            Some(range) => recasing.ranges.push(range),
            None => recasing.unaligned.push(upper.lowered.to_uppercase()),
        }
    }
    recasing
}

/// Upper-case the parts of `text` covered by `ranges`, where `text` starts at
/// byte `offset` of the line the ranges refer to.
pub fn uppercase_ranges(text: &str, offset: usize, ranges: &[Range<usize>]) -> String {
    if ranges.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    for (index, c) in text.char_indices() {
        let position = offset + index;
        if ranges.iter().any(|range| range.contains(&position)) {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_detection() {
        assert_eq!(CasingPattern::of("JAPANESE"), CasingPattern::Upper);
        assert_eq!(CasingPattern::of("BBC"), CasingPattern::Upper);
        assert_eq!(CasingPattern::of("Japanese"), CasingPattern::Title);
        assert_eq!(CasingPattern::of("A"), CasingPattern::Title);
        assert_eq!(CasingPattern::of("article"), CasingPattern::Lower);
        assert_eq!(CasingPattern::of("2024"), CasingPattern::Lower);
        assert_eq!(CasingPattern::of("iPhone"), CasingPattern::Mixed);
        assert_eq!(CasingPattern::of("McDonald"), CasingPattern::Mixed);
    }

    #[test]
    fn test_pattern_apply() {
        assert_eq!(CasingPattern::Upper.apply("japonés"), "JAPONÉS");
        assert_eq!(CasingPattern::Title.apply("él"), "Él");
        assert_eq!(CasingPattern::Mixed.apply("iPhone"), "iPhone");
    }

    #[test]
    fn test_normalize_line() {
        let mut normalizer = CaseNormalizer::new(3);
        let text = normalizer.normalize("A JAPANESE BBC article");
        assert_eq!(text, "a japanese BBC article");
        let record = normalizer.finish();
        assert!(record.title);
        assert_eq!(
            record.upper,
            vec![UpperWord { lowered: "japanese".to_string(), index: 1 }]
        );
        assert_eq!(record.word_count, 4);
    }

    #[test]
    fn test_normalize_across_pieces() {
        let mut normalizer = CaseNormalizer::new(3);
        assert_eq!(normalizer.normalize("The "), "the ");
        // Only the first word of the line counts as title case.
        assert_eq!(normalizer.normalize("Big DOGS"), "Big dogs");
        let record = normalizer.finish();
        assert_eq!(record.upper[0].index, 2);
    }

    #[test]
    fn test_recase_by_word_translation() {
        let record = CasingRecord {
            title: true,
            upper: vec![UpperWord { lowered: "japanese".to_string(), index: 1 }],
            word_count: 4,
        };
        let text = "un artículo de BBC japonés";
        let recasing = recase(text, &record, &["japonés".to_string()], 2);
        assert!(recasing.unaligned.is_empty());
        assert_eq!(
            uppercase_ranges(text, 0, &recasing.ranges),
            "Un artículo de BBC JAPONÉS"
        );
    }

    #[test]
    fn test_recase_falls_back_to_position() {
        let record = CasingRecord {
            title: false,
            upper: vec![UpperWord { lowered: "stop".to_string(), index: 0 }],
            word_count: 2,
        };
        let recasing = recase("halt jetzt", &record, &["anhalten".to_string()], 2);
        assert_eq!(recasing.ranges, vec![0..4]);
    }

    #[test]
    fn test_recase_reports_unaligned_word() {
        let record = CasingRecord {
            title: false,
            upper: vec![UpperWord { lowered: "stop".to_string(), index: 0 }],
            word_count: 2,
        };
        let recasing = recase("bitte sofort halten", &record, &["anhalten".to_string()], 2);
        assert!(recasing.ranges.is_empty());
        assert_eq!(recasing.unaligned, vec!["STOP".to_string()]);
    }

    #[test]
    fn test_uppercase_ranges_with_offset() {
        assert_eq!(uppercase_ranges("perro", 10, &[10..11]), "Perro");
        assert_eq!(uppercase_ranges("perro", 10, &[0..5]), "perro");
    }
}

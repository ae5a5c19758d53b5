//! Locating translated fragments inside a translated line
//!
//! When an engine drops sentinel tokens, each tagged fragment of the source is
//! translated on its own line and looked up in the full translation. Lookup is
//! case-insensitive and never returns a range overlapping one handed out
//! before, so repeated fragments land on successive occurrences.
//!
//! ```ignore
//! let mut matcher = SubsequenceMatcher::new("El perro rojo grande", 2);
//! assert_eq!(matcher.locate("grande"), Some(14..20));
//! assert_eq!(matcher.locate("rojos"), Some(9..13)); // fuzzy
//! ```

use std::ops::Range;

/// Characters that make up words: anything but whitespace and punctuation.
pub fn is_word_char(c: char) -> bool {
    !c.is_whitespace()
        && !c.is_ascii_punctuation()
        && !matches!(
            c,
            '\u{2000}'..='\u{206F}'
                | '\u{3000}'..='\u{303F}'
                | '\u{FF01}'..='\u{FF0F}'
                | '\u{FF1A}'..='\u{FF20}'
                | '¡' | '¿' | '«' | '»' | '·' | '।' | '॥' | '։' | '።' | '፧' | '⟦' | '⟧'
        )
}

pub fn has_word(text: &str) -> bool {
    text.chars().any(is_word_char)
}

/// Byte ranges of the words of `text`, in order
pub fn word_ranges(text: &str) -> Vec<Range<usize>> {
    let mut words = Vec::new();
    let mut start = None;
    for (index, c) in text.char_indices() {
        match (is_word_char(c), start) {
            (true, None) => start = Some(index),
            (false, Some(begin)) => {
                words.push(begin..index);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(begin) = start {
        words.push(begin..text.len());
    }
    words
}

/// Edit distance between two strings, counted in characters
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut prev_row: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr_row: Vec<usize> = vec![0; b_chars.len() + 1];

    for i in 1..=a_chars.len() {
        curr_row[0] = i;
        for j in 1..=b_chars.len() {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            curr_row[j] = (prev_row[j] + 1)
                .min(curr_row[j - 1] + 1)
                .min(prev_row[j - 1] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }
    prev_row[b_chars.len()]
}

/// Whether `target` is close enough to `source` to be the same word.
///
/// Both are compared lowercased. Apart from exact matches, the distance must
/// be at most `max_distance`, the target must be longer than the distance
/// plus two characters, and both must start with the same character.
pub fn approx_eq(source: &str, target: &str, max_distance: usize) -> bool {
    let source = source.to_lowercase();
    let target = target.to_lowercase();
    if source == target {
        return true;
    }
    if source.chars().next() != target.chars().next() {
        return false;
    }
    let distance = levenshtein(&source, &target);
    distance <= max_distance && target.chars().count() > distance + 2
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Occurrence-aware, case-insensitive search over one translated line
#[derive(Debug, Clone)]
pub struct SubsequenceMatcher<'a> {
    text: &'a str,
    words: Vec<Range<usize>>,
    claimed: Vec<Range<usize>>,
    max_distance: usize,
}

impl<'a> SubsequenceMatcher<'a> {
    pub fn new(text: &'a str, max_distance: usize) -> Self {
        SubsequenceMatcher {
            text,
            words: word_ranges(text),
            claimed: Vec::new(),
            max_distance,
        }
    }

    /// Find `needle` and claim the range it occupies.
    ///
    /// The exact text is tried first, preferring whole-word occurrences.
    /// Otherwise the longest run of consecutive words approximately equal to
    /// consecutive words of `needle` is taken, so a partial match is accepted.
    ///
    /// # Returns
    ///
    /// `None` when neither search finds an unclaimed range.
    pub fn locate(&mut self, needle: &str) -> Option<Range<usize>> {
        let needle = needle.trim();
        if needle.is_empty() {
            return None;
        }
        let found = self.exact(needle).or_else(|| self.fuzzy(needle))?;
        self.claimed.push(found.clone());
        Some(found)
    }

    /// Whether `range` overlaps nothing claimed so far
    pub fn is_free(&self, range: &Range<usize>) -> bool {
        !self
            .claimed
            .iter()
            .any(|claimed| claimed.start < range.end && range.start < claimed.end)
    }

    fn exact(&self, needle: &str) -> Option<Range<usize>> {
        let mut first_free = None;
        for (start, _) in self.text.char_indices() {
            let Some(end) = self.match_at(start, needle) else {
                continue;
            };
            let range = start..end;
            if !self.is_free(&range) {
                continue;
            }
            if self.is_whole_word(&range) {
                return Some(range);
            }
            first_free.get_or_insert(range);
        }
        first_free
    }

    fn fuzzy(&self, needle: &str) -> Option<Range<usize>> {
        let needle_words: Vec<&str> = word_ranges(needle)
            .into_iter()
            .map(|range| &needle[range])
            .collect();
        let mut best: Option<(usize, usize)> = None;

        for t in 0..self.words.len() {
            for n in 0..needle_words.len() {
                let mut length = 0;
                while t + length < self.words.len()
                    && n + length < needle_words.len()
                    && self.is_free(&self.words[t + length])
                    && approx_eq(
                        needle_words[n + length],
                        &self.text[self.words[t + length].clone()],
                        self.max_distance,
                    )
                {
                    length += 1;
                }
                if length > best.map_or(0, |(_, best_length)| best_length) {
                    best = Some((t, length));
                }
            }
        }

        let (start, length) = best?;
        Some(self.words[start].start..self.words[start + length - 1].end)
    }

    fn match_at(&self, start: usize, needle: &str) -> Option<usize> {
        let mut haystack = self.text[start..].char_indices();
        let mut end = start;
        for expected in needle.chars() {
            let (offset, found) = haystack.next()?;
            if !chars_eq_ignore_case(found, expected) {
                return None;
            }
            end = start + offset + found.len_utf8();
        }
        Some(end)
    }

    fn is_whole_word(&self, range: &Range<usize>) -> bool {
        let before = self.text[..range.start].chars().next_back();
        let after = self.text[range.end..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("moderno", "moderna"), 1);
        assert_eq!(levenshtein("baños", "banos"), 1);
    }

    #[test]
    fn test_approx_eq_rules() {
        assert!(approx_eq("moderno", "Moderna", 2));
        assert!(approx_eq("gato", "gata", 2));
        // Within distance, but the target is too short to trust.
        assert!(!approx_eq("sol", "sal", 2));
        assert!(!approx_eq("son", "sin", 2));
        // First characters differ.
        assert!(!approx_eq("perro", "berro", 2));
        assert!(!approx_eq("japanese", "japonés", 2));
    }

    #[test]
    fn test_word_ranges() {
        let text = "Diga que \"enladrillo baños.\"";
        let words: Vec<&str> = word_ranges(text).into_iter().map(|r| &text[r]).collect();
        assert_eq!(words, vec!["Diga", "que", "enladrillo", "baños"]);
    }

    #[test]
    fn test_word_ranges_keep_combining_marks() {
        let text = "हिन्दी भाषा।";
        let words: Vec<&str> = word_ranges(text).into_iter().map(|r| &text[r]).collect();
        assert_eq!(words, vec!["हिन्दी", "भाषा"]);
    }

    #[test]
    fn test_has_word() {
        assert!(has_word(" a "));
        assert!(!has_word(" .\"— "));
        assert!(has_word("猫"));
    }

    #[test]
    fn test_locate_exact_ignores_case() {
        let mut matcher = SubsequenceMatcher::new("Un artículo de BBC japonés", 2);
        assert_eq!(matcher.locate("JAPONÉS"), Some(20..28));
    }

    #[test]
    fn test_locate_prefers_whole_words() {
        let mut matcher = SubsequenceMatcher::new("rojos y rojo", 2);
        assert_eq!(matcher.locate("rojo"), Some(8..12));
        // The remaining occurrence is inside a longer word.
        assert_eq!(matcher.locate("rojo"), Some(0..4));
    }

    #[test]
    fn test_locate_claims_successive_occurrences() {
        let mut matcher = SubsequenceMatcher::new("el gato y el gato", 2);
        assert_eq!(matcher.locate("gato"), Some(3..7));
        assert_eq!(matcher.locate("gato"), Some(13..17));
        assert_eq!(matcher.locate("gato"), None);
    }

    #[test]
    fn test_locate_fuzzy_single_word() {
        let mut matcher = SubsequenceMatcher::new("Ciudad moderna", 2);
        assert_eq!(matcher.locate("moderno"), Some(7..14));
    }

    #[test]
    fn test_locate_fuzzy_longest_run_wins() {
        let mut matcher = SubsequenceMatcher::new("la casa blanca grande", 2);
        assert_eq!(matcher.locate("casas blancas"), Some(3..14));
    }

    #[test]
    fn test_locate_partial_match() {
        let mut matcher = SubsequenceMatcher::new("el perro duerme", 2);
        assert_eq!(matcher.locate("perros felices"), Some(3..8));
    }

    #[test]
    fn test_locate_nothing() {
        let mut matcher = SubsequenceMatcher::new("el perro", 2);
        assert_eq!(matcher.locate("gato"), None);
        assert_eq!(matcher.locate("   "), None);
    }
}

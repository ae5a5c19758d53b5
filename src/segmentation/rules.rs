//! Per-language sentence boundary rules
//!
//! Every rule feeds the same boundary state machine; languages differ only in
//! which characters end a sentence, which characters may start the next one,
//! and whether whitespace must follow the terminator.

use icu_locale::Locale;
use tracing::warn;

/// Sentence boundary parameters for one script or language family
#[derive(Debug, Clone, Copy)]
pub struct LanguageRule {
    pub name: &'static str,
    /// Characters that end a sentence
    pub terminators: &'static [char],
    /// Closing quotes and brackets kept with the sentence they follow
    pub closers: &'static [char],
    /// Whether a character may start a new sentence
    pub is_word_char: fn(char) -> bool,
    /// Whether a terminator must be followed by whitespace
    pub requires_space: bool,
    /// Reject `.` after one- or two-letter capitalised words such as "Dr" or "J"
    pub abbreviations: bool,
}

impl LanguageRule {
    pub fn is_terminator(&self, c: char) -> bool {
        self.terminators.contains(&c)
    }

    pub fn is_closer(&self, c: char) -> bool {
        self.closers.contains(&c)
    }
}

const LATIN_CLOSERS: &[char] = &['"', '\'', '\u{201d}', '\u{2019}', ')', ']', '\u{bb}'];

const CJK_CLOSERS: &[char] = &[
    '\u{300d}', '\u{300f}', '\u{201d}', '\u{2019}', '\u{ff09}', '\u{3011}', '"', '\'', ')',
];

fn latin_sentence_start(c: char) -> bool {
    c.is_alphabetic() && !c.is_lowercase()
}

fn cjk_sentence_start(c: char) -> bool {
    c.is_alphanumeric()
}

fn indic_sentence_start(c: char) -> bool {
    matches!(c, '\u{0900}'..='\u{097f}' | '\u{0a00}'..='\u{0a7f}') && c.is_alphabetic()
        || latin_sentence_start(c)
}

fn armenian_sentence_start(c: char) -> bool {
    matches!(c, '\u{0531}'..='\u{0587}') || latin_sentence_start(c)
}

fn ethiopic_sentence_start(c: char) -> bool {
    matches!(c, '\u{1200}'..='\u{137f}') && c.is_alphabetic() || latin_sentence_start(c)
}

/// Latin-script default: `.`, `!`, `?` followed by whitespace
pub static DEFAULT: LanguageRule = LanguageRule {
    name: "default",
    terminators: &['.', '!', '?'],
    closers: LATIN_CLOSERS,
    is_word_char: latin_sentence_start,
    requires_space: true,
    abbreviations: true,
};

/// Chinese and Japanese: ideographic full stop, no whitespace between sentences
pub static CJK: LanguageRule = LanguageRule {
    name: "cjk",
    terminators: &['\u{3002}', '\u{ff01}', '\u{ff1f}', '!', '?'],
    closers: CJK_CLOSERS,
    is_word_char: cjk_sentence_start,
    requires_space: false,
    abbreviations: false,
};

/// Devanagari and Gurmukhi: danda and double danda plus Latin terminators
pub static INDIC: LanguageRule = LanguageRule {
    name: "indic",
    terminators: &['\u{0964}', '\u{0965}', '.', '!', '?'],
    closers: LATIN_CLOSERS,
    is_word_char: indic_sentence_start,
    requires_space: true,
    abbreviations: false,
};

/// Armenian full stop, and the ASCII colon commonly typed in its place
pub static ARMENIAN: LanguageRule = LanguageRule {
    name: "armenian",
    terminators: &['\u{0589}', ':'],
    closers: LATIN_CLOSERS,
    is_word_char: armenian_sentence_start,
    requires_space: true,
    abbreviations: false,
};

/// Ethiopic full stop and question mark
pub static ETHIOPIC: LanguageRule = LanguageRule {
    name: "ethiopic",
    terminators: &['\u{1362}', '\u{1367}', '!', '?'],
    closers: LATIN_CLOSERS,
    is_word_char: ethiopic_sentence_start,
    requires_space: true,
    abbreviations: false,
};

static REGISTRY: &[(&str, &LanguageRule)] = &[
    ("am", &ETHIOPIC),
    ("hi", &INDIC),
    ("hy", &ARMENIAN),
    ("ja", &CJK),
    ("mr", &INDIC),
    ("ne", &INDIC),
    ("pa", &INDIC),
    ("sa", &INDIC),
    ("ti", &ETHIOPIC),
    ("zh", &CJK),
];

/// Look up the rule for a BCP 47 language tag.
///
/// Only the primary language subtag matters: `zh-Hant-TW` uses the Chinese
/// rule. Unknown languages, and tags that do not parse, get [`DEFAULT`].
pub fn for_language(language: &str) -> &'static LanguageRule {
    let normalized = language.replace('_', "-");
    let locale: Locale = match normalized.parse() {
        Ok(locale) => locale,
        Err(e) => {
            warn!("Invalid language tag '{}' ({}), using default sentence rules", language, e);
            return &DEFAULT;
        }
    };
    let primary = locale.id.language.as_str();
    REGISTRY
        .iter()
        .find(|(code, _)| *code == primary)
        .map(|(_, rule)| *rule)
        .unwrap_or(&DEFAULT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        assert_eq!(for_language("en").name, "default");
        assert_eq!(for_language("zh").name, "cjk");
        assert_eq!(for_language("ja").name, "cjk");
        assert_eq!(for_language("hi").name, "indic");
        assert_eq!(for_language("sa").name, "indic");
        assert_eq!(for_language("pa").name, "indic");
        assert_eq!(for_language("hy").name, "armenian");
        assert_eq!(for_language("am").name, "ethiopic");
        assert_eq!(for_language("ti").name, "ethiopic");
    }

    #[test]
    fn test_registry_uses_primary_subtag() {
        assert_eq!(for_language("zh-Hant-TW").name, "cjk");
        assert_eq!(for_language("hi_IN").name, "indic");
        assert_eq!(for_language("EN-us").name, "default");
    }

    #[test]
    fn test_registry_falls_back_to_default() {
        assert_eq!(for_language("fr").name, "default");
        assert_eq!(for_language("not a tag!").name, "default");
        assert_eq!(for_language("").name, "default");
    }

    #[test]
    fn test_sentence_start_predicates() {
        assert!((DEFAULT.is_word_char)('T'));
        assert!((DEFAULT.is_word_char)('É'));
        assert!(!(DEFAULT.is_word_char)('t'));
        assert!(!(DEFAULT.is_word_char)('4'));
        assert!((CJK.is_word_char)('今'));
        assert!((CJK.is_word_char)('カ'));
        assert!((INDIC.is_word_char)('य'));
        assert!((INDIC.is_word_char)('ਪ'));
        assert!(!(INDIC.is_word_char)('\u{0964}'));
        assert!((ARMENIAN.is_word_char)('Ա'));
        assert!((ETHIOPIC.is_word_char)('ሰ'));
    }
}

//! A deterministic engine for tests and the CLI
//!
//! [`MockTranslator`] never touches the network. Its modes cover what the
//! reconstruction code has to cope with from a real engine: tokens kept,
//! tokens lost, words reordered, and outright failure.
//!
//! ```ignore
//! use lineardoc_mt::{MachineTranslator, MockTranslator};
//!
//! let mock = MockTranslator::from_pairs("es", [("The big dog", "El perro grande")]);
//! // Sentinels are stripped before the phrase is looked up, and not put back.
//! assert_eq!(mock.translate("the ⟦1⟧big⟦/1⟧ dog", "en", "es").await?, "El perro grande");
//! ```

use crate::error::{MtError, MtResult};
use crate::sentinel::strip_sentinels;
use crate::translator::MachineTranslator;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Fixed translations, keyed by target language
#[derive(Debug, Clone, Default)]
pub struct Phrasebook {
    entries: HashMap<String, HashMap<String, String>>,
}

impl Phrasebook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, target: &str, source: impl Into<String>, translation: impl Into<String>) {
        self.entries
            .entry(target.to_string())
            .or_default()
            .insert(source.into(), translation.into());
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the translation of `line` into `target`.
    ///
    /// The line is tried as sent, then without sentinel tokens or outer
    /// whitespace, then ignoring case. A phrase found without its tokens is
    /// returned without them.
    pub fn lookup(&self, line: &str, target: &str) -> Option<&str> {
        let phrases = self.entries.get(target)?;
        if let Some(found) = phrases.get(line) {
            return Some(found.as_str());
        }
        let (plain, _) = strip_sentinels(line);
        let plain = plain.trim();
        if let Some(found) = phrases.get(plain) {
            return Some(found.as_str());
        }
        let folded = plain.to_lowercase();
        phrases
            .iter()
            .find(|(source, _)| source.to_lowercase() == folded)
            .map(|(_, translation)| translation.as_str())
    }
}

/// What the mock does with each line
#[derive(Debug, Clone)]
pub enum MockMode {
    /// `line` becomes `line_<target>`, tokens included
    Suffix,
    /// Phrasebook lookup, falling back to [`MockMode::Suffix`] for unknown lines
    Mappings(Phrasebook),
    /// Reverse the whitespace-separated words, the way an SOV target moves them
    Reorder,
    /// Fail every batch with this message
    Error(String),
    /// Echo every line
    NoOp,
}

#[derive(Debug, Clone)]
pub struct MockTranslator {
    mode: MockMode,
    delay: Duration,
}

impl MockTranslator {
    pub fn new(mode: MockMode) -> Self {
        MockTranslator {
            mode,
            delay: Duration::ZERO,
        }
    }

    /// Wait `delay_ms` before answering each batch
    pub fn with_delay(mode: MockMode, delay_ms: u64) -> Self {
        MockTranslator {
            mode,
            delay: Duration::from_millis(delay_ms),
        }
    }

    /// A [`MockMode::Mappings`] engine translating into `target`
    pub fn from_pairs<I, S, T>(target: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        let mut book = Phrasebook::new();
        for (source, translation) in pairs {
            book.insert(target, source, translation);
        }
        Self::new(MockMode::Mappings(book))
    }

    fn line(&self, line: &str, target: &str) -> String {
        match &self.mode {
            MockMode::Mappings(book) => match book.lookup(line, target) {
                Some(found) => found.to_string(),
                None => format!("{}_{}", line, target),
            },
            MockMode::Reorder => line.split_whitespace().rev().collect::<Vec<_>>().join(" "),
            MockMode::NoOp => line.to_string(),
            MockMode::Suffix | MockMode::Error(_) => format!("{}_{}", line, target),
        }
    }
}

#[async_trait]
impl MachineTranslator for MockTranslator {
    async fn translate_batch(&self, lines: &[String], _source: &str, target: &str) -> MtResult<Vec<String>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let MockMode::Error(message) = &self.mode {
            return Err(MtError::TranslationBackend(message.clone()));
        }
        Ok(lines.iter().map(|line| self.line(line, target)).collect())
    }

    fn provider_name(&self) -> &str {
        "Mock Translator"
    }
}

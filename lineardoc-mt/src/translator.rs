//! The engine boundary
//!
//! [`MachineTranslator`] is all the wrapper knows about an engine: a batch of
//! plain-text lines goes in, the same number of lines comes out. Provider
//! clients live outside this crate. Tests and the CLI use
//! [`MockTranslator`](crate::MockTranslator), and any function with the right
//! shape can be wrapped in a [`FnTranslator`].
//!
//! ```ignore
//! use lineardoc_mt::{FnTranslator, MachineTranslator};
//!
//! let shout = FnTranslator::new("shout", |lines: &[String], _: &str, _: &str| {
//!     Ok(lines.iter().map(|line| line.to_uppercase()).collect())
//! });
//! assert_eq!(shout.translate("hello", "en", "en").await?, "HELLO");
//! ```

use crate::error::{MtError, MtResult};
use async_trait::async_trait;
use icu_locale::Locale;

/// A plain-text translation engine
#[async_trait]
pub trait MachineTranslator: Send + Sync {
    /// Translate `lines` from `source_locale` to `target_locale` in one call.
    ///
    /// Lines carry sentinel tokens such as `⟦1⟧` that engines are expected to
    /// leave alone, though nothing depends on it.
    ///
    /// # Returns
    ///
    /// One translated line per input line, in input order. The wrapper rejects
    /// any other count as [`MtError::TranslationBackend`].
    async fn translate_batch(
        &self,
        lines: &[String],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<Vec<String>>;

    /// Translate one line through [`MachineTranslator::translate_batch`]
    async fn translate(&self, text: &str, source_locale: &str, target_locale: &str) -> MtResult<String> {
        let lines = [text.to_string()];
        self.translate_batch(&lines, source_locale, target_locale)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MtError::TranslationBackend(format!("{} returned no lines", self.provider_name())))
    }

    /// Engine name for logs and error messages
    fn provider_name(&self) -> &str;
}

/// An engine backed by a plain function of `(lines, source, target)`
pub struct FnTranslator<F> {
    name: String,
    translate: F,
}

impl<F> FnTranslator<F>
where
    F: Fn(&[String], &str, &str) -> MtResult<Vec<String>> + Send + Sync,
{
    pub fn new(name: impl Into<String>, translate: F) -> Self {
        FnTranslator {
            name: name.into(),
            translate,
        }
    }
}

#[async_trait]
impl<F> MachineTranslator for FnTranslator<F>
where
    F: Fn(&[String], &str, &str) -> MtResult<Vec<String>> + Send + Sync,
{
    async fn translate_batch(&self, lines: &[String], source: &str, target: &str) -> MtResult<Vec<String>> {
        (self.translate)(lines, source, target)
    }

    fn provider_name(&self) -> &str {
        &self.name
    }
}

/// Check that `locale` is a BCP 47 language tag. Underscores are read as hyphens.
///
/// # Errors
///
/// [`MtError::InvalidLocale`] naming the tag and what is wrong with it.
pub fn validate_locale(locale: &str) -> MtResult<()> {
    if locale.trim().is_empty() {
        return Err(MtError::InvalidLocale("empty language tag".to_string()));
    }
    locale
        .replace('_', "-")
        .parse::<Locale>()
        .map(|_| ())
        .map_err(|e| MtError::InvalidLocale(format!("'{}' is not a language tag: {}", locale, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locales_accepted() {
        for locale in ["en", "en-US", "zh-Hans", "de_DE", "sr-Latn-RS"] {
            assert!(validate_locale(locale).is_ok(), "{} should be accepted", locale);
        }
    }

    #[test]
    fn test_locales_rejected() {
        for locale in ["", "  ", "e s", "en@US", "-en", "es!"] {
            assert!(
                matches!(validate_locale(locale), Err(MtError::InvalidLocale(_))),
                "{:?} should be rejected",
                locale
            );
        }
    }

    #[test]
    fn test_rejection_names_the_tag() {
        match validate_locale("en@US") {
            Err(MtError::InvalidLocale(msg)) => assert!(msg.contains("'en@US'")),
            other => panic!("Expected InvalidLocale error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fn_translator_passes_locales() {
        let tagger = FnTranslator::new("tagger", |lines: &[String], source: &str, target: &str| {
            Ok(lines.iter().map(|l| format!("[{}>{}] {}", source, target, l)).collect())
        });
        let lines = vec!["uno".to_string(), "dos".to_string()];
        let result = tagger.translate_batch(&lines, "es", "en").await.unwrap();
        assert_eq!(result, vec!["[es>en] uno", "[es>en] dos"]);
        assert_eq!(tagger.provider_name(), "tagger");
    }

    #[tokio::test]
    async fn test_single_line_goes_through_batch() {
        let reverse = FnTranslator::new("reverse", |lines: &[String], _: &str, _: &str| {
            Ok(lines.iter().map(|l| l.chars().rev().collect()).collect())
        });
        assert_eq!(reverse.translate("⟦1⟧abc", "en", "es").await.unwrap(), "cba⟧1⟦");
    }

    #[tokio::test]
    async fn test_single_line_without_response() {
        let silent = FnTranslator::new("silent", |_: &[String], _: &str, _: &str| Ok(Vec::new()));
        match silent.translate("hola", "es", "en").await {
            Err(MtError::TranslationBackend(msg)) => assert_eq!(msg, "silent returned no lines"),
            other => panic!("Expected TranslationBackend error, got {:?}", other),
        }
    }
}

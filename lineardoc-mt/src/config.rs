//! Configuration loaded from TOML
//!
//! ```toml
//! [parser]
//! max_input_bytes = 2097152
//!
//! [translation]
//! concurrency = 8
//! acronym_max_len = 3
//! fuzzy_max_distance = 2
//! ```
//!
//! Every key is optional; unknown keys are rejected.

use crate::error::{MtError, MtResult};
use lineardoc::ParseOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tuning for the reconstruction wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranslationOptions {
    /// Units of one document translated at the same time
    pub concurrency: usize,
    /// All-caps words up to this many letters are treated as acronyms and left alone
    pub acronym_max_len: usize,
    /// Largest edit distance at which two words still count as the same word
    pub fuzzy_max_distance: usize,
}

impl Default for TranslationOptions {
    fn default() -> Self {
        TranslationOptions {
            concurrency: 4,
            acronym_max_len: 3,
            fuzzy_max_distance: 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinearDocConfig {
    pub parser: ParseOptions,
    pub translation: TranslationOptions,
}

impl LinearDocConfig {
    /// Parse a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// [`MtError::Config`] for malformed TOML, unknown keys, or a concurrency of zero.
    pub fn from_toml_str(source: &str) -> MtResult<Self> {
        let config: LinearDocConfig =
            toml::from_str(source).map_err(|e| MtError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> MtResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| MtError::Config(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    fn validate(&self) -> MtResult<()> {
        if self.translation.concurrency == 0 {
            return Err(MtError::Config(
                "translation.concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LinearDocConfig::default();
        assert_eq!(config.parser.max_input_bytes, 1024 * 1024);
        assert_eq!(config.translation.concurrency, 4);
        assert_eq!(config.translation.acronym_max_len, 3);
        assert_eq!(config.translation.fuzzy_max_distance, 2);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        assert_eq!(LinearDocConfig::from_toml_str("").unwrap(), LinearDocConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = LinearDocConfig::from_toml_str(
            "[parser]\nmax_input_bytes = 2048\n\n[translation]\nconcurrency = 8\n",
        )
        .unwrap();
        assert_eq!(config.parser.max_input_bytes, 2048);
        assert_eq!(config.translation.concurrency, 8);
        assert_eq!(config.translation.acronym_max_len, 3);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let result = LinearDocConfig::from_toml_str("[translation]\nretries = 3\n");
        assert!(matches!(result, Err(MtError::Config(_))));
        let result = LinearDocConfig::from_toml_str("[cache]\nsize = 3\n");
        assert!(matches!(result, Err(MtError::Config(_))));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result = LinearDocConfig::from_toml_str("[translation]\nconcurrency = 0\n");
        assert!(matches!(result, Err(MtError::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = LinearDocConfig::load("/nonexistent/lineardoc.toml");
        assert!(matches!(result, Err(MtError::Config(msg)) if msg.contains("Failed to read")));
    }
}

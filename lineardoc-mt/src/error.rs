use lineardoc::DocError;
use thiserror::Error;

/// Error types for machine translation of documents
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MtError {
    /// The source could not be parsed, segmented or serialized
    #[error(transparent)]
    Document(#[from] DocError),

    /// The engine failed or returned a different number of lines than it was given
    #[error("translation backend error: {0}")]
    TranslationBackend(String),

    /// Malformed language code
    #[error("invalid locale: {0}")]
    InvalidLocale(String),

    /// Unreadable or invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for MT operations
pub type MtResult<T> = Result<T, MtError>;

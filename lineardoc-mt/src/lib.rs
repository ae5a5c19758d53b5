//! Machine translation for lineardoc documents
//!
//! This crate sends the sentences of a [`lineardoc::Document`] through a
//! plain-text engine and puts the inline markup back into the translation,
//! even when the engine reorders, merges or drops words.
//!
//! # Workflow Example
//!
//! ```ignore
//! use lineardoc::{MwContextualizer, Segmenter, parse_with};
//! use lineardoc_mt::{MockTranslator, Wrapper};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 1. Parse and segment the fragment
//!     let doc = parse_with("<p>The <b>big</b> <b>red</b> dog</p>", &MwContextualizer)?;
//!     let segmented = Segmenter::for_language("en").segment(&doc)?;
//!
//!     // 2. Pick an engine
//!     let engine = MockTranslator::from_pairs(
//!         "es",
//!         [("The big red dog", "El perro rojo grande"), ("big", "grande"), ("red", "rojo")],
//!     );
//!
//!     // 3. Translate and rebuild
//!     let result = Wrapper::new(&engine, "en", "es").translate_segmented(&segmented).await?;
//!     assert_eq!(result.to_markup()?, "<p>El perro <b>rojo</b> <b>grande</b></p>");
//!     Ok(())
//! }
//! ```

pub mod casing;
pub mod config;
pub mod error;
pub mod flatten;
pub mod matcher;
pub mod mock;
pub mod reconstruct;
pub mod sentinel;
pub mod translator;
pub mod wrapper;


// Re-export main types for convenient access
pub use casing::CasingPattern;
pub use config::{LinearDocConfig, TranslationOptions};
pub use error::{MtError, MtResult};
pub use flatten::Line;
pub use matcher::{SubsequenceMatcher, approx_eq, levenshtein};
pub use mock::{MockMode, MockTranslator, Phrasebook};
pub use reconstruct::ReconstructionAnomaly;
pub use sentinel::{SentinelMap, strip_sentinels};
pub use translator::{FnTranslator, MachineTranslator, validate_locale};
pub use wrapper::{Reconstruction, Wrapper};

//! Linear document model for markup-preserving translation
//!
//! An XHTML fragment is parsed into a flat [`Document`] of text runs and tag
//! markers, cut into sentences by a language-aware [`Segmenter`], and
//! serialized back to markup. The `lineardoc-mt` crate builds translation on
//! top of this model.
//!
//! # Example
//!
//! ```ignore
//! use lineardoc::{MwContextualizer, Segmenter, parse_with};
//!
//! let doc = parse_with(
//!     "<p>Hydrogen is a gas.<sup typeof=\"mw:Extension/ref\">[1]</sup> It is an element.</p>",
//!     &MwContextualizer,
//! )?;
//! let segmented = Segmenter::for_language("en").segment(&doc)?;
//! assert_eq!(segmented.segments().len(), 2);
//! ```

pub mod contextualizer;
pub mod doc;
pub mod error;
pub mod parser;
pub mod segmentation;

pub use contextualizer::{Attributes, Contextualizer, DefaultContextualizer, MwContextualizer};
pub use doc::{BlockRun, Classification, Document, Item, Tag, TagId, escape_attribute, escape_text};
pub use error::{DocError, DocResult};
pub use parser::{ParseOptions, Parser, parse, parse_with};
pub use segmentation::{LanguageRule, Segment, SegmentedDocument, Segmenter, rules};

//! Translating documents through a [`MachineTranslator`]
//!
//! A unit (usually one sentence) is flattened into lines, sent to the engine
//! in a single batch, and rebuilt with its inline markup. Units of one
//! document are translated concurrently and put back in document order.
//!
//! # Example
//!
//! ```ignore
//! use lineardoc::{MwContextualizer, Segmenter, parse_with};
//! use lineardoc_mt::{MockMode, MockTranslator, Wrapper};
//!
//! let doc = parse_with("<p>The <b>big</b> dog.</p>", &MwContextualizer)?;
//! let segmented = Segmenter::for_language("en").segment(&doc)?;
//!
//! let mock = MockTranslator::new(MockMode::NoOp);
//! let wrapper = Wrapper::new(&mock, "en", "es");
//! let result = wrapper.translate_segmented(&segmented).await?;
//! println!("{}", result.to_markup()?);
//! ```

use crate::config::TranslationOptions;
use crate::error::{MtError, MtResult};
use crate::flatten::Line;
use crate::reconstruct::{ReconstructionAnomaly, rebuild_line};
use crate::translator::{MachineTranslator, validate_locale};
use futures::stream::{self, StreamExt};
use lineardoc::{DocError, Document, Item, Segment, SegmentedDocument, TagId};
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use tracing::{debug, info, warn};

/// A translated document and everything that could not be placed exactly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconstruction {
    pub document: Document,
    pub anomalies: Vec<ReconstructionAnomaly>,
}

impl Reconstruction {
    pub fn to_markup(&self) -> MtResult<String> {
        Ok(self.document.to_markup()?)
    }
}

enum Part {
    Copy(Vec<Item>),
    Line(Box<Line>),
}

/// Translates units of a document while keeping their inline markup
pub struct Wrapper<'a> {
    translator: &'a dyn MachineTranslator,
    source: String,
    target: String,
    options: TranslationOptions,
}

impl<'a> Wrapper<'a> {
    pub fn new(translator: &'a dyn MachineTranslator, source: &str, target: &str) -> Self {
        Wrapper {
            translator,
            source: source.to_string(),
            target: target.to_string(),
            options: TranslationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TranslationOptions) -> Self {
        self.options = options;
        self
    }

    /// Translate the items `range` of `doc`.
    ///
    /// Every block run inside the range is one line of a single
    /// `translate_batch` call. Block markers in the range are copied, as are
    /// runs without words.
    ///
    /// # Returns
    ///
    /// A reconstruction holding only the translated items of the range.
    ///
    /// # Errors
    ///
    /// - [`MtError::InvalidLocale`] for malformed language codes
    /// - [`MtError::Document`] if the range is out of bounds or its inline markers do not nest
    /// - [`MtError::TranslationBackend`] if the engine fails or returns the wrong number of lines
    pub async fn translate_unit(&self, doc: &Document, range: Range<usize>) -> MtResult<Reconstruction> {
        self.check_locales()?;
        let block_ids = block_ids(doc);
        let (items, anomalies) = self.unit(doc, range, &block_ids).await?;
        Ok(Reconstruction {
            document: Document::from_items(items),
            anomalies,
        })
    }

    /// Translate every segment of a segmented document.
    ///
    /// `segments` index into `doc`. Items outside them are copied unchanged.
    pub async fn translate_document(&self, doc: &Document, segments: &[Segment]) -> MtResult<Reconstruction> {
        let units: Vec<Range<usize>> = segments.iter().map(Segment::range).collect();
        self.translate_units(doc, units).await
    }

    /// Shorthand for [`Wrapper::translate_document`] on the output of a segmenter
    pub async fn translate_segmented(&self, segmented: &SegmentedDocument) -> MtResult<Reconstruction> {
        self.translate_document(segmented.document(), segmented.segments())
            .await
    }

    /// Translate a document one block run at a time, without segmenting it.
    pub async fn translate_blocks(&self, doc: &Document) -> MtResult<Reconstruction> {
        let units = doc.block_runs().into_iter().map(|run| run.range).collect();
        self.translate_units(doc, units).await
    }

    async fn translate_units(&self, doc: &Document, units: Vec<Range<usize>>) -> MtResult<Reconstruction> {
        self.check_locales()?;
        check_units(doc, &units)?;

        let block_ids = block_ids(doc);
        let block_ids = &block_ids;
        let mut results: Vec<(usize, MtResult<(Vec<Item>, Vec<ReconstructionAnomaly>)>)> =
            stream::iter(units.iter().cloned().enumerate())
                .map(|(index, range)| async move { (index, self.unit(doc, range, block_ids).await) })
                .buffer_unordered(self.options.concurrency.max(1))
                .collect()
                .await;
        // Completion order is arbitrary; the document order is not.
        results.sort_by_key(|(index, _)| *index);

        let mut items = Vec::with_capacity(doc.len());
        let mut anomalies = Vec::new();
        let mut cursor = 0;
        for (range, (_, result)) in units.iter().zip(results) {
            let (translated, unit_anomalies) = result?;
            items.extend_from_slice(&doc.items()[cursor..range.start]);
            items.extend(translated);
            anomalies.extend(unit_anomalies);
            cursor = range.end;
        }
        items.extend_from_slice(&doc.items()[cursor..]);

        info!(
            provider = self.translator.provider_name(),
            source = %self.source,
            target = %self.target,
            units = units.len(),
            anomalies = anomalies.len(),
            "translated document"
        );
        Ok(Reconstruction {
            document: Document::from_items(items),
            anomalies,
        })
    }

    async fn unit(
        &self,
        doc: &Document,
        range: Range<usize>,
        block_ids: &HashSet<TagId>,
    ) -> MtResult<(Vec<Item>, Vec<ReconstructionAnomaly>)> {
        let items = doc.items().get(range.clone()).ok_or_else(|| {
            DocError::Structure(format!("unit {:?} is outside a document of {} items", range, doc.len()))
        })?;

        let mut parts = Vec::new();
        let mut run_start = 0;
        for (index, item) in items.iter().enumerate() {
            let is_block = match item {
                Item::Open(tag) => tag.is_block(),
                Item::Close(id) => block_ids.contains(id),
                _ => false,
            };
            if is_block {
                self.push_run(&items[run_start..index], &mut parts)?;
                parts.push(Part::Copy(vec![item.clone()]));
                run_start = index + 1;
            }
        }
        self.push_run(&items[run_start..], &mut parts)?;

        let requests: Vec<String> = parts
            .iter()
            .filter_map(|part| match part {
                Part::Line(line) => Some(line.requests()),
                Part::Copy(_) => None,
            })
            .flatten()
            .collect();

        let (unique, slots) = dedupe(&requests);
        let answers = if unique.is_empty() {
            Vec::new()
        } else {
            debug!(unit = ?range, lines = unique.len(), repeated = requests.len() - unique.len(), "sending unit");
            self.translator
                .translate_batch(&unique, &self.source, &self.target)
                .await
                .map_err(|e| match e {
                    MtError::TranslationBackend(_) => e,
                    other => MtError::TranslationBackend(other.to_string()),
                })?
        };
        if answers.len() != unique.len() {
            return Err(MtError::TranslationBackend(format!(
                "{} returned {} lines for {} sent",
                self.translator.provider_name(),
                answers.len(),
                unique.len()
            )));
        }
        let responses: Vec<String> = slots.iter().map(|&slot| answers[slot].clone()).collect();

        let mut out = Vec::with_capacity(items.len());
        let mut anomalies = Vec::new();
        let mut offset = 0;
        for part in parts {
            match part {
                Part::Copy(copied) => out.extend(copied),
                Part::Line(line) => {
                    let count = line.request_count();
                    let before = anomalies.len();
                    out.extend(rebuild_line(
                        &line,
                        &responses[offset..offset + count],
                        &self.options,
                        &mut anomalies,
                    ));
                    for anomaly in &anomalies[before..] {
                        warn!(unit = ?range, line = %line.outgoing, "{}", anomaly);
                    }
                    offset += count;
                }
            }
        }
        Ok((out, anomalies))
    }

    fn push_run(&self, items: &[Item], parts: &mut Vec<Part>) -> MtResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        let line = Line::build(items, &self.options)?;
        if line.is_translatable() {
            parts.push(Part::Line(Box::new(line)));
        } else {
            parts.push(Part::Copy(items.to_vec()));
        }
        Ok(())
    }

    fn check_locales(&self) -> MtResult<()> {
        validate_locale(&self.source)?;
        validate_locale(&self.target)
    }
}

/// Distinct lines in first-seen order, and the index of each request among them
fn dedupe(requests: &[String]) -> (Vec<String>, Vec<usize>) {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut unique = Vec::new();
    let slots = requests
        .iter()
        .map(|request| {
            *seen.entry(request.as_str()).or_insert_with(|| {
                unique.push(request.clone());
                unique.len() - 1
            })
        })
        .collect();
    (unique, slots)
}

/// Ids of every block element in the document
fn block_ids(doc: &Document) -> HashSet<TagId> {
    doc.items()
        .iter()
        .filter_map(|item| match item {
            Item::Open(tag) if tag.is_block() => Some(tag.id),
            _ => None,
        })
        .collect()
}

/// Units must be in order, disjoint and inside the document.
fn check_units(doc: &Document, units: &[Range<usize>]) -> MtResult<()> {
    let mut previous_end = 0;
    for range in units {
        if range.start < previous_end || range.start > range.end || range.end > doc.len() {
            return Err(DocError::Segmentation(format!(
                "unit {:?} overlaps the previous one or lies outside a document of {} items",
                range,
                doc.len()
            ))
            .into());
        }
        previous_end = range.end;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockMode, MockTranslator};
    use crate::translator::FnTranslator;
    use lineardoc::{MwContextualizer, parse_with};

    fn doc(markup: &str) -> Document {
        parse_with(markup, &MwContextualizer).unwrap()
    }

    #[tokio::test]
    async fn test_noop_round_trip_keeps_markup() {
        let source = "<p>The <b>big <i>red</i></b> dog<br/> and a <a href=\"./Cat\">CAT</a>.</p>";
        let doc = doc(source);
        let mock = MockTranslator::new(MockMode::NoOp);
        let result = Wrapper::new(&mock, "en", "en").translate_blocks(&doc).await.unwrap();
        assert_eq!(result.to_markup().unwrap(), source);
        assert!(result.anomalies.is_empty());
    }

    #[tokio::test]
    async fn test_translate_unit_returns_the_range_only() {
        let doc = doc("<div><p>One.</p><p>Two.</p></div>");
        let mock = MockTranslator::from_pairs("es", [("one.", "uno."), ("two.", "dos.")]);
        let wrapper = Wrapper::new(&mock, "en", "es");
        // Items: div, p, "One.", /p, p, "Two.", /p, /div
        let result = wrapper.translate_unit(&doc, 4..7).await.unwrap();
        assert_eq!(result.to_markup().unwrap(), "<p>Dos.</p>");
    }

    #[tokio::test]
    async fn test_lines_without_words_are_not_sent() {
        let doc = doc("<p> — </p>");
        let translator = FnTranslator::new("panics", |_: &[String], _: &str, _: &str| {
            Err(MtError::TranslationBackend("should not be called".to_string()))
        });
        let result = Wrapper::new(&translator, "en", "es")
            .translate_blocks(&doc)
            .await
            .unwrap();
        assert_eq!(result.to_markup().unwrap(), "<p> — </p>");
    }

    #[tokio::test]
    async fn test_line_count_mismatch_is_backend_error() {
        let doc = doc("<p>Hello world</p>");
        let translator = FnTranslator::new("short", |_: &[String], _: &str, _: &str| Ok(Vec::new()));
        let result = Wrapper::new(&translator, "en", "es").translate_blocks(&doc).await;
        assert!(matches!(result, Err(MtError::TranslationBackend(msg)) if msg.contains("0 lines for 1")));
    }

    #[tokio::test]
    async fn test_repeated_lines_are_sent_once() {
        let source = "<p>The <b>big</b> cat and the <b>big</b> dog</p>";
        let sent = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = sent.clone();
        let translator = FnTranslator::new("echo", move |lines: &[String], _: &str, _: &str| {
            log.lock().unwrap().extend(lines.iter().cloned());
            Ok(lines.to_vec())
        });
        let result = Wrapper::new(&translator, "en", "en")
            .translate_blocks(&doc(source))
            .await
            .unwrap();
        assert_eq!(result.to_markup().unwrap(), source);

        let sent = sent.lock().unwrap();
        assert_eq!(sent.iter().filter(|line| line.as_str() == "big").count(), 1);
        let distinct: HashSet<&String> = sent.iter().collect();
        assert_eq!(distinct.len(), sent.len());
    }

    #[test]
    fn test_dedupe_keeps_first_seen_order() {
        let requests: Vec<String> = ["a", "b", "a", "c", "b"].iter().map(|s| s.to_string()).collect();
        let (unique, slots) = dedupe(&requests);
        assert_eq!(unique, vec!["a", "b", "c"]);
        assert_eq!(slots, vec![0, 1, 0, 2, 1]);
    }

    #[tokio::test]
    async fn test_invalid_locale_rejected() {
        let doc = doc("<p>Hello</p>");
        let mock = MockTranslator::new(MockMode::NoOp);
        let result = Wrapper::new(&mock, "en", "e s").translate_blocks(&doc).await;
        assert!(matches!(result, Err(MtError::InvalidLocale(_))));
    }

    #[tokio::test]
    async fn test_overlapping_units_rejected() {
        let doc = doc("<p>One. Two.</p>");
        let mock = MockTranslator::new(MockMode::NoOp);
        let segments = vec![
            Segment { id: 0, start: 1, end: 2, language: "en".to_string() },
            Segment { id: 1, start: 1, end: 2, language: "en".to_string() },
        ];
        let result = Wrapper::new(&mock, "en", "es").translate_document(&doc, &segments).await;
        assert!(matches!(result, Err(MtError::Document(DocError::Segmentation(_)))));
    }

    #[tokio::test]
    async fn test_out_of_bounds_unit_rejected() {
        let doc = doc("<p>One.</p>");
        let mock = MockTranslator::new(MockMode::NoOp);
        let result = Wrapper::new(&mock, "en", "es").translate_unit(&doc, 2..9).await;
        assert!(matches!(result, Err(MtError::Document(DocError::Structure(_)))));
    }
}

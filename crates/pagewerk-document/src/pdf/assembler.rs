// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DocumentAssembler — build new documents out of pages of existing ones
// (merge, extract, rearrange, split).

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use pagewerk_core::EngineConfig;
use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_core::types::SplitSpec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::objects::{self, INHERITABLE_KEYS};
use super::source::PageSource;
use super::writer::OutputDocument;
use crate::control::{JobControl, ProgressTracker};
use crate::range::PageRange;

/// Page-dictionary keys that tie a page to its old document and are not
/// carried over.
const DROPPED_PAGE_KEYS: [&[u8]; 5] = [b"Parent", b"Annots", b"B", b"StructParents", b"Type"];

/// Which pages of a source to take, in output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSelection {
    /// Every page, in document order.
    All,
    /// An ascending page set.
    Range(PageRange),
    /// Pages in exactly this order; repeats allowed.
    Explicit(Vec<u32>),
}

impl PageSelection {
    /// Check the selection against `source` and list its page numbers.
    fn resolve(&self, source: &PageSource) -> Result<Vec<u32>> {
        let total = source.page_count();
        let pages: Vec<u32> = match self {
            Self::All => (1..=total).collect(),
            Self::Range(range) => range.pages().to_vec(),
            Self::Explicit(pages) => pages.clone(),
        };

        if pages.is_empty() {
            return Err(PagewerkError::Usage(format!(
                "no pages selected from {}",
                source.label()
            )));
        }
        if let Some(bad) = pages.iter().find(|&&page| page < 1 || page > total) {
            return Err(PagewerkError::Parse {
                expression: bad.to_string(),
                reason: format!("{} has {} pages", source.label(), total),
            });
        }
        Ok(pages)
    }
}

/// One source document and the pages to take from it.
#[derive(Debug, Clone)]
pub struct SourceSelection<'a> {
    pub source: &'a PageSource,
    pub pages: PageSelection,
}

impl<'a> SourceSelection<'a> {
    pub fn all(source: &'a PageSource) -> Self {
        Self {
            source,
            pages: PageSelection::All,
        }
    }

    pub fn range(source: &'a PageSource, range: PageRange) -> Self {
        Self {
            source,
            pages: PageSelection::Range(range),
        }
    }

    pub fn explicit(source: &'a PageSource, pages: Vec<u32>) -> Self {
        Self {
            source,
            pages: PageSelection::Explicit(pages),
        }
    }
}

/// How a batch of split specs treats an invalid entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitPolicy {
    /// Each spec succeeds or fails on its own.
    #[default]
    Independent,
    /// Any invalid spec fails the whole batch before anything is built.
    AllOrNothing,
}

/// Result of one split spec.
#[derive(Debug)]
pub struct SplitOutcome {
    pub spec: SplitSpec,
    pub result: Result<Vec<u8>>,
}

/// Builds documents from pages of [`PageSource`]s.
///
/// Page content, resources and inherited attributes are copied by value, so
/// outputs render exactly like their source pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentAssembler {
    pdf_version: String,
    compress: bool,
}

impl Default for DocumentAssembler {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl DocumentAssembler {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            pdf_version: config.pdf_version.clone(),
            compress: config.compress_output,
        }
    }

    /// Concatenate the selected pages of every selection, in order.
    ///
    /// All selections are validated before any page is copied.
    #[instrument(skip_all, fields(sources = selections.len()))]
    pub fn assemble(&self, selections: &[SourceSelection<'_>], control: &JobControl) -> Result<Vec<u8>> {
        if selections.is_empty() {
            return Err(PagewerkError::Usage("nothing to assemble".into()));
        }

        let plan = selections
            .iter()
            .map(|selection| Ok((selection.source, selection.pages.resolve(selection.source)?)))
            .collect::<Result<Vec<_>>>()?;

        let total: usize = plan.iter().map(|(_, pages)| pages.len()).sum();
        info!(total_pages = total, "assembling document");

        let tracker = control.tracker(total);
        let label = plan
            .first()
            .map(|(source, _)| source.label().to_owned())
            .unwrap_or_default();
        self.build(&plan, &tracker, &label)
    }

    /// Cut `source` into one document per spec.
    ///
    /// Under [`SplitPolicy::Independent`] an out-of-bounds spec yields an
    /// `InvalidSplit` outcome while its siblings are still built. Under
    /// [`SplitPolicy::AllOrNothing`] the first invalid spec fails the call.
    /// Cancellation always fails the call.
    #[instrument(skip_all, fields(source = source.label(), specs = specs.len()))]
    pub fn split(
        &self,
        source: &PageSource,
        specs: &[SplitSpec],
        policy: SplitPolicy,
        control: &JobControl,
    ) -> Result<Vec<SplitOutcome>> {
        if specs.is_empty() {
            return Err(PagewerkError::Usage("no split ranges given".into()));
        }

        let total = source.page_count();
        if policy == SplitPolicy::AllOrNothing {
            for spec in specs {
                spec.validate(total)?;
            }
        }

        let units: usize = specs
            .iter()
            .filter(|spec| spec.validate(total).is_ok())
            .map(|spec| spec.len() as usize)
            .sum();
        let tracker = control.tracker(units);

        let mut outcomes = Vec::with_capacity(specs.len());
        for spec in specs {
            tracker.checkpoint()?;
            let result = match spec.validate(total) {
                Ok(()) => {
                    let pages: Vec<u32> = (spec.start..=spec.end).collect();
                    match self.build(&[(source, pages)], &tracker, source.label()) {
                        Err(PagewerkError::Cancelled) => return Err(PagewerkError::Cancelled),
                        other => other,
                    }
                }
                Err(err) => {
                    warn!(name = %spec.name, start = spec.start, end = spec.end, "split range out of bounds");
                    Err(err)
                }
            };
            outcomes.push(SplitOutcome {
                spec: spec.clone(),
                result,
            });
        }
        Ok(outcomes)
    }

    /// Re-save a whole document with unreferenced objects dropped and
    /// streams compressed.
    #[instrument(skip_all, fields(source = source.label()))]
    pub fn compact(&self, source: &PageSource) -> Result<Vec<u8>> {
        let mut document = source.document().clone();
        let pruned = document.prune_objects();
        document.renumber_objects();
        if self.compress {
            document.compress();
        }

        let mut output = Vec::new();
        document
            .save_to(&mut output)
            .map_err(|err| PagewerkError::assemble(source.label(), err))?;

        info!(
            pruned = pruned.len(),
            before = source.bytes().len(),
            after = output.len(),
            "document compacted"
        );
        Ok(output)
    }

    fn build(
        &self,
        plan: &[(&PageSource, Vec<u32>)],
        tracker: &ProgressTracker<'_>,
        label: &str,
    ) -> Result<Vec<u8>> {
        let mut output = OutputDocument::new(&self.pdf_version);
        let parent = output.pages_id();

        for (source, pages) in plan {
            let mut copier = ObjectCopier::new(source.document());
            for &page_number in pages {
                tracker.checkpoint()?;
                let page_id = source.page_id(page_number)?;
                let copied = copier
                    .copy_page(output.document_mut(), page_id, parent)
                    .map_err(|detail| PagewerkError::assemble(source.label(), detail))?;
                output.push_page(copied);
                tracker.unit_done();
            }
            debug!(source = source.label(), copied_objects = copier.copied(), "source copied");
        }

        output.finish(self.compress, label)
    }
}

/// Deep copy of objects from one document into another.
///
/// Each source object is copied at most once per copier; later references
/// to it reuse the first copy, which also terminates reference cycles.
struct ObjectCopier<'a> {
    source: &'a Document,
    map: HashMap<ObjectId, ObjectId>,
}

impl<'a> ObjectCopier<'a> {
    fn new(source: &'a Document) -> Self {
        Self {
            source,
            map: HashMap::new(),
        }
    }

    fn copied(&self) -> usize {
        self.map.len()
    }

    /// Copy a page dictionary under `parent`, pulling inherited attributes
    /// down onto the page. A page copied twice gets two page objects that
    /// share content and resources.
    fn copy_page(
        &mut self,
        target: &mut Document,
        page_id: ObjectId,
        parent: ObjectId,
    ) -> std::result::Result<ObjectId, String> {
        let source = self.source;
        let page = source
            .get_dictionary(page_id)
            .map_err(|err| format!("page object {page_id:?}: {err}"))?;

        let mut copy = Dictionary::new();
        copy.set("Type", Object::Name(b"Page".to_vec()));
        for (key, value) in page.iter() {
            if DROPPED_PAGE_KEYS.contains(&key.as_slice()) {
                continue;
            }
            let value = self.copy_object(target, value);
            copy.set(key.clone(), value);
        }

        for key in INHERITABLE_KEYS {
            if copy.has(key) {
                continue;
            }
            if let Some(value) = objects::inherited(source, page_id, key) {
                let value = self.copy_object(target, value);
                copy.set(key, value);
            }
        }

        copy.set("Parent", Object::Reference(parent));
        Ok(target.add_object(copy))
    }

    fn copy_reference(&mut self, target: &mut Document, id: ObjectId) -> ObjectId {
        if let Some(&copied) = self.map.get(&id) {
            return copied;
        }
        let new_id = target.new_object_id();
        self.map.insert(id, new_id);

        let source = self.source;
        let copied = match source.get_object(id) {
            Ok(object) => self.copy_object(target, object),
            Err(_) => Object::Null,
        };
        target.objects.insert(new_id, copied);
        new_id
    }

    fn copy_object(&mut self, target: &mut Document, object: &Object) -> Object {
        match object {
            Object::Reference(id) => Object::Reference(self.copy_reference(target, *id)),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.copy_object(target, item))
                    .collect(),
            ),
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dictionary(target, dict)),
            Object::Stream(stream) => {
                let dict = self.copy_dictionary(target, &stream.dict);
                let mut copy = Stream::new(dict, stream.content.clone());
                copy.allows_compression = stream.allows_compression;
                Object::Stream(copy)
            }
            other => other.clone(),
        }
    }

    /// `/Parent` links point back up trees we don't copy (page tree, field
    /// tree, outline) and are left out.
    fn copy_dictionary(&mut self, target: &mut Document, dict: &Dictionary) -> Dictionary {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            let value = self.copy_object(target, value);
            copy.set(key.clone(), value);
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, page_labels};

    fn source(label: &str, pages: u32) -> PageSource {
        PageSource::open(format!("{label}.pdf"), fixtures::pdf_with_pages(label, pages)).unwrap()
    }

    fn assembler() -> DocumentAssembler {
        DocumentAssembler::default()
    }

    #[test]
    fn merge_concatenates_in_source_order() {
        let a = source("A", 2);
        let b = source("B", 3);
        let bytes = assembler()
            .assemble(
                &[SourceSelection::all(&a), SourceSelection::all(&b)],
                &JobControl::new(),
            )
            .unwrap();

        assert_eq!(
            page_labels(&bytes),
            vec!["A-Page-1", "A-Page-2", "B-Page-1", "B-Page-2", "B-Page-3"]
        );
    }

    #[test]
    fn copied_pages_keep_inherited_geometry() {
        let a = source("A", 2);
        let bytes = assembler()
            .assemble(&[SourceSelection::all(&a)], &JobControl::new())
            .unwrap();
        let copy = PageSource::open("copy.pdf", bytes).unwrap();
        assert_eq!(copy.page_size(1).unwrap(), (595.0, 842.0));
    }

    #[test]
    fn explicit_order_and_repeats_are_kept() {
        let a = source("A", 3);
        let bytes = assembler()
            .assemble(
                &[SourceSelection::explicit(&a, vec![3, 1, 3])],
                &JobControl::new(),
            )
            .unwrap();
        assert_eq!(page_labels(&bytes), vec!["A-Page-3", "A-Page-1", "A-Page-3"]);
    }

    #[test]
    fn extraction_with_a_parsed_range() {
        let a = source("A", 10);
        let range = PageRange::parse("1,3,5-7", a.page_count()).unwrap();
        let bytes = assembler()
            .assemble(&[SourceSelection::range(&a, range)], &JobControl::new())
            .unwrap();
        assert_eq!(
            page_labels(&bytes),
            vec!["A-Page-1", "A-Page-3", "A-Page-5", "A-Page-6", "A-Page-7"]
        );
    }

    #[test]
    fn out_of_range_selection_fails_before_copying() {
        let a = source("A", 2);
        let b = source("B", 2);
        let err = assembler()
            .assemble(
                &[SourceSelection::all(&a), SourceSelection::explicit(&b, vec![5])],
                &JobControl::new(),
            )
            .unwrap_err();
        assert!(matches!(err, PagewerkError::Parse { .. }));

        let err = assembler()
            .assemble(&[SourceSelection::explicit(&a, vec![])], &JobControl::new())
            .unwrap_err();
        assert!(matches!(err, PagewerkError::Usage(_)));
    }

    #[test]
    fn split_builds_one_document_per_spec() {
        let a = source("A", 10);
        let outcomes = assembler()
            .split(
                &a,
                &[SplitSpec::named(1, 3, "intro"), SplitSpec::named(4, 10, "rest")],
                SplitPolicy::Independent,
                &JobControl::new(),
            )
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        let first = outcomes[0].result.as_ref().unwrap();
        let second = outcomes[1].result.as_ref().unwrap();
        assert_eq!(page_labels(first), vec!["A-Page-1", "A-Page-2", "A-Page-3"]);
        assert_eq!(page_labels(second).len(), 7);
        assert_eq!(page_labels(second)[0], "A-Page-4");
    }

    #[test]
    fn invalid_spec_fails_alone_when_independent() {
        let a = source("A", 5);
        let outcomes = assembler()
            .split(
                &a,
                &[SplitSpec::new(1, 2), SplitSpec::new(4, 9)],
                SplitPolicy::Independent,
                &JobControl::new(),
            )
            .unwrap();
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(
            outcomes[1].result,
            Err(PagewerkError::InvalidSplit { start: 4, end: 9, total: 5, .. })
        ));
    }

    #[test]
    fn invalid_spec_fails_everything_when_all_or_nothing() {
        let a = source("A", 5);
        let err = assembler()
            .split(
                &a,
                &[SplitSpec::new(1, 2), SplitSpec::new(3, 2)],
                SplitPolicy::AllOrNothing,
                &JobControl::new(),
            )
            .unwrap_err();
        assert!(matches!(err, PagewerkError::InvalidSplit { .. }));
    }

    #[test]
    fn cancelled_assembly_produces_nothing() {
        let a = source("A", 3);
        let control = JobControl::new();
        control.cancel_token().cancel();
        let err = assembler()
            .assemble(&[SourceSelection::all(&a)], &control)
            .unwrap_err();
        assert!(matches!(err, PagewerkError::Cancelled));

        let err = assembler()
            .split(&a, &[SplitSpec::whole(3)], SplitPolicy::Independent, &control)
            .unwrap_err();
        assert!(matches!(err, PagewerkError::Cancelled));
    }

    #[test]
    fn compact_keeps_every_page() {
        let a = source("A", 4);
        let bytes = assembler().compact(&a).unwrap();
        assert_eq!(page_labels(&bytes).len(), 4);
    }
}

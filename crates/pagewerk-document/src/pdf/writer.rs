// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer — the page tree, catalog and trailer of a document being
// generated, and its final serialisation.

use lopdf::{Dictionary, Document, Object, ObjectId};
use pagewerk_core::error::{PagewerkError, Result};
use tracing::debug;

/// Producer string written into the /Info dictionary.
const PRODUCER: &str = "Pagewerk";

/// A new document under construction.
///
/// The /Pages root id is reserved up front so page dictionaries can point
/// their /Parent at it before the root itself exists.
pub(crate) struct OutputDocument {
    document: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl OutputDocument {
    pub(crate) fn new(pdf_version: &str) -> Self {
        let mut document = Document::with_version(pdf_version);
        let pages_id = document.new_object_id();
        Self {
            document,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub(crate) fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Id every page's /Parent must reference.
    pub(crate) fn pages_id(&self) -> ObjectId {
        self.pages_id
    }

    /// Append an already-added page object as the next page.
    pub(crate) fn push_page(&mut self, page_id: ObjectId) {
        self.kids.push(Object::Reference(page_id));
    }

    /// Add `page` (its /Parent is set here) and append it.
    pub(crate) fn add_page(&mut self, mut page: Dictionary) -> ObjectId {
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(self.pages_id));
        let page_id = self.document.add_object(page);
        self.push_page(page_id);
        page_id
    }

    pub(crate) fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Write the page tree and catalog, then serialise. `label` names the
    /// output in errors.
    pub(crate) fn finish(mut self, compress: bool, label: &str) -> Result<Vec<u8>> {
        if self.kids.is_empty() {
            return Err(PagewerkError::assemble(label, "document would have no pages"));
        }

        let count = self.kids.len() as i64;
        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Kids", Object::Array(self.kids));
        pages.set("Count", Object::Integer(count));
        self.document
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(self.pages_id));
        let catalog_id = self.document.add_object(catalog);

        let mut info = Dictionary::new();
        info.set("Producer", Object::string_literal(PRODUCER));
        let info_id = self.document.add_object(info);

        self.document.trailer.set("Root", Object::Reference(catalog_id));
        self.document.trailer.set("Info", Object::Reference(info_id));

        if compress {
            self.document.compress();
        }

        let mut output = Vec::new();
        self.document
            .save_to(&mut output)
            .map_err(|err| PagewerkError::assemble(label, err))?;

        debug!(pages = count, output_bytes = output.len(), "document serialised");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_output_is_refused() {
        let output = OutputDocument::new("1.7");
        assert!(matches!(
            output.finish(true, "out.pdf"),
            Err(PagewerkError::Assemble { .. })
        ));
    }

    #[test]
    fn blank_pages_round_trip_through_lopdf() {
        let mut output = OutputDocument::new("1.5");
        for _ in 0..3 {
            let mut page = Dictionary::new();
            page.set(
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(200),
                    Object::Integer(100),
                ]),
            );
            output.add_page(page);
        }
        assert_eq!(output.page_count(), 3);

        let bytes = output.finish(false, "out.pdf").unwrap();
        let reloaded = Document::load_mem(&bytes).unwrap();
        assert_eq!(reloaded.get_pages().len(), 3);
        assert_eq!(reloaded.version, "1.5");
    }
}

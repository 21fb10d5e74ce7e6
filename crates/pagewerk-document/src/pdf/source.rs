// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PageSource — a decoded, read-only input document that pages are copied or
// rendered from.

use std::sync::Arc;

use lopdf::{Document, Object, ObjectId};
use pagewerk_core::error::{PagewerkError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::objects;

/// US Letter, used when a page tree declares no MediaBox at all.
const FALLBACK_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Geometry of one page as declared by the document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    /// `[x0, y0, x1, y1]` in points, normalised so `x0 <= x1`, `y0 <= y1`.
    pub media_box: [f32; 4],
    /// Clockwise display rotation, one of 0, 90, 180, 270.
    pub rotation: u16,
}

impl PageInfo {
    /// Unrotated width and height in points.
    pub fn box_size(&self) -> (f32, f32) {
        let [x0, y0, x1, y1] = self.media_box;
        (x1 - x0, y1 - y0)
    }

    /// Width and height as displayed, after applying `/Rotate`.
    pub fn display_size(&self) -> (f32, f32) {
        let (w, h) = self.box_size();
        if self.rotation % 180 == 90 { (h, w) } else { (w, h) }
    }
}

/// An opened input document.
///
/// The original bytes are kept (shared) so that parallel workers can open
/// their own copy of the document instead of sharing this one.
pub struct PageSource {
    label: String,
    bytes: Arc<[u8]>,
    document: Document,
    pages: Vec<ObjectId>,
}

impl PageSource {
    /// Decode `bytes` as a PDF. `label` names the input in errors and output
    /// file names (usually the original file name).
    #[instrument(skip_all, fields(label = %label.as_ref(), bytes_len = bytes.as_ref().len()))]
    pub fn open(label: impl AsRef<str>, bytes: impl AsRef<[u8]>) -> Result<Self> {
        Self::from_shared(label.as_ref(), Arc::from(bytes.as_ref()))
    }

    /// Like [`PageSource::open`] but reuses an already shared buffer.
    pub fn from_shared(label: &str, bytes: Arc<[u8]>) -> Result<Self> {
        let document =
            Document::load_mem(&bytes).map_err(|err| PagewerkError::decode(label, err))?;

        if document.is_encrypted() {
            return Err(PagewerkError::decode(label, "document is encrypted"));
        }

        let pages: Vec<ObjectId> = document.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(PagewerkError::decode(label, "document has no pages"));
        }

        debug!(pages = pages.len(), "document decoded");
        Ok(Self {
            label: label.to_owned(),
            bytes,
            document,
            pages,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// The encoded input this source was decoded from.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub(crate) fn document(&self) -> &Document {
        &self.document
    }

    /// Object id of the 1-based `page_number`.
    pub(crate) fn page_id(&self, page_number: u32) -> Result<ObjectId> {
        page_number
            .checked_sub(1)
            .and_then(|index| self.pages.get(index as usize))
            .copied()
            .ok_or_else(|| PagewerkError::Parse {
                expression: page_number.to_string(),
                reason: format!("{} has {} pages", self.label, self.pages.len()),
            })
    }

    /// Declared geometry of a page, resolving inherited attributes.
    pub fn page_info(&self, page_number: u32) -> Result<PageInfo> {
        let page_id = self.page_id(page_number)?;
        let doc = &self.document;

        let media_box = objects::inherited(doc, page_id, b"MediaBox")
            .and_then(|object| objects::rectangle(doc, object))
            .filter(|[x0, y0, x1, y1]| x1 > x0 && y1 > y0)
            .unwrap_or(FALLBACK_MEDIA_BOX);

        let rotation = objects::inherited(doc, page_id, b"Rotate")
            .and_then(|object| match object {
                Object::Integer(degrees) => Some(*degrees),
                other => objects::number(other).map(|degrees| degrees as i64),
            })
            .map(|degrees| (degrees.rem_euclid(360) / 90 * 90) as u16)
            .unwrap_or(0);

        Ok(PageInfo {
            media_box,
            rotation,
        })
    }

    /// Displayed page size in points.
    pub fn page_size(&self, page_number: u32) -> Result<(f32, f32)> {
        Ok(self.page_info(page_number)?.display_size())
    }
}

impl std::fmt::Debug for PageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageSource")
            .field("label", &self.label)
            .field("pages", &self.pages.len())
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

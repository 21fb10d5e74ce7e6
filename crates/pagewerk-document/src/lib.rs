// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pagewerk-document — the Pagewerk transformation engine.
//
// Page-selection parsing, page assembly (merge, split, extract, rearrange),
// image-to-PDF conversion with contain/fit layout, and page rasterization.
// Every operation is a pure function from in-memory inputs to fresh output
// buffers.

pub mod control;
pub mod convert;
pub mod image;
pub mod layout;
pub mod order;
pub mod pdf;
pub mod range;
pub mod raster;
pub mod workbench;

#[cfg(test)]
mod fixtures;

// Re-export the primary types so callers can use `pagewerk_document::PageRange` etc.
pub use control::{CancelToken, JobControl, ProgressFn};
pub use convert::{ImageInput, ImageToDocumentConverter};
pub use image::ImageProcessor;
pub use layout::{LayoutResult, PageGeometry, compute_layout};
pub use order::{Direction, FileOrderList, ItemId, OrderedItem};
pub use pdf::{
    DocumentAssembler, PageInfo, PageSelection, PageSource, SourceSelection, SplitOutcome,
    SplitPolicy,
};
pub use range::PageRange;
pub use raster::{
    BuiltinRenderer, DocumentRasterizer, FailurePolicy, PageFailure, PageRenderer, RasterOutcome,
};
#[cfg(feature = "mupdf")]
pub use raster::MupdfRenderer;
pub use workbench::{NamedPage, NamedSplit, RasterBatch, Workbench};

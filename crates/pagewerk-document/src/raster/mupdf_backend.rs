// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// MuPDF-backed renderer (feature "mupdf"): text, fonts, shadings and clipping
// rendered by the native library.

use image::{Rgba, RgbaImage};
use mupdf::{Colorspace, Document, Matrix};
use pagewerk_core::error::{PagewerkError, Result};
use tracing::{debug, instrument};

use super::{PageRenderer, page_extent};
use crate::pdf::PageSource;

/// Renders through MuPDF. The native document isn't thread-safe, so each
/// call opens its own from the source bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MupdfRenderer;

impl PageRenderer for MupdfRenderer {
    fn name(&self) -> &'static str {
        "mupdf"
    }

    #[instrument(skip(self, source), fields(source = source.label()))]
    fn render(&self, source: &PageSource, page_number: u32, scale: f32) -> Result<RgbaImage> {
        let render_err = |err: mupdf::Error| PagewerkError::Render {
            page: page_number,
            detail: err.to_string(),
        };

        // MuPDF rounds the pixmap bounds itself; paint into the exact size
        // derived from the page box.
        let (display_w, display_h) = source.page_size(page_number)?;
        let (out_w, out_h) = page_extent(page_number, display_w, display_h, scale)?;

        let document = Document::from_bytes(source.bytes(), "application/pdf").map_err(render_err)?;
        let page = document
            .load_page(page_number as i32 - 1)
            .map_err(render_err)?;
        let matrix = Matrix::new_scale(scale, scale);
        let pixmap = page
            .to_pixmap(&matrix, &Colorspace::device_rgb(), false, true)
            .map_err(render_err)?;

        let (width, height) = (pixmap.width() as u32, pixmap.height() as u32);
        let samples = pixmap.samples();
        let n = pixmap.n() as usize;

        let mut image = RgbaImage::from_pixel(out_w, out_h, Rgba([255, 255, 255, 255]));
        for y in 0..height.min(image.height()) {
            for x in 0..width.min(image.width()) {
                let offset = (y as usize * width as usize + x as usize) * n;
                let r = samples.get(offset).copied().unwrap_or(255);
                let g = samples.get(offset + 1).copied().unwrap_or(255);
                let b = samples.get(offset + 2).copied().unwrap_or(255);
                image.put_pixel(x, y, Rgba([r, g, b, 255]));
            }
        }

        debug!(page_number, width = image.width(), height = image.height(), "page rendered");
        Ok(image)
    }
}

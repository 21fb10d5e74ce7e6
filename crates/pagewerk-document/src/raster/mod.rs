// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster module — render document pages to pixels and encode them.

pub mod builtin;
#[cfg(feature = "mupdf")]
pub mod mupdf_backend;
pub(crate) mod paint;
pub mod rasterizer;

use image::RgbaImage;
use pagewerk_core::error::{PagewerkError, Result};

use crate::pdf::PageSource;

pub use builtin::BuiltinRenderer;
#[cfg(feature = "mupdf")]
pub use mupdf_backend::MupdfRenderer;
pub use rasterizer::{DocumentRasterizer, FailurePolicy, PageFailure, RasterOutcome};

/// Largest page buffer a renderer allocates, in pixels (400 MB of RGBA).
pub const MAX_PAGE_PIXELS: u64 = 100_000_000;

/// Turns one page into RGBA pixels.
///
/// `scale` is pixels per point. The image must be
/// `ceil(width * scale) x ceil(height * scale)` of the page's displayed
/// (rotation-applied) size.
pub trait PageRenderer: Send + Sync {
    fn name(&self) -> &'static str;

    fn render(&self, source: &PageSource, page_number: u32, scale: f32) -> Result<RgbaImage>;
}

/// The most capable renderer this build has.
pub fn default_renderer() -> Box<dyn PageRenderer> {
    #[cfg(feature = "mupdf")]
    {
        Box::new(MupdfRenderer)
    }
    #[cfg(not(feature = "mupdf"))]
    {
        Box::new(BuiltinRenderer)
    }
}

/// Output size of a `width x height` point page at `scale`: `ceil(points *
/// scale)` per axis, at least 1. Pages past [`MAX_PAGE_PIXELS`] fail.
pub(crate) fn page_extent(page_number: u32, width: f32, height: f32, scale: f32) -> Result<(u32, u32)> {
    let axis = |points: f32| {
        let pixels = (f64::from(points) * f64::from(scale)).ceil();
        (pixels.is_finite() && pixels <= f64::from(u32::MAX)).then(|| (pixels as u64).max(1))
    };
    match (axis(width), axis(height)) {
        (Some(w), Some(h)) if w * h <= MAX_PAGE_PIXELS => Ok((w as u32, h as u32)),
        _ => Err(PagewerkError::Render {
            page: page_number,
            detail: format!(
                "{width} x {height} pt at {scale} px/pt is larger than {MAX_PAGE_PIXELS} pixels"
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_rounds_up() {
        assert_eq!(page_extent(1, 612.0, 100.0, 1.0).unwrap(), (612, 100));
        assert_eq!(page_extent(1, 100.0, 100.0, 1.005).unwrap(), (101, 101));
        assert_eq!(page_extent(1, 0.0, 0.0, 2.0).unwrap(), (1, 1));
    }

    #[test]
    fn oversized_pages_are_render_errors() {
        let err = page_extent(7, 595.0, 842.0, u32::MAX as f32 / 72.0).unwrap_err();
        assert!(matches!(err, PagewerkError::Render { page: 7, .. }));
        // A4 at 3000 dpi is about 870 megapixels
        assert!(page_extent(1, 595.0, 842.0, 3000.0 / 72.0).is_err());
        assert!(page_extent(1, 595.0, 842.0, 600.0 / 72.0).is_ok());
        assert!(page_extent(1, 595.0, 842.0, f32::INFINITY).is_err());
    }

    #[cfg(feature = "mupdf")]
    #[test]
    fn default_build_renders_through_mupdf() {
        assert_eq!(default_renderer().name(), "mupdf");
    }
}

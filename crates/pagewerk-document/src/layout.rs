// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contain/fit placement of a raster image on a page.

use pagewerk_core::PageSetup;
use pagewerk_core::error::{PagewerkError, Result};
use serde::{Deserialize, Serialize};

/// Where and how large an image is drawn on its page, in points.
/// `offset_x`/`offset_y` are measured from the bottom-left page corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    pub draw_width: f32,
    pub draw_height: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

/// Page dimensions and margin resolved to points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl PageGeometry {
    pub fn from_setup(setup: &PageSetup) -> Self {
        let (width, height) = setup.page_size_pt();
        Self {
            width,
            height,
            margin: setup.margin_pt(),
        }
    }

    /// Width and height of the box inside the margins, never negative.
    pub fn content_box(&self) -> (f32, f32) {
        (
            (self.width - 2.0 * self.margin).max(0.0),
            (self.height - 2.0 * self.margin).max(0.0),
        )
    }

    /// Fit an image of the given pixel size onto this page.
    pub fn place(&self, image_width: u32, image_height: u32) -> Result<LayoutResult> {
        compute_layout(
            image_width as f32,
            image_height as f32,
            self.width,
            self.height,
            self.margin,
        )
    }
}

/// Scale the image to the largest size that fits inside the page's content
/// box while keeping its aspect ratio, then centre it on the page.
pub fn compute_layout(
    image_width: f32,
    image_height: f32,
    page_width: f32,
    page_height: f32,
    margin: f32,
) -> Result<LayoutResult> {
    let content_w = (page_width - 2.0 * margin).max(0.0);
    let content_h = (page_height - 2.0 * margin).max(0.0);

    if image_height <= 0.0 || image_width <= 0.0 || content_h <= 0.0 || content_w <= 0.0 {
        return Err(PagewerkError::Layout("degenerate dimensions".into()));
    }

    let img_ratio = image_width / image_height;
    let box_ratio = content_w / content_h;

    let (draw_width, draw_height) = if img_ratio > box_ratio {
        (content_w, content_w / img_ratio)
    } else {
        (content_h * img_ratio, content_h)
    };

    Ok(LayoutResult {
        draw_width,
        draw_height,
        offset_x: (page_width - draw_width) / 2.0,
        offset_y: (page_height - draw_height) / 2.0,
    })
}

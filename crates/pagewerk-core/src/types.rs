// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Pagewerk document engine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PagewerkError;

/// PDF user-space units per inch.
pub const POINTS_PER_INCH: f32 = 72.0;

/// Millimetres per inch.
pub const MM_PER_INCH: f32 = 25.4;

/// Convert millimetres to PDF points (1pt = 1/72 inch).
pub fn mm_to_pt(mm: f32) -> f32 {
    mm * POINTS_PER_INCH / MM_PER_INCH
}

// -- Page geometry ------------------------------------------------------------

/// Standard paper sizes for generated pages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    Letter,
    Legal,
    /// Explicit page size in points.
    Custom { width_pt: f32, height_pt: f32 },
}

impl PaperSize {
    /// Custom size given in millimetres.
    pub fn custom_mm(width_mm: f32, height_mm: f32) -> Self {
        Self::Custom {
            width_pt: mm_to_pt(width_mm),
            height_pt: mm_to_pt(height_mm),
        }
    }

    /// Dimensions in points (width, height) as the size is usually printed.
    pub fn dimensions_pt(&self) -> (f32, f32) {
        match self {
            Self::A4 => (595.28, 841.89),
            Self::Letter => (612.0, 792.0),
            Self::Legal => (612.0, 1008.0),
            Self::Custom {
                width_pt,
                height_pt,
            } => (*width_pt, *height_pt),
        }
    }

    /// Physical page size once `orientation` is applied.
    pub fn oriented_pt(&self, orientation: Orientation) -> (f32, f32) {
        let (w, h) = self.dimensions_pt();
        orientation.apply(w, h)
    }
}

impl FromStr for PaperSize {
    type Err = PagewerkError;

    /// Accepts `a4`, `letter`, `legal` or `<width>x<height>` in points.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a4" => Ok(Self::A4),
            "letter" => Ok(Self::Letter),
            "legal" => Ok(Self::Legal),
            other => {
                let parsed = other.split_once('x').and_then(|(w, h)| {
                    Some((w.trim().parse::<f32>().ok()?, h.trim().parse::<f32>().ok()?))
                });
                match parsed {
                    Some((width_pt, height_pt)) if width_pt > 0.0 && height_pt > 0.0 => {
                        Ok(Self::Custom {
                            width_pt,
                            height_pt,
                        })
                    }
                    _ => Err(PagewerkError::Usage(format!("unknown paper size: {s}"))),
                }
            }
        }
    }
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    /// Taller dimension vertical.
    #[default]
    Portrait,
    /// Taller dimension horizontal.
    Landscape,
}

impl Orientation {
    /// Arrange `(width, height)` for this orientation.
    pub fn apply(&self, width: f32, height: f32) -> (f32, f32) {
        let (short, long) = if width <= height {
            (width, height)
        } else {
            (height, width)
        };
        match self {
            Self::Portrait => (short, long),
            Self::Landscape => (long, short),
        }
    }
}

/// Page size, orientation and margin for image-to-document conversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSetup {
    pub paper_size: PaperSize,
    pub orientation: Orientation,
    /// Margin on every side, in millimetres.
    pub margin_mm: f32,
}

impl PageSetup {
    /// Page width and height in points.
    pub fn page_size_pt(&self) -> (f32, f32) {
        self.paper_size.oriented_pt(self.orientation)
    }

    /// Margin in points.
    pub fn margin_pt(&self) -> f32 {
        mm_to_pt(self.margin_mm.max(0.0))
    }
}

impl Default for PageSetup {
    fn default() -> Self {
        Self {
            paper_size: PaperSize::A4,
            orientation: Orientation::Portrait,
            margin_mm: 10.0,
        }
    }
}

// -- Images -------------------------------------------------------------------

/// How an input image is embedded into a generated page.
///
/// `Other` covers anything the `image` crate can decode without a direct
/// embed path (GIF, WebP, BMP, TIFF...); it is normalised to PNG first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageEncoding {
    Jpeg,
    Png,
    Other,
}

impl ImageEncoding {
    /// Classify a declared MIME type.
    pub fn from_mime(mime_type: &str) -> Self {
        match mime_type.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Self::Jpeg,
            "image/png" => Self::Png,
            _ => Self::Other,
        }
    }
}

/// Output encoding for rasterized pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RasterFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl RasterFormat {
    /// File extension used when naming outputs.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }

    /// Whether `quality` is ignored for this format.
    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Png)
    }
}

impl FromStr for RasterFormat {
    type Err = PagewerkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            other => Err(PagewerkError::Usage(format!("unknown raster format: {other}"))),
        }
    }
}

impl fmt::Display for RasterFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Resolution, encoding and quality for rasterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterSettings {
    pub format: RasterFormat,
    pub dpi: u32,
    /// 1-100; ignored for lossless formats.
    pub quality: u8,
}

impl RasterSettings {
    /// Page-space scale factor, floored at 0.1.
    pub fn scale(&self) -> f32 {
        (self.dpi as f32 / POINTS_PER_INCH).max(0.1)
    }

    /// Quality clamped into 1..=100.
    pub fn clamped_quality(&self) -> u8 {
        self.quality.clamp(1, 100)
    }

    /// Quality mapped onto `[0.01, 1.0]`.
    pub fn normalized_quality(&self) -> f32 {
        self.clamped_quality() as f32 / 100.0
    }
}

impl Default for RasterSettings {
    fn default() -> Self {
        Self {
            format: RasterFormat::Png,
            dpi: 150,
            quality: 90,
        }
    }
}

// -- Splitting ----------------------------------------------------------------

/// A named, inclusive page span cut from one source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSpec {
    pub start: u32,
    pub end: u32,
    pub name: String,
}

impl SplitSpec {
    /// Span named `Page n` or `Pages s-e`.
    pub fn new(start: u32, end: u32) -> Self {
        let name = if start == end {
            format!("Page {start}")
        } else {
            format!("Pages {start}-{end}")
        };
        Self { start, end, name }
    }

    pub fn named(start: u32, end: u32, name: impl Into<String>) -> Self {
        Self {
            start,
            end,
            name: name.into(),
        }
    }

    /// The whole document as a single span.
    pub fn whole(total_pages: u32) -> Self {
        Self::new(1, total_pages.max(1))
    }

    /// Check `1 <= start <= end <= total_pages`.
    pub fn validate(&self, total_pages: u32) -> Result<(), PagewerkError> {
        if self.start < 1 || self.start > self.end || self.end > total_pages {
            return Err(PagewerkError::InvalidSplit {
                name: self.name.clone(),
                start: self.start,
                end: self.end,
                total: total_pages,
            });
        }
        Ok(())
    }

    /// Number of pages covered.
    /// Pages in the span; 0 when `end < start`.
    pub fn len(&self) -> u32 {
        if self.is_empty() {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

// -- Outputs ------------------------------------------------------------------

/// A generated buffer plus the name it should be stored/downloaded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedOutput {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// One rasterized page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// 1-based page number in the source document.
    pub page_number: u32,
    pub width: u32,
    pub height: u32,
    pub format: RasterFormat,
    pub bytes: Vec<u8>,
}

/// Work-unit progress reported between pages/images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub units_completed: usize,
    pub units_total: usize,
}

impl Progress {
    /// Completion as a percentage (0-100).
    pub fn percent(&self) -> u8 {
        if self.units_total == 0 {
            return 100;
        }
        ((self.units_completed.min(self.units_total) * 100) / self.units_total) as u8
    }
}

// -- Job records --------------------------------------------------------------

/// Unique identifier for a tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle states recorded by the job-tracking layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

/// Record kept by the job-tracking layer. The engine itself never reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: Progress,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl JobRecord {
    /// A queued job whose results expire after `retention`.
    pub fn new(units_total: usize, retention: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            status: JobStatus::Queued,
            progress: Progress {
                units_completed: 0,
                units_total,
            },
            created_at: now,
            expires_at: now.checked_add_signed(retention).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

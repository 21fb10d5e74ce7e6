// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DocumentRasterizer — render a page selection to encoded images, one work
// unit per page, optionally on the rayon pool.

use std::sync::Arc;

use image::DynamicImage;
use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_core::{EngineConfig, RasterSettings, RenderedPage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::{PageRenderer, default_renderer};
use crate::control::{JobControl, ProgressTracker};
use crate::image::ImageProcessor;
use crate::pdf::PageSource;
use crate::range::PageRange;

/// What a failing page does to the rest of the job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep the pages that rendered; report the others.
    #[default]
    BestEffort,
    /// The first failing page fails the call.
    AllOrNothing,
}

/// A page that could not be produced.
#[derive(Debug)]
pub struct PageFailure {
    pub page_number: u32,
    pub error: PagewerkError,
}

/// Rendered pages and per-page failures, each in ascending page order.
#[derive(Debug, Default)]
pub struct RasterOutcome {
    pub pages: Vec<RenderedPage>,
    pub failures: Vec<PageFailure>,
}

impl RasterOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Renders pages through a [`PageRenderer`] and encodes them.
pub struct DocumentRasterizer {
    renderer: Arc<dyn PageRenderer>,
    parallel: bool,
}

impl Default for DocumentRasterizer {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl DocumentRasterizer {
    pub fn new(renderer: impl PageRenderer + 'static) -> Self {
        Self {
            renderer: Arc::new(renderer),
            parallel: true,
        }
    }

    /// Best available renderer, parallelism from the config.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            renderer: Arc::from(default_renderer()),
            parallel: config.parallel,
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn renderer_name(&self) -> &'static str {
        self.renderer.name()
    }

    /// Render every page of `range` at `settings`.
    ///
    /// Output is ordered by page number whatever order workers finish in.
    /// Cancellation fails the call and discards finished pages.
    #[instrument(skip_all, fields(source = source.label(), pages = range.len(), format = %settings.format, dpi = settings.dpi))]
    pub fn rasterize(
        &self,
        source: &PageSource,
        range: &PageRange,
        settings: &RasterSettings,
        policy: FailurePolicy,
        control: &JobControl,
    ) -> Result<RasterOutcome> {
        if range.max_page() > source.page_count() {
            return Err(PagewerkError::Parse {
                expression: range.max_page().to_string(),
                reason: format!("{} has {} pages", source.label(), source.page_count()),
            });
        }

        let tracker = control.tracker(range.len());
        info!(renderer = self.renderer.name(), parallel = self.parallel, "rasterizing");

        let mut results: Vec<(u32, Result<RenderedPage>)> = if self.parallel && range.len() > 1 {
            // One decoded document per worker; documents are never shared
            // between threads.
            let label = source.label();
            let bytes = source.shared_bytes();
            range
                .pages()
                .par_iter()
                .map_init(
                    || PageSource::from_shared(label, Arc::clone(&bytes)),
                    |worker, &page_number| {
                        let result = match worker {
                            Ok(worker) => self.render_tracked(worker, page_number, settings, &tracker),
                            Err(err) => Err(PagewerkError::Render {
                                page: page_number,
                                detail: err.to_string(),
                            }),
                        };
                        (page_number, result)
                    },
                )
                .collect()
        } else {
            range
                .iter()
                .map(|page_number| {
                    (
                        page_number,
                        self.render_tracked(source, page_number, settings, &tracker),
                    )
                })
                .collect()
        };
        results.sort_by_key(|(page_number, _)| *page_number);

        let mut outcome = RasterOutcome::default();
        for (page_number, result) in results {
            match result {
                Ok(page) => outcome.pages.push(page),
                Err(PagewerkError::Cancelled) => return Err(PagewerkError::Cancelled),
                Err(error) if policy == FailurePolicy::AllOrNothing => return Err(error),
                Err(error) => {
                    warn!(page_number, %error, "page failed");
                    outcome.failures.push(PageFailure { page_number, error });
                }
            }
        }

        info!(
            rendered = outcome.pages.len(),
            failed = outcome.failures.len(),
            "rasterization finished"
        );
        Ok(outcome)
    }

    fn render_tracked(
        &self,
        source: &PageSource,
        page_number: u32,
        settings: &RasterSettings,
        tracker: &ProgressTracker<'_>,
    ) -> Result<RenderedPage> {
        tracker.checkpoint()?;
        let result = self.render_page(source, page_number, settings);
        tracker.unit_done();
        result
    }

    /// Render and encode a single page.
    pub fn render_page(
        &self,
        source: &PageSource,
        page_number: u32,
        settings: &RasterSettings,
    ) -> Result<RenderedPage> {
        let pixels = self.renderer.render(source, page_number, settings.scale())?;
        let (width, height) = pixels.dimensions();

        let bytes = ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(pixels))
            .encode(settings.format, settings.clamped_quality())
            .map_err(|err| PagewerkError::Encode {
                page: page_number,
                detail: err.to_string(),
            })?;

        Ok(RenderedPage {
            page_number,
            width,
            height,
            format: settings.format,
            bytes,
        })
    }
}

impl std::fmt::Debug for DocumentRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentRasterizer")
            .field("renderer", &self.renderer.name())
            .field("parallel", &self.parallel)
            .finish()
    }
}

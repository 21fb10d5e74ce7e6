// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Workbench — the user-facing operations (merge, split, extract, rearrange,
// compact, images to PDF, PDF to images), each producing named outputs.

use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_core::types::SplitSpec;
use pagewerk_core::{EngineConfig, NamedOutput, PageSetup, RasterFormat, RasterSettings, RenderedPage};
use tracing::{info, instrument};

use crate::control::JobControl;
use crate::convert::{ImageInput, ImageToDocumentConverter};
use crate::order::FileOrderList;
use crate::pdf::{DocumentAssembler, PageSource, SourceSelection, SplitPolicy};
use crate::range::PageRange;
use crate::raster::{DocumentRasterizer, FailurePolicy, PageFailure};

pub const MERGED_NAME: &str = "merged.pdf";
pub const IMAGES_NAME: &str = "images.pdf";

/// Base for derived output names: the source name without a trailing
/// `.pdf` (any case), or `document` when nothing is left.
pub fn output_base(source_name: &str) -> String {
    let trimmed = source_name.trim();
    let stem = match trimmed.len().checked_sub(4) {
        Some(cut) if trimmed.is_char_boundary(cut) && trimmed[cut..].eq_ignore_ascii_case(".pdf") => {
            &trimmed[..cut]
        }
        _ => trimmed,
    };
    if stem.is_empty() {
        "document".to_owned()
    } else {
        stem.to_owned()
    }
}

/// `{base}-{name}.pdf` with every run of whitespace or path separators in
/// `name` replaced by `-` and `..` collapsed to `.`, so the name stays a
/// single path component.
pub fn split_output_name(base: &str, split_name: &str) -> String {
    let mut dashed = String::with_capacity(split_name.len());
    let mut in_space = false;
    for ch in split_name.chars() {
        if ch.is_whitespace() || ch.is_control() || ch == '/' || ch == '\\' {
            if !in_space {
                dashed.push('-');
            }
            in_space = true;
        } else {
            dashed.push(ch);
            in_space = false;
        }
    }
    while dashed.contains("..") {
        dashed = dashed.replace("..", ".");
    }
    format!("{base}-{dashed}.pdf")
}

/// `{base}-page-{n}.{ext}`.
pub fn raster_output_name(base: &str, page_number: u32, format: RasterFormat) -> String {
    format!("{base}-page-{page_number}.{}", format.extension())
}

/// One split spec and its named output (or why it has none).
#[derive(Debug)]
pub struct NamedSplit {
    pub spec: SplitSpec,
    pub result: Result<NamedOutput>,
}

/// A rendered page with its output name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedPage {
    pub name: String,
    pub page: RenderedPage,
}

/// Named rendered pages plus the pages that failed.
#[derive(Debug, Default)]
pub struct RasterBatch {
    pub pages: Vec<NamedPage>,
    pub failures: Vec<PageFailure>,
}

/// Entry point for every operation, configured once.
#[derive(Debug, Clone, Default)]
pub struct Workbench {
    config: EngineConfig,
}

impl Workbench {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn assembler(&self) -> DocumentAssembler {
        DocumentAssembler::from_config(&self.config)
    }

    /// Decode an uploaded document after checking it against the intake
    /// limits.
    pub fn open_document(&self, name: &str, bytes: Vec<u8>) -> Result<PageSource> {
        self.config.intake.check_file(name, bytes.len() as u64)?;
        PageSource::open(name, bytes)
    }

    /// Wrap an uploaded image after checking it against the intake limits.
    pub fn image_input(&self, name: &str, mime_type: &str, bytes: Vec<u8>) -> Result<ImageInput> {
        self.config.intake.check_file(name, bytes.len() as u64)?;
        Ok(ImageInput::new(name, mime_type, bytes))
    }

    /// Concatenate at least two documents in list order.
    #[instrument(skip_all, fields(files = sources.len()))]
    pub fn merge(&self, sources: &FileOrderList<PageSource>, control: &JobControl) -> Result<NamedOutput> {
        if sources.len() < 2 {
            return Err(PagewerkError::Usage(
                "merging needs at least two documents".into(),
            ));
        }
        self.config.intake.check_batch(sources.len())?;

        let selections: Vec<SourceSelection<'_>> =
            sources.payloads().map(SourceSelection::all).collect();
        let bytes = self.assembler().assemble(&selections, control)?;
        info!(output_bytes = bytes.len(), "merge finished");
        Ok(NamedOutput {
            name: MERGED_NAME.to_owned(),
            bytes,
        })
    }

    /// One output per spec. No specs means the whole document as one
    /// `Pages 1-N` output.
    #[instrument(skip_all, fields(source = source.label(), specs = specs.len()))]
    pub fn split(
        &self,
        source: &PageSource,
        specs: &[SplitSpec],
        policy: SplitPolicy,
        control: &JobControl,
    ) -> Result<Vec<NamedSplit>> {
        let whole = [SplitSpec::whole(source.page_count())];
        let specs = if specs.is_empty() { &whole[..] } else { specs };

        let base = output_base(source.label());
        let outcomes = self.assembler().split(source, specs, policy, control)?;
        Ok(outcomes
            .into_iter()
            .map(|outcome| {
                let name = split_output_name(&base, &outcome.spec.name);
                NamedSplit {
                    result: outcome.result.map(|bytes| NamedOutput { name, bytes }),
                    spec: outcome.spec,
                }
            })
            .collect())
    }

    /// Pages selected by a page-selection expression, as one document.
    #[instrument(skip_all, fields(source = source.label(), expression = %expression))]
    pub fn extract(&self, source: &PageSource, expression: &str, control: &JobControl) -> Result<NamedOutput> {
        let range = PageRange::parse(expression, source.page_count())?;
        let bytes = self
            .assembler()
            .assemble(&[SourceSelection::range(source, range)], control)?;
        Ok(NamedOutput {
            name: format!("{}-extracted.pdf", output_base(source.label())),
            bytes,
        })
    }

    /// Pages in exactly the given order; repeats allowed.
    #[instrument(skip_all, fields(source = source.label(), pages = order.len()))]
    pub fn rearrange(&self, source: &PageSource, order: &[u32], control: &JobControl) -> Result<NamedOutput> {
        let bytes = self
            .assembler()
            .assemble(&[SourceSelection::explicit(source, order.to_vec())], control)?;
        Ok(NamedOutput {
            name: format!("{}-rearranged.pdf", output_base(source.label())),
            bytes,
        })
    }

    /// Re-save with unreferenced objects dropped and streams compressed.
    pub fn compact(&self, source: &PageSource) -> Result<NamedOutput> {
        let bytes = self.assembler().compact(source)?;
        Ok(NamedOutput {
            name: format!("{}-compact.pdf", output_base(source.label())),
            bytes,
        })
    }

    /// One page per image in list order. `setup` overrides the configured
    /// paper, orientation and margin.
    pub fn images_to_pdf(
        &self,
        images: &FileOrderList<ImageInput>,
        setup: Option<PageSetup>,
        control: &JobControl,
    ) -> Result<NamedOutput> {
        self.config.intake.check_batch(images.len())?;
        let converter = ImageToDocumentConverter::from_config(&self.config)
            .with_setup(setup.unwrap_or_else(|| self.config.page_setup()));
        let bytes = converter.convert(images, control)?;
        Ok(NamedOutput {
            name: IMAGES_NAME.to_owned(),
            bytes,
        })
    }

    /// Render the pages selected by `expression`. `settings` defaults to
    /// the configured raster settings.
    pub fn rasterize(
        &self,
        source: &PageSource,
        expression: &str,
        settings: Option<RasterSettings>,
        policy: FailurePolicy,
        control: &JobControl,
    ) -> Result<RasterBatch> {
        let settings = settings.unwrap_or(self.config.default_raster);
        let range = PageRange::parse(expression, source.page_count())?;
        let outcome = DocumentRasterizer::from_config(&self.config).rasterize(
            source, &range, &settings, policy, control,
        )?;

        let base = output_base(source.label());
        Ok(RasterBatch {
            pages: outcome
                .pages
                .into_iter()
                .map(|page| NamedPage {
                    name: raster_output_name(&base, page.page_number, page.format),
                    page,
                })
                .collect(),
            failures: outcome.failures,
        })
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pagewerk_core::types::SplitSpec;
use pagewerk_core::{PaperSize, RasterFormat};

#[derive(Debug, Parser)]
#[command(name = "pagewerk")]
#[command(version)]
#[command(about = "Merge, split, rearrange and convert PDF documents and images", long_about = None)]
pub struct Cli {
    /// JSON engine configuration file
    #[arg(long, global = true, value_name = "FILE", env = "PAGEWERK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory outputs are written to
    #[arg(short, long, global = true, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Process pages one at a time instead of on all cores
    #[arg(long, global = true)]
    pub sequential: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Concatenate documents in the order given
    Merge {
        /// At least two PDF files
        #[arg(value_name = "FILE", num_args = 2.., required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Cut a document into named page spans
    Split {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Span as START-END or START-END:NAME; repeatable. Defaults to the
        /// whole document.
        #[arg(short, long = "range", value_name = "SPAN", value_parser = parse_split_spec)]
        ranges: Vec<SplitSpec>,

        /// Produce nothing if any span is invalid
        #[arg(long)]
        all_or_nothing: bool,
    },

    /// Copy selected pages into a new document
    Extract {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Page selection such as "1,3,5-7" or "all"
        #[arg(short, long, value_name = "PAGES")]
        pages: String,
    },

    /// Write pages in exactly the given order; pages may repeat
    Rearrange {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Comma-separated page numbers, e.g. "3,1,2,2"
        #[arg(long, value_name = "PAGES", value_delimiter = ',', required = true)]
        order: Vec<u32>,
    },

    /// Re-save a document with unused objects dropped and streams compressed
    Compact {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Place each image on its own page
    Images {
        /// JPEG, PNG, GIF, WebP, BMP or TIFF files
        #[arg(value_name = "IMAGE", required = true)]
        inputs: Vec<PathBuf>,

        /// a4, letter, legal or WIDTHxHEIGHT in points
        #[arg(long, value_parser = parse_paper)]
        paper: Option<PaperSize>,

        /// Landscape pages
        #[arg(long)]
        landscape: bool,

        /// Margin on every side, in millimetres
        #[arg(long, value_name = "MM")]
        margin_mm: Option<f32>,
    },

    /// Render pages to image files
    Rasterize {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Page selection such as "1,3,5-7" or "all"
        #[arg(short, long, value_name = "PAGES", default_value = "all")]
        pages: String,

        /// png, jpeg or webp
        #[arg(short, long, value_parser = parse_format)]
        format: Option<RasterFormat>,

        #[arg(long)]
        dpi: Option<u32>,

        /// JPEG quality, 1-100
        #[arg(long)]
        quality: Option<u8>,

        /// Fail if any page cannot be rendered
        #[arg(long)]
        all_or_nothing: bool,
    },

    /// Print page count and page sizes
    Info {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

/// `START-END` or `START-END:NAME`. A bare `N` is the single page `N`.
pub fn parse_split_spec(value: &str) -> Result<SplitSpec, String> {
    let (span, name) = match value.split_once(':') {
        Some((span, name)) if !name.trim().is_empty() => (span, Some(name.trim())),
        Some((span, _)) => (span, None),
        None => (value, None),
    };
    let (start, end) = match span.split_once('-') {
        Some((start, end)) => (parse_page(start)?, parse_page(end)?),
        None => {
            let page = parse_page(span)?;
            (page, page)
        }
    };
    Ok(match name {
        Some(name) => SplitSpec::named(start, end, name),
        None => SplitSpec::new(start, end),
    })
}

fn parse_page(token: &str) -> Result<u32, String> {
    token
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("not a page number: {:?}", token.trim()))
}

fn parse_paper(value: &str) -> Result<PaperSize, String> {
    value.parse().map_err(|err: pagewerk_core::PagewerkError| err.to_string())
}

fn parse_format(value: &str) -> Result<RasterFormat, String> {
    value.parse().map_err(|err: pagewerk_core::PagewerkError| err.to_string())
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pagewerk — command-line document transformation.
//
// Entry point. Initialises logging, loads the engine configuration, reads the
// input files and writes every named output into the output directory.

mod cli;

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::Parser;
use pagewerk_core::human_errors::{Severity, humanize_error};
use pagewerk_core::{EngineConfig, NamedOutput, Orientation, PagewerkError, RasterSettings};
use pagewerk_document::{
    FailurePolicy, FileOrderList, JobControl, PageSource, SplitPolicy, Workbench,
};
use tracing::{debug, info, warn};

use crate::cli::{Cli, Command};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}

/// Print an error the way a user should read it and pick the exit code.
fn report(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<PagewerkError>() {
        Some(engine_err) => {
            let human = humanize_error(engine_err);
            eprintln!("error: {}", human.message);
            eprintln!("  {}", human.suggestion);
            match human.severity {
                Severity::Correctable => ExitCode::from(2),
                Severity::Cancelled => ExitCode::from(130),
                Severity::Internal => ExitCode::FAILURE,
            }
        }
        None => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if cli.sequential {
        config.parallel = false;
    }

    let workbench = Workbench::new(config);
    let control = JobControl::new().with_progress(|progress| {
        debug!(
            done = progress.units_completed,
            total = progress.units_total,
            "{}%",
            progress.percent()
        );
    });
    let out_dir = cli.output_dir.as_path();
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    match cli.command {
        Command::Merge { inputs } => {
            let mut sources = FileOrderList::new();
            for path in &inputs {
                sources.push(read_document(&workbench, path)?);
            }
            let output = workbench.merge(&sources, &control)?;
            write_output(out_dir, &output)?;
        }

        Command::Split {
            input,
            ranges,
            all_or_nothing,
        } => {
            let source = read_document(&workbench, &input)?;
            let policy = if all_or_nothing {
                SplitPolicy::AllOrNothing
            } else {
                SplitPolicy::Independent
            };

            let mut failed = 0usize;
            for split in workbench.split(&source, &ranges, policy, &control)? {
                match split.result {
                    Ok(output) => {
                        write_output(out_dir, &output)?;
                    }
                    Err(err) => {
                        failed += 1;
                        eprintln!("skipped {:?}: {}", split.spec.name, humanize_error(&err).suggestion);
                    }
                }
            }
            if failed > 0 {
                bail!("{failed} of the requested ranges produced no output");
            }
        }

        Command::Extract { input, pages } => {
            let source = read_document(&workbench, &input)?;
            let output = workbench.extract(&source, &pages, &control)?;
            write_output(out_dir, &output)?;
        }

        Command::Rearrange { input, order } => {
            let source = read_document(&workbench, &input)?;
            let output = workbench.rearrange(&source, &order, &control)?;
            write_output(out_dir, &output)?;
        }

        Command::Compact { input } => {
            let source = read_document(&workbench, &input)?;
            let before = source.bytes().len();
            let output = workbench.compact(&source)?;
            info!(before, after = output.bytes.len(), "compacted");
            write_output(out_dir, &output)?;
        }

        Command::Images {
            inputs,
            paper,
            landscape,
            margin_mm,
        } => {
            let mut images = FileOrderList::new();
            for path in &inputs {
                let bytes = read_bytes(path)?;
                images.push(workbench.image_input(&file_name(path), mime_for(path), bytes)?);
            }

            let mut setup = workbench.config().page_setup();
            if let Some(paper) = paper {
                setup.paper_size = paper;
            }
            if landscape {
                setup.orientation = Orientation::Landscape;
            }
            if let Some(margin_mm) = margin_mm {
                setup.margin_mm = margin_mm;
            }

            let output = workbench.images_to_pdf(&images, Some(setup), &control)?;
            write_output(out_dir, &output)?;
        }

        Command::Rasterize {
            input,
            pages,
            format,
            dpi,
            quality,
            all_or_nothing,
        } => {
            let source = read_document(&workbench, &input)?;
            let defaults = workbench.config().default_raster;
            let settings = RasterSettings {
                format: format.unwrap_or(defaults.format),
                dpi: dpi.unwrap_or(defaults.dpi),
                quality: quality.unwrap_or(defaults.quality),
            };
            let policy = if all_or_nothing {
                FailurePolicy::AllOrNothing
            } else {
                FailurePolicy::BestEffort
            };

            let batch = workbench.rasterize(&source, &pages, Some(settings), policy, &control)?;
            for named in &batch.pages {
                let path = output_path(out_dir, &named.name)?;
                fs::write(&path, &named.page.bytes)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("{}", path.display());
            }
            for failure in &batch.failures {
                eprintln!("page {}: {}", failure.page_number, failure.error);
            }
            if !batch.failures.is_empty() {
                bail!("{} page(s) could not be rendered", batch.failures.len());
            }
        }

        Command::Info { input } => {
            let source = read_document(&workbench, &input)?;
            println!("{}: {} page(s)", source.label(), source.page_count());
            for page_number in 1..=source.page_count() {
                let page = source.page_info(page_number)?;
                let (width, height) = page.display_size();
                println!(
                    "  page {page_number}: {width:.1} x {height:.1} pt, rotated {}",
                    page.rotation
                );
            }
        }
    }

    Ok(())
}

fn read_bytes(path: &Path) -> anyhow::Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn read_document(workbench: &Workbench, path: &Path) -> anyhow::Result<PageSource> {
    let bytes = read_bytes(path)?;
    Ok(workbench.open_document(&file_name(path), bytes)?)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Declared MIME type from the file extension. Content sniffing still wins
/// inside the engine.
fn mime_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// `dir/name`, refusing names that would land anywhere but directly inside
/// `dir`.
fn output_path(dir: &Path, name: &str) -> anyhow::Result<PathBuf> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(dir.join(name)),
        _ => bail!("refusing to write {name:?} outside {}", dir.display()),
    }
}

fn write_output(dir: &Path, output: &NamedOutput) -> anyhow::Result<PathBuf> {
    let path = output_path(dir, &output.name)?;
    if path.exists() {
        warn!(path = %path.display(), "overwriting existing file");
    }
    fs::write(&path, &output.bytes).with_context(|| format!("writing {}", path.display()))?;
    println!("{}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(dir: &Path, args: &[&str]) -> Cli {
        let out = dir.to_str().unwrap();
        let mut argv = vec!["pagewerk", "-o", out];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> String {
        let path = dir.join(name);
        image::RgbImage::from_pixel(width, height, image::Rgb([200, 0, 0]))
            .save(&path)
            .unwrap();
        path.to_str().unwrap().to_owned()
    }

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_for(Path::new("scan.JPG")), "image/jpeg");
        assert_eq!(mime_for(Path::new("a.tiff")), "image/tiff");
        assert_eq!(mime_for(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn outputs_stay_inside_the_output_directory() {
        let dir = Path::new("out");
        assert_eq!(output_path(dir, "a-b.pdf").unwrap(), dir.join("a-b.pdf"));
        for name in ["../evil.pdf", "sub/evil.pdf", "/tmp/evil.pdf", "..", ""] {
            assert!(output_path(dir, name).is_err(), "{name:?} accepted");
        }
    }

    #[test]
    fn split_names_cannot_escape() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("out");
        fs::create_dir(&root).unwrap();
        let a = write_png(&root, "a.png", 10, 10);
        run(cli(&root, &["images", &a])).unwrap();
        let doc = root.join("images.pdf").to_str().unwrap().to_owned();

        run(cli(&root, &["split", &doc, "-r", "1-1:../../escaped"])).unwrap();
        assert!(root.join("images-.-.-escaped.pdf").exists());
        assert!(!dir.path().join("escaped.pdf").exists());
    }

    #[test]
    fn images_then_merge_split_and_rasterize() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let a = write_png(root, "a.png", 40, 20);
        let b = write_png(root, "b.png", 20, 40);

        run(cli(root, &["images", &a, &b, "--paper", "letter", "--margin-mm", "5"])).unwrap();
        let images_pdf = root.join("images.pdf");
        assert!(images_pdf.exists());
        let images_pdf = images_pdf.to_str().unwrap().to_owned();

        run(cli(root, &["merge", &images_pdf, &images_pdf])).unwrap();
        let merged = root.join("merged.pdf");
        let merged_bytes = fs::read(&merged).unwrap();
        assert_eq!(PageSource::open("merged.pdf", merged_bytes).unwrap().page_count(), 4);
        let merged = merged.to_str().unwrap().to_owned();

        run(cli(root, &["split", &merged, "-r", "1-1:First", "-r", "2-4"])).unwrap();
        assert!(root.join("merged-First.pdf").exists());
        assert!(root.join("merged-Pages-2-4.pdf").exists());

        run(cli(root, &["rasterize", &merged, "--pages", "2,4", "--dpi", "36"])).unwrap();
        assert!(root.join("merged-page-2.png").exists());
        assert!(root.join("merged-page-4.png").exists());
        assert!(!root.join("merged-page-1.png").exists());
    }

    #[test]
    fn invalid_split_fails_after_writing_valid_ranges() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let a = write_png(root, "a.png", 10, 10);
        run(cli(root, &["images", &a])).unwrap();
        let doc = root.join("images.pdf").to_str().unwrap().to_owned();

        let err = run(cli(root, &["split", &doc, "-r", "1-1:Ok", "-r", "2-9:Bad"])).unwrap_err();
        assert!(err.to_string().contains("1 of the requested ranges"));
        assert!(root.join("images-Ok.pdf").exists());
        assert!(!root.join("images-Bad.pdf").exists());
    }

    #[test]
    fn undecodable_input_is_a_correctable_engine_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let junk = root.join("junk.pdf");
        fs::write(&junk, b"not a pdf").unwrap();

        let err = run(cli(root, &["info", junk.to_str().unwrap()])).unwrap_err();
        let engine_err = err.downcast_ref::<PagewerkError>().unwrap();
        assert!(matches!(engine_err, PagewerkError::Decode { .. }));
        assert_eq!(humanize_error(engine_err).severity, Severity::Correctable);
    }
}
